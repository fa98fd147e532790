//! Audio buffer merging
//!
//! MP3 frames are self-delimiting, so byte concatenation in chunk order
//! yields a playable file.

/// Concatenate buffers in order with a single allocation
pub fn merge_buffers<B: AsRef<[u8]>>(buffers: &[B]) -> Vec<u8> {
    let total: usize = buffers.iter().map(|b| b.as_ref().len()).sum();
    let mut merged = Vec::with_capacity(total);
    for buffer in buffers {
        merged.extend_from_slice(buffer.as_ref());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_order_and_length() {
        let parts: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![], vec![4], vec![5, 6]];
        let merged = merge_buffers(&parts);
        assert_eq!(merged.len(), parts.iter().map(Vec::len).sum::<usize>());
        assert_eq!(merged, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        let merged = merge_buffers(&[b"ab".as_slice(), b"ab".as_slice()]);
        assert_eq!(merged, b"abab");
    }

    #[test]
    fn test_merge_empty_input() {
        let none: [Vec<u8>; 0] = [];
        assert!(merge_buffers(&none).is_empty());
    }
}
