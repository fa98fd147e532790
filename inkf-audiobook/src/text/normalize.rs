//! Chapter HTML → plain text for speech synthesis

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("valid script/style regex")
});

static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|blockquote|tr|section)\s*>")
        .expect("valid block break regex")
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("valid entity regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip markup and entities from chapter content
///
/// Tags are removed after entities are protected from being read as markup,
/// so `&lt;b&gt;` survives as the literal text `<b>`.
pub fn normalize_chapter_text(html: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(html, " ");
    let text = BLOCK_BREAK.replace_all(&text, " ");
    let text = TAG.replace_all(&text, "");
    let text = ENTITY.replace_all(&text, |caps: &Captures| decode_entity(&caps[1]));
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

fn decode_entity(name: &str) -> String {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => numeric.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(|c| if c == '\u{a0}' { ' ' } else { c })
            .map(String::from)
            .unwrap_or_default();
    }

    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "mdash" => "—",
        "ndash" => "–",
        "hellip" => "…",
        "lsquo" | "rsquo" => "'",
        "ldquo" | "rdquo" => "\"",
        _ => "",
    }
    .to_string()
}
