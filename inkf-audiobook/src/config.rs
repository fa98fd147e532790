//! Configuration resolution for inkf-audiobook
//!
//! Secrets resolve with Database → ENV → TOML priority. Pipeline tuning comes
//! from the settings table.

use inkf_common::config::TomlConfig;
use inkf_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::db::settings;
use crate::text::Chunker;
use crate::workflow::{PipelineConfig, RetryPolicy};

pub const OPENAI_KEY_ENV: [&str; 2] = ["INKF_OPENAI_API_KEY", "OPENAI_API_KEY"];
pub const STRIPE_SECRET_ENV: [&str; 2] = ["INKF_STRIPE_WEBHOOK_SECRET", "STRIPE_WEBHOOK_SECRET"];

/// Validate a secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// First valid value in priority order, warning when several are set
fn pick_secret(
    label: &str,
    db_value: Option<String>,
    env_value: Option<String>,
    toml_value: Option<String>,
) -> Option<String> {
    let candidates = [
        ("database", db_value),
        ("environment", env_value),
        ("TOML", toml_value),
    ];

    let present: Vec<&str> = candidates
        .iter()
        .filter(|(_, v)| v.as_deref().is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if present.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            label,
            present.join(", "),
            present[0]
        );
    }

    candidates
        .into_iter()
        .find_map(|(source, value)| {
            value.filter(|v| is_valid_key(v)).map(|v| {
                info!("{} loaded from {}", label, source);
                v.trim().to_string()
            })
        })
}

fn env_secret(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| is_valid_key(v)))
}

/// Resolve the OpenAI API key; the service cannot start without one
pub async fn resolve_openai_api_key(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let db_value = settings::get_openai_api_key(db).await?;
    pick_secret(
        "OpenAI API key",
        db_value,
        env_secret(&OPENAI_KEY_ENV),
        toml_config.openai_api_key.clone(),
    )
    .ok_or_else(|| {
        Error::Config(
            "OpenAI API key not configured. Please configure using one of:\n\
             1. Database setting: openai_api_key\n\
             2. Environment: INKF_OPENAI_API_KEY=your-key-here\n\
             3. TOML config: ~/.config/inkfluence/inkf-audiobook.toml (openai_api_key = \"your-key\")"
                .to_string(),
        )
    })
}

/// Resolve the Stripe webhook signing secret, if configured anywhere
pub async fn resolve_stripe_webhook_secret(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_value = settings::get_stripe_webhook_secret(db).await?;
    let secret = pick_secret(
        "Stripe webhook secret",
        db_value,
        env_secret(&STRIPE_SECRET_ENV),
        toml_config.stripe_webhook_secret.clone(),
    );

    if secret.is_none() {
        warn!("Stripe webhook secret not configured; webhook calls will fail");
    }
    Ok(secret)
}

/// Chunker and pipeline configuration from the settings table
pub async fn load_pipeline_settings(db: &Pool<Sqlite>) -> Result<(Chunker, PipelineConfig)> {
    let chunk_limit = settings::get_chunk_limit(db).await?;
    let max_retries = settings::get_max_retries(db).await?;
    let synthesis_concurrency = settings::get_synthesis_concurrency(db).await?;

    info!(
        chunk_limit,
        max_retries, synthesis_concurrency, "Loaded audiobook pipeline settings"
    );

    Ok((
        Chunker::new(chunk_limit),
        PipelineConfig {
            retry: RetryPolicy::default().with_max_retries(max_retries),
            synthesis_concurrency,
        },
    ))
}
