use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub compile_url: String,
    pub convert_url: String,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let compile_url = get("BUNDLER_COMPILE_URL")?;
        let convert_url = get("BUNDLER_CONVERT_URL")?;
        let cache_dir = std::env::var("BUNDLER_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".lovebrew-cache"));
        let ttl_hours: u64 = match std::env::var("BUNDLER_CACHE_TTL_HOURS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("BUNDLER_CACHE_TTL_HOURS is not a number: {v}"))?,
            Err(_) => 72,
        };

        for (name, url) in [("BUNDLER_COMPILE_URL", &compile_url), ("BUNDLER_CONVERT_URL", &convert_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{name} must start with http:// or https://");
            }
        }
        if ttl_hours == 0 {
            bail!("BUNDLER_CACHE_TTL_HOURS must be at least 1");
        }

        Ok(Self {
            compile_url,
            convert_url,
            cache_dir,
            cache_ttl: Duration::from_secs(ttl_hours * 60 * 60),
        })
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}
