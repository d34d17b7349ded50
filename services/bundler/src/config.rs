use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::toolchain::ToolSet;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub resources_dir: PathBuf,
    pub tools: ToolSet,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BUNDLER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let resources_dir = std::env::var("BUNDLER_RESOURCES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("resources"));

        // Tiny sanity checks (fail fast, fail loud)
        bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("BUNDLER_BIND_ADDR is not a socket address: {bind_addr}"))?;
        if !resources_dir.is_dir() {
            bail!("BUNDLER_RESOURCES_DIR does not exist: {}", resources_dir.display());
        }

        Ok(Self {
            bind_addr,
            resources_dir,
            tools: ToolSet::from_env(),
        })
    }
}
