use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::resources::Resources;
use crate::toolchain::{ToolRunner, ToolSet};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub resources: Resources,
    pub tools: ToolSet,
    pub runner: Arc<dyn ToolRunner>,
}

impl AppState {
    pub fn new(cfg: &ServiceConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            resources: Resources::new(cfg.resources_dir.clone()),
            tools: cfg.tools.clone(),
            runner,
        }
    }
}
