//! External programs: which ones exist, how to run them, how to judge a stage.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::build_log::BuildLog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tool {
    Smdhtool,
    Tdsxtool,
    Nacptool,
    Elf2nro,
    Elf2rpl,
    Wuhbtool,
    Tex3ds,
    Mkbcfnt,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::Smdhtool,
        Tool::Tdsxtool,
        Tool::Nacptool,
        Tool::Elf2nro,
        Tool::Elf2rpl,
        Tool::Wuhbtool,
        Tool::Tex3ds,
        Tool::Mkbcfnt,
    ];

    pub fn program(&self) -> &'static str {
        match self {
            Tool::Smdhtool => "smdhtool",
            Tool::Tdsxtool => "3dsxtool",
            Tool::Nacptool => "nacptool",
            Tool::Elf2nro => "elf2nro",
            Tool::Elf2rpl => "elf2rpl",
            Tool::Wuhbtool => "wuhbtool",
            Tool::Tex3ds => "tex3ds",
            Tool::Mkbcfnt => "mkbcfnt",
        }
    }

    /// Package the program ships in.
    pub fn group(&self) -> &'static str {
        match self {
            Tool::Smdhtool | Tool::Tdsxtool => "3dstools",
            Tool::Nacptool | Tool::Elf2nro => "switch-tools",
            Tool::Elf2rpl | Tool::Wuhbtool => "wut-tools",
            Tool::Tex3ds | Tool::Mkbcfnt => "tex3ds",
        }
    }

    /// `BUNDLER_TOOL_SMDHTOOL`, `BUNDLER_TOOL_3DSXTOOL`, ...
    pub fn env_var(&self) -> String {
        format!("BUNDLER_TOOL_{}", self.program().to_ascii_uppercase())
    }
}

/// Resolved program path per tool.
#[derive(Clone, Debug)]
pub struct ToolSet {
    programs: BTreeMap<Tool, String>,
}

impl ToolSet {
    pub fn from_env() -> Self {
        let programs = Tool::ALL
            .iter()
            .map(|t| {
                let program = std::env::var(t.env_var()).unwrap_or_else(|_| t.program().to_string());
                (*t, program)
            })
            .collect();
        Self { programs }
    }

    pub fn program(&self, tool: Tool) -> String {
        self.programs
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| tool.program().to_string())
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self {
            programs: Tool::ALL.iter().map(|t| (*t, t.program().to_string())).collect(),
        }
    }
}

/// One external invocation and the file it is expected to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    pub program: String,
    pub args: Vec<String>,
    pub output: PathBuf,
}

#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stderr: String,
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, stage: &Stage) -> std::io::Result<ToolOutput>;
}

pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, stage: &Stage) -> std::io::Result<ToolOutput> {
        let output = tokio::process::Command::new(&stage.program)
            .args(&stage.args)
            .output()
            .await?;
        Ok(ToolOutput {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Success means the expected output exists. Exit codes are logged, not trusted.
pub async fn run_stage(runner: &dyn ToolRunner, stage: &Stage, log: &mut BuildLog) -> bool {
    match runner.run(stage).await {
        Err(e) => {
            log.error(format!("Failed to start {}: {e}", stage.program));
            return false;
        }
        Ok(out) => {
            if out.code != Some(0) {
                log.warning(format!("{} exited with {:?}", stage.program, out.code));
            }
            let stderr = out.stderr.trim();
            if !stderr.is_empty() {
                log.warning(format!("{}: {stderr}", stage.program));
            }
        }
    }

    if tokio::fs::try_exists(&stage.output).await.unwrap_or(false) {
        true
    } else {
        log.error(format!("Failed to create {}", display_name(&stage.output)));
        false
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Resolve every program on PATH. Missing tools are reported, never fatal.
pub fn check_environment(tools: &ToolSet) -> Vec<Tool> {
    info!("environment: checking external programs");
    let mut missing = Vec::new();
    for tool in Tool::ALL {
        let program = tools.program(tool);
        match which::which(&program) {
            Ok(path) => info!(group = tool.group(), "found {program} at {}", path.display()),
            Err(_) => {
                warn!(group = tool.group(), "missing {program}");
                missing.push(tool);
            }
        }
    }
    if missing.is_empty() {
        info!("environment: all programs found");
    } else {
        warn!(missing = missing.len(), "environment: some programs are missing; affected targets will fail");
    }
    missing
}
