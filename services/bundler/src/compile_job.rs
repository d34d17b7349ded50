//! Per-target two-stage compile: descriptor stage, then packaging stage.

use std::path::{Path, PathBuf};

use bundle::Target;

use crate::build_log::BuildLog;
use crate::resources::Resources;
use crate::toolchain::{run_stage, Stage, Tool, ToolRunner, ToolSet};

/// Metadata fields every recipe draws from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileMetadata {
    pub title: String,
    pub author: String,
    pub description: String,
    pub version: String,
}

impl CompileMetadata {
    /// ctr descriptor string: `"<description> - <version>"`.
    pub fn long_description(&self) -> String {
        format!("{} - {}", self.description, self.version)
    }
}

const CTR_TITLE_MAX: usize = 0x40;
const CTR_DESCRIPTION_MAX: usize = 0x80;
const CTR_AUTHOR_MAX: usize = 0x40;

/// smdh fields are fixed-size UTF-16 buffers.
pub fn check_ctr_limits(metadata: &CompileMetadata) -> Result<(), String> {
    let checks = [
        ("Title", metadata.title.encode_utf16().count(), CTR_TITLE_MAX),
        ("Description", metadata.long_description().encode_utf16().count(), CTR_DESCRIPTION_MAX),
        ("Author", metadata.author.encode_utf16().count(), CTR_AUTHOR_MAX),
    ];
    for (field, len, max) in checks {
        if len > max {
            return Err(format!("{field} is too long ({len} > {max} UTF-16 units)"));
        }
    }
    Ok(())
}

/// File stem used for outputs inside the work directory.
pub fn output_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') { c } else { '_' })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        "game".to_string()
    } else {
        stem.to_string()
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

/// The two stages for `target`. `out` is `<workdir>/<stem>` without extension.
pub fn recipe(
    target: Target,
    metadata: &CompileMetadata,
    out: &Path,
    icon: &Path,
    resources: &Resources,
    tools: &ToolSet,
) -> [Stage; 2] {
    let with_ext = |ext: &str| out.with_extension(ext);
    let elf = arg(&resources.elf(target));
    let romfs = arg(&resources.romfs(target));

    match target {
        Target::Ctr => {
            let smdh = with_ext("smdh");
            let binary = with_ext("3dsx");
            [
                Stage {
                    program: tools.program(Tool::Smdhtool),
                    args: vec![
                        "--create".into(),
                        metadata.title.clone(),
                        metadata.long_description(),
                        metadata.author.clone(),
                        arg(icon),
                        arg(&smdh),
                    ],
                    output: smdh.clone(),
                },
                Stage {
                    program: tools.program(Tool::Tdsxtool),
                    args: vec![
                        elf,
                        arg(&binary),
                        format!("--smdh={}", arg(&smdh)),
                        format!("--romfs={romfs}"),
                    ],
                    output: binary,
                },
            ]
        }
        Target::Hac => {
            let nacp = with_ext("nacp");
            let binary = with_ext("nro");
            [
                Stage {
                    program: tools.program(Tool::Nacptool),
                    args: vec![
                        "--create".into(),
                        metadata.title.clone(),
                        metadata.author.clone(),
                        metadata.version.clone(),
                        arg(&nacp),
                    ],
                    output: nacp.clone(),
                },
                Stage {
                    program: tools.program(Tool::Elf2nro),
                    args: vec![
                        elf,
                        arg(&binary),
                        format!("--icon={}", arg(icon)),
                        format!("--nacp={}", arg(&nacp)),
                        format!("--romfsdir={romfs}"),
                    ],
                    output: binary,
                },
            ]
        }
        Target::Cafe => {
            let rpx = with_ext("rpx");
            let binary = with_ext("wuhb");
            [
                Stage {
                    program: tools.program(Tool::Elf2rpl),
                    args: vec![elf, arg(&rpx)],
                    output: rpx.clone(),
                },
                Stage {
                    program: tools.program(Tool::Wuhbtool),
                    args: vec![
                        arg(&rpx),
                        arg(&binary),
                        format!("--content={romfs}"),
                        format!("--name={}", metadata.title),
                        format!("--short-name={}", metadata.title),
                        format!("--author={}", metadata.author),
                        format!("--icon={}", arg(icon)),
                    ],
                    output: binary,
                },
            ]
        }
    }
}

/// Everything one target build needs besides the runner and the log.
pub struct CompileJob<'a> {
    pub target: Target,
    pub metadata: &'a CompileMetadata,
    pub workdir: PathBuf,
    pub icon: PathBuf,
    pub resources: &'a Resources,
    pub tools: &'a ToolSet,
}

impl CompileJob<'_> {
    /// Run both stages in order; returns the final binary on success.
    pub async fn run(&self, runner: &dyn ToolRunner, log: &mut BuildLog) -> Option<Vec<u8>> {
        if self.target == Target::Ctr {
            if let Err(reason) = check_ctr_limits(self.metadata) {
                log.error(format!("{}: {reason}", self.target));
                return None;
            }
        }

        let out = self.workdir.join(output_stem(&self.metadata.title));
        let stages = recipe(self.target, self.metadata, &out, &self.icon, self.resources, self.tools);
        for stage in &stages {
            if !run_stage(runner, stage, log).await {
                return None;
            }
        }

        let binary = &stages[1].output;
        match tokio::fs::read(binary).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log.error(format!("Failed to read {}: {e}", binary.display()));
                None
            }
        }
    }
}
