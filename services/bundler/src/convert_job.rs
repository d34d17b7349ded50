use std::path::{Component, Path, PathBuf};

use bundle::{converted_name, validate_asset, MediaKind};

use crate::build_log::BuildLog;
use crate::toolchain::{run_stage, Stage, Tool, ToolRunner, ToolSet};

/// Uploaded file name as a path that stays inside the work directory.
pub fn safe_relative(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

pub fn transcode_stage(kind: MediaKind, src: &Path, dst: &Path, tools: &ToolSet) -> Option<Stage> {
    let (tool, args) = match kind {
        MediaKind::Texture => (
            Tool::Tex3ds,
            vec![
                "-f".to_string(),
                "rgba8888".to_string(),
                "-z".to_string(),
                "auto".to_string(),
                src.display().to_string(),
                "-o".to_string(),
                dst.display().to_string(),
            ],
        ),
        MediaKind::Font => (
            Tool::Mkbcfnt,
            vec![src.display().to_string(), "-o".to_string(), dst.display().to_string()],
        ),
        MediaKind::Opaque | MediaKind::Unsupported => return None,
    };
    Some(Stage {
        program: tools.program(tool),
        args,
        output: dst.to_path_buf(),
    })
}

/// One uploaded file that passed the batch-level checks.
pub struct ConvertJob {
    pub name: String,
    pub relative: PathBuf,
    pub kind: MediaKind,
    pub mime: Option<&'static str>,
    pub bytes: Vec<u8>,
}

impl ConvertJob {
    /// Output name, e.g. `gfx/hero.png` → `gfx/hero.t3x`.
    pub fn output_name(&self) -> String {
        let relative = self.relative.to_string_lossy().replace('\\', "/");
        match self.kind.converted_extension() {
            Some(ext) => converted_name(&relative, ext),
            None => relative,
        }
    }

    /// Validate, transcode and read back. Failures are logged and do not stop siblings.
    pub async fn run(
        self,
        workdir: &Path,
        runner: &dyn ToolRunner,
        tools: &ToolSet,
        log: &mut BuildLog,
    ) -> Option<(String, Vec<u8>)> {
        log.info(format!("Processing file '{}'", self.name));

        let (name, kind, mime) = (self.name.clone(), self.kind, self.mime);
        let checked = tokio::task::spawn_blocking(move || {
            validate_asset(&name, kind, mime, &self.bytes).map(|_| self)
        })
        .await;
        let job = match checked {
            Ok(Ok(job)) => job,
            Ok(Err(e)) => {
                log.error(format!("Failed to process file: {e}"));
                return None;
            }
            Err(e) => {
                log.error(format!("Validation task failed: {e}"));
                return None;
            }
        };

        let out_name = job.output_name();
        let src = workdir.join("src").join(&job.relative);
        let dst = workdir.join("out").join(&out_name);
        for dir in [src.parent(), dst.parent()].into_iter().flatten() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                log.error(format!("Failed to create {}: {e}", dir.display()));
                return None;
            }
        }
        if let Err(e) = tokio::fs::write(&src, &job.bytes).await {
            log.error(format!("Failed to save '{}': {e}", job.name));
            return None;
        }

        let stage = transcode_stage(job.kind, &src, &dst, tools)?;
        if !run_stage(runner, &stage, log).await {
            log.error(format!("Cannot convert '{}'", job.name));
            return None;
        }

        match tokio::fs::read(&dst).await {
            Ok(bytes) => {
                log.info(format!("Converted {} -> {out_name}", job.name));
                Some((out_name, bytes))
            }
            Err(e) => {
                log.error(format!("Failed to read {out_name}: {e}"));
                None
            }
        }
    }
}
