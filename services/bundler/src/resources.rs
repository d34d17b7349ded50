use std::path::PathBuf;

use bundle::Target;

/// Fixed per-target inputs: `<root>/<target>/{lovepotion.elf, icon.*, files.romfs | content}`.
#[derive(Clone, Debug)]
pub struct Resources {
    root: PathBuf,
}

impl Resources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, target: Target) -> PathBuf {
        self.root.join(target.name())
    }

    pub fn elf(&self, target: Target) -> PathBuf {
        self.dir(target).join("lovepotion.elf")
    }

    pub fn default_icon(&self, target: Target) -> PathBuf {
        self.dir(target).join(format!("icon.{}", target.icon_format().extension()))
    }

    pub fn romfs(&self, target: Target) -> PathBuf {
        match target {
            Target::Cafe => self.dir(target).join("content"),
            Target::Ctr | Target::Hac => self.dir(target).join("files.romfs"),
        }
    }
}
