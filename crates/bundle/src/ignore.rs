use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::warn;

/// gitignore-style rules read from `.bundleignore` at the archive root.
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    pub const FILENAME: &'static str = ".bundleignore";

    const DEFAULTS: [&'static str; 3] = [".git", Self::FILENAME, crate::Manifest::FILENAME];

    pub fn new(content: &str) -> Self {
        let mut builder = GitignoreBuilder::new(".");
        for line in Self::DEFAULTS.iter().copied().chain(content.lines()) {
            if let Err(e) = builder.add_line(None, line) {
                warn!(line, "bundleignore: skipping invalid pattern: {e}");
            }
        }

        let matcher = builder.build().unwrap_or_else(|e| {
            warn!("bundleignore: could not build matcher: {e}");
            Gitignore::empty()
        });
        Self { matcher }
    }

    pub fn defaults() -> Self {
        Self::new("")
    }

    /// `path` is an archive entry name relative to the archive root.
    pub fn is_ignored(&self, path: &str) -> bool {
        let is_dir = path.ends_with('/');
        self.matcher
            .matched_path_or_any_parents(path.trim_end_matches('/'), is_dir)
            .is_ignore()
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_always_apply() {
        let rules = IgnoreRules::defaults();
        assert!(rules.is_ignored(".git/config"));
        assert!(rules.is_ignored("game/.git/HEAD"));
        assert!(rules.is_ignored("game/lovebrew.toml"));
        assert!(rules.is_ignored(".bundleignore"));
        assert!(!rules.is_ignored("game/main.lua"));
    }

    #[test]
    fn test_user_patterns() {
        let rules = IgnoreRules::new("# comment\n*.psd\ngame/docs/\n");
        assert!(rules.is_ignored("game/art/hero.psd"));
        assert!(rules.is_ignored("game/docs/readme.md"));
        assert!(!rules.is_ignored("game/art/hero.png"));
    }
}
