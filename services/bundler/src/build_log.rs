use chrono::Local;
use tracing::{error, info, warn};

/// User-facing log returned under the `log` key. Each line is mirrored to tracing.
#[derive(Clone, Debug, Default)]
pub struct BuildLog {
    lines: Vec<String>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&mut self, level: &str, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        // two fractional digits
        let timestamp = &timestamp[..timestamp.len() - 1];
        self.lines.push(format!("[{timestamp}] {level} {message}"));
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{message}");
        self.write("INFO", message);
    }

    pub fn warning(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{message}");
        self.write("WARNING", message);
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!("{message}");
        self.write("ERROR", message);
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let mut log = BuildLog::new();
        log.info("Creating ctr bundle for Demo");
        log.error("Failed to create Demo.smdh");

        let text = log.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        // [YYYY-MM-DD HH:MM:SS.ff]
        assert_eq!(lines[0].find(']'), Some(23));
        assert!(lines[0].ends_with("] INFO Creating ctr bundle for Demo"));
        assert!(lines[1].contains("] ERROR Failed to create Demo.smdh"));
    }
}
