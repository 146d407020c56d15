use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from commandmate.toml.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandMateConfig {
    pub capture: CaptureConfig,
    pub watch: WatchConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Binary invoked for `capture-pane`.
    pub tmux_command: String,
    /// Scrollback lines to include above the visible pane.
    pub history_lines: u32,
    /// Join wrapped lines (`-J`) so long paths are not split.
    pub join_wrapped: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_secs: u64,
    pub include_content: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

// --- Default implementations ---

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tmux_command: "tmux".to_string(),
            history_lines: 2000,
            join_wrapped: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            include_content: false,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load config from `path`. A missing file yields the defaults; an unreadable
/// or malformed one is an error.
pub fn load_config(path: &Path) -> Result<CommandMateConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(CommandMateConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("commandmate.toml")).unwrap();
        assert_eq!(config.capture.tmux_command, "tmux");
        assert_eq!(config.capture.history_lines, 2000);
        assert!(config.capture.join_wrapped);
        assert_eq!(config.watch.poll_interval_secs, 2);
        assert!(!config.watch.include_content);
        assert_eq!(config.serve.bind, "127.0.0.1");
        assert_eq!(config.serve.port, 3000);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commandmate.toml");
        std::fs::write(&path, "").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.serve.max_body_bytes, 4 * 1024 * 1024);
    }

    #[test]
    fn test_partial_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commandmate.toml");
        std::fs::write(
            &path,
            r#"
[capture]
history_lines = 50

[serve]
port = 8421
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.capture.history_lines, 50);
        assert_eq!(config.capture.tmux_command, "tmux");
        assert_eq!(config.serve.port, 8421);
        assert_eq!(config.serve.bind, "127.0.0.1");
        assert_eq!(config.watch.poll_interval_secs, 2);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commandmate.toml");
        std::fs::write(&path, "[serve\nport = ").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("commandmate.toml");
        std::fs::write(&path, "[serve]\nport = \"not a number\"\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_directory_path_is_read_error() {
        let dir = tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
