//! Ambient daemon configuration: the boundary socket path, the optional log
//! directory, and the default log level. Resolved once at startup from CLI
//! flags, the `LOCALCHAT_LOG` environment variable, and platform default
//! directories — never persisted to a file the daemon writes back to
//! itself, since the daemon itself holds no session state across restarts.

use std::path::PathBuf;

/// Resolved daemon configuration.
pub struct NodeConfig {
    pub socket_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl NodeConfig {
    /// Resolves configuration from explicit CLI flags, falling back to
    /// `LOCALCHAT_LOG` for the log filter and `dirs`-derived platform
    /// defaults for the socket path.
    pub fn resolve(socket_path: Option<PathBuf>, log_dir: Option<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.unwrap_or_else(localchat_core::socket::default_socket_path),
            log_dir,
            log_filter: std::env::var("LOCALCHAT_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_socket_path_is_kept_verbatim() {
        let config = NodeConfig::resolve(Some(PathBuf::from("/tmp/explicit.sock")), None);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/explicit.sock"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn missing_socket_path_falls_back_to_the_platform_default() {
        let config = NodeConfig::resolve(None, None);
        assert_eq!(config.socket_path, localchat_core::socket::default_socket_path());
    }
}
