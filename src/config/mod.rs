mod daemon;
mod env;

pub use daemon::{
    FileUrlConfig, PluginDaemonConfig, DEFAULT_FILES_URL_PREFIX, DEFAULT_PLUGIN_DAEMON_TIMEOUT_SECS,
    DEFAULT_PLUGIN_DAEMON_URL,
};
pub use env::EnvConfig;
