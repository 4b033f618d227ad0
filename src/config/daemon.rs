use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env::EnvConfig;
use crate::error::Result;
use crate::utils::ConfigValidator;

pub const DEFAULT_PLUGIN_DAEMON_URL: &str = "http://127.0.0.1:5002";
pub const DEFAULT_PLUGIN_DAEMON_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_FILES_URL_PREFIX: &str = "/files/tools";

/// 插件守护进程连接配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginDaemonConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PLUGIN_DAEMON_TIMEOUT_SECS
}

impl PluginDaemonConfig {
    /// 从环境变量读取：PLUGIN_DAEMON_URL / PLUGIN_DAEMON_KEY / PLUGIN_DAEMON_TIMEOUT
    pub fn from_env() -> Result<Self> {
        let base_url = EnvConfig::get_env_optional("PLUGIN_DAEMON_URL")
            .unwrap_or_else(|| DEFAULT_PLUGIN_DAEMON_URL.to_string());
        ConfigValidator::validate_url(&base_url)?;
        let api_key = match EnvConfig::get_env_optional("PLUGIN_DAEMON_KEY") {
            Some(raw) => EnvConfig::resolve_secret(&raw, "PLUGIN_DAEMON_KEY")?,
            None => String::new(),
        };
        let timeout_secs =
            EnvConfig::get_env_parsed("PLUGIN_DAEMON_TIMEOUT", DEFAULT_PLUGIN_DAEMON_TIMEOUT_SECS)?;
        Ok(Self {
            base_url,
            api_key,
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for PluginDaemonConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PLUGIN_DAEMON_URL.to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_PLUGIN_DAEMON_TIMEOUT_SECS,
        }
    }
}

/// 工具文件对外 URL 前缀
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileUrlConfig {
    pub files_url_prefix: String,
}

impl FileUrlConfig {
    pub fn from_env() -> Self {
        Self {
            files_url_prefix: EnvConfig::get_env_optional("TOOLFLOW_FILES_URL")
                .unwrap_or_else(|| DEFAULT_FILES_URL_PREFIX.to_string()),
        }
    }
}

impl Default for FileUrlConfig {
    fn default() -> Self {
        Self {
            files_url_prefix: DEFAULT_FILES_URL_PREFIX.to_string(),
        }
    }
}
