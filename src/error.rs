use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolFlowError>;

#[derive(Debug, Error)]
pub enum ToolFlowError {
    #[error("input variable `{0}` does not exist")]
    MissingVariable(String),
    #[error("credential validation failed: {0}")]
    CredentialValidation(String),
    #[error("tool provider `{0}` not found")]
    ProviderNotFound(String),
    #[error("tool `{tool}` not found in provider `{provider}`")]
    ToolRuntimeNotFound { provider: String, tool: String },
    #[error("invalid tool message: {0}")]
    InvalidMessage(String),
    #[error("cannot classify tool message: {0}")]
    Classification(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode event stream: {0}")]
    Decode(String),
    #[error("plugin daemon error: {0}")]
    PluginDaemon(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 错误分类，调度方据此决定引导用户重新填写凭据还是修改节点配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Configuration,
    Credential,
    Transport,
    Message,
}

impl ToolFlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolFlowError::CredentialValidation(_) => ErrorKind::Credential,
            ToolFlowError::Transport(_)
            | ToolFlowError::Decode(_)
            | ToolFlowError::PluginDaemon(_)
            | ToolFlowError::Io(_)
            | ToolFlowError::Other(_) => ErrorKind::Transport,
            ToolFlowError::InvalidMessage(_) | ToolFlowError::Classification(_) => {
                ErrorKind::Message
            }
            ToolFlowError::MissingVariable(_)
            | ToolFlowError::ProviderNotFound(_)
            | ToolFlowError::ToolRuntimeNotFound { .. }
            | ToolFlowError::Serialization(_)
            | ToolFlowError::Config(_) => ErrorKind::Configuration,
        }
    }
}

impl From<serde_json::Error> for ToolFlowError {
    fn from(err: serde_json::Error) -> Self {
        ToolFlowError::Serialization(err.to_string())
    }
}
