//! 插件：工具提供方声明、守护进程通信与事件流编解码

pub mod backwards;
pub mod event_stream;
pub mod provider;
pub mod tool;
pub mod transport;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use backwards::BackwardsInvocation;
pub use event_stream::{
    convert_to_event_stream, decode_event_stream, BackwardsInvocationResponse, ByteStream,
    EventFrame, EventStreamBody, EventStreamDecoder, InvocationChunk, InvocationResponse,
};
pub use provider::PluginToolProvider;
pub use tool::{PluginMessageStream, PluginTool};
#[cfg(feature = "plugin-http")]
pub use transport::HttpPluginTransport;
pub use transport::{PluginInvokeRequest, PluginToolTarget, PluginTransport};

use crate::error::ToolFlowError;
use crate::tools::{ToolProviderEntityWithPlugin, ToolRegistry};

const MANIFEST_FILE: &str = "plugin.json";

/// `plugin.json`，只描述工具插件
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PluginManifest {
    /// 插件 id，形如 `author/name`
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ToolProviderEntityWithPlugin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl PluginManifest {
    pub fn tool_count(&self) -> usize {
        self.providers.iter().map(|provider| provider.tools.len()).sum()
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin manifest not found: {0}")]
    ManifestMissing(String),
    #[error("failed to parse plugin manifest {path}: {reason}")]
    ManifestParse { path: String, reason: String },
    #[error("plugin `{name}` incompatible: {reason}")]
    Incompatible { name: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PluginError> for ToolFlowError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Io(err) => ToolFlowError::Io(err),
            other => ToolFlowError::Config(other.to_string()),
        }
    }
}

/// 已加载的插件声明
#[derive(Default)]
pub struct PluginRegistry {
    manifests: HashMap<String, PluginManifest>,
    base_dir: Option<PathBuf>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base: PathBuf) -> Self {
        self.base_dir = Some(base);
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// 读取目录下每个子目录中的 `plugin.json`
    pub fn load_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize, PluginError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PluginError::ManifestMissing(dir.display().to_string()));
        }
        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let manifest_path = path.join(MANIFEST_FILE);
            if manifest_path.exists() {
                let manifest = Self::load_manifest(&manifest_path)?;
                self.register_manifest(manifest)?;
                loaded += 1;
            }
        }
        tracing::debug!(dir = %dir.display(), loaded, "plugin manifests loaded");
        Ok(loaded)
    }

    pub fn register_manifest(&mut self, manifest: PluginManifest) -> Result<(), PluginError> {
        if manifest.providers.is_empty() {
            return Err(PluginError::Incompatible {
                name: manifest.name,
                reason: "tool plugin declares no providers".to_string(),
            });
        }
        self.manifests.insert(manifest.name.clone(), manifest);
        Ok(())
    }

    /// 按插件 id 排序
    pub fn manifests(&self) -> Vec<&PluginManifest> {
        let mut manifests: Vec<_> = self.manifests.values().collect();
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        manifests
    }

    pub fn get(&self, name: &str) -> Option<&PluginManifest> {
        self.manifests.get(name)
    }

    fn load_manifest(path: &Path) -> Result<PluginManifest, PluginError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|err| PluginError::ManifestParse {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    /// 为租户注册全部工具插件的提供方，返回注册数量
    pub fn initialize(
        &self,
        tools: &ToolRegistry,
        tenant_id: &str,
        transport: Arc<dyn PluginTransport>,
    ) -> usize {
        let mut registered = 0;
        for manifest in self.manifests() {
            for entity in &manifest.providers {
                tools.register_provider(Arc::new(PluginToolProvider::new(
                    entity.clone(),
                    tenant_id,
                    manifest.name.clone(),
                    Arc::clone(&transport),
                )));
                registered += 1;
            }
        }
        registered
    }
}
