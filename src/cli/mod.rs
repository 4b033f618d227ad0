use std::fs;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;

use crate::error::{Result, ToolFlowError};
use crate::plugin::{
    convert_to_event_stream, EventStreamBody, InvocationChunk, InvocationResponse, PluginError,
    PluginManifest, PluginRegistry,
};
use crate::state::VariablePool;
use crate::tools::{DynToolFileManager, ToolRegistry};
use crate::utils::ConfigValidator;
use crate::workflow::{NodeEvent, ToolNode, ToolNodeData};

pub fn load_plugin_manifests(dir: &Path) -> std::result::Result<Vec<PluginManifest>, PluginError> {
    let mut registry = PluginRegistry::new();
    registry.load_directory(dir)?;
    Ok(registry.manifests().into_iter().cloned().collect())
}

pub fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ToolFlowError::Config(format!("{}: {e}", path.display())))
}

/// 读取节点配置与变量池，用内置提供方运行一次工具节点，
/// 节点事件编码为事件流帧
pub fn run_node_as_event_stream(
    node: &Path,
    pool: &Path,
    tenant_id: &str,
    user_id: &str,
    files: DynToolFileManager,
) -> Result<EventStreamBody> {
    let data = ToolNodeData::from_json(read_json(node)?)?;
    let pool = VariablePool::from_json(read_json(pool)?)?;
    let registry = Arc::new(ToolRegistry::new().with_builtin_providers());

    let node_id = node
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("tool")
        .to_string();
    ConfigValidator::validate_node_id(&node_id)?;
    let events = ToolNode::new(node_id, data, registry, files)
        .with_tenant(tenant_id)
        .with_user(user_id)
        .run(Arc::new(pool));

    let chunks = events.map(|event| -> Result<InvocationChunk> {
        let value = match event {
            NodeEvent::StreamChunk(chunk) => serde_json::to_value(chunk)?,
            NodeEvent::RunCompleted { run_result } => serde_json::to_value(run_result)?,
        };
        Ok(InvocationChunk::Data(value))
    });
    Ok(convert_to_event_stream(InvocationResponse::from_stream(chunks)))
}
