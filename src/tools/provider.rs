use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::entities::{ToolEntity, ToolProviderType};
use super::tool::{Tool, ToolRuntime};
use crate::error::{Result, ToolFlowError};

/// 工具提供方：校验凭据并按名称产出工具句柄
#[async_trait]
pub trait ToolProviderController: Send + Sync {
    fn provider_type(&self) -> ToolProviderType;

    fn name(&self) -> &str;

    async fn validate_credentials(
        &self,
        _user_id: &str,
        _credentials: &Map<String, Value>,
    ) -> Result<()> {
        Ok(())
    }

    fn get_tool(&self, tool_name: &str, runtime: ToolRuntime) -> Result<Arc<dyn Tool>>;

    fn get_tools(&self) -> Vec<ToolEntity>;
}

/// 提供方在进程内持有全部工具（内置、API、工作流、应用、知识库检索）
pub struct StaticToolProvider {
    provider_type: ToolProviderType,
    name: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl StaticToolProvider {
    pub fn new(provider_type: ToolProviderType, name: impl Into<String>) -> Self {
        Self {
            provider_type,
            name: name.into(),
            tools: Vec::new(),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(ToolProviderType::BuiltIn, name)
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }
}

#[async_trait]
impl ToolProviderController for StaticToolProvider {
    fn provider_type(&self) -> ToolProviderType {
        self.provider_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn get_tool(&self, tool_name: &str, runtime: ToolRuntime) -> Result<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.name() == tool_name)
            .map(|tool| tool.fork_tool_runtime(runtime))
            .ok_or_else(|| ToolFlowError::ToolRuntimeNotFound {
                provider: self.name.clone(),
                tool: tool_name.to_string(),
            })
    }

    fn get_tools(&self) -> Vec<ToolEntity> {
        self.tools.iter().map(|tool| tool.entity().clone()).collect()
    }
}
