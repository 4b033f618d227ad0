use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entities::{ToolEntity, ToolParameter, ToolProviderType};
use super::message::ToolMessageStream;
use crate::error::Result;

/// 工具运行时数据：所属租户与已解密的凭据
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolRuntime {
    pub tenant_id: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

impl ToolRuntime {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            credentials: Map::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Map<String, Value>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// 调用上下文，调用深度与线程池 id 由调度方提供，这里只透传
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolInvokeContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub workflow_call_depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_pool_id: Option<String>,
}

impl ToolInvokeContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// 工具运行句柄
///
/// 各类提供方（内置、API、工作流、应用、知识库检索、插件）都实现这个 trait。
/// `invoke` 返回惰性消息流；调用过程中的传输错误作为流中的 `Err` 出现，
/// 调用方仍能保留此前已经收到的输出。
#[async_trait]
pub trait Tool: Send + Sync {
    fn entity(&self) -> &ToolEntity;

    fn provider_type(&self) -> ToolProviderType;

    fn runtime(&self) -> &ToolRuntime;

    fn name(&self) -> &str {
        self.entity().name()
    }

    /// 声明的参数；非插件工具直接返回静态声明
    async fn runtime_parameters(&self) -> Result<Vec<ToolParameter>> {
        Ok(self.entity().parameters.clone())
    }

    async fn invoke(
        &self,
        ctx: &ToolInvokeContext,
        parameters: Map<String, Value>,
    ) -> Result<ToolMessageStream>;

    /// 以新的运行时数据复制出一个句柄
    fn fork_tool_runtime(&self, runtime: ToolRuntime) -> Arc<dyn Tool>;
}

pub type DynTool = Arc<dyn Tool>;
