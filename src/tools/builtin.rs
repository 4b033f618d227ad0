use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::{Map, Value};

use super::entities::{
    ToolEntity, ToolParameter, ToolParameterForm, ToolParameterType, ToolProviderType,
};
use super::message::{ToolInvokeMessage, ToolMessageStream};
use super::provider::StaticToolProvider;
use super::tool::{Tool, ToolInvokeContext, ToolRuntime};
use crate::error::Result;

pub type ToolHandler =
    Arc<dyn Fn(&ToolInvokeContext, Map<String, Value>) -> Result<ToolMessageStream> + Send + Sync>;

/// 进程内由闭包实现的工具
#[derive(Clone)]
pub struct FunctionTool {
    entity: ToolEntity,
    provider_type: ToolProviderType,
    runtime: ToolRuntime,
    handler: ToolHandler,
}

impl FunctionTool {
    pub fn new(provider_type: ToolProviderType, entity: ToolEntity, handler: ToolHandler) -> Self {
        Self {
            entity,
            provider_type,
            runtime: ToolRuntime::default(),
            handler,
        }
    }

    /// 处理函数一次性返回全部消息
    pub fn from_messages<F>(provider_type: ToolProviderType, entity: ToolEntity, produce: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Vec<ToolInvokeMessage>> + Send + Sync + 'static,
    {
        let handler: ToolHandler = Arc::new(
            move |_ctx: &ToolInvokeContext, parameters: Map<String, Value>| -> Result<ToolMessageStream> {
                let messages = produce(parameters)?;
                Ok(Box::pin(stream::iter(messages.into_iter().map(Ok))) as ToolMessageStream)
            },
        );
        Self::new(provider_type, entity, handler)
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn entity(&self) -> &ToolEntity {
        &self.entity
    }

    fn provider_type(&self) -> ToolProviderType {
        self.provider_type
    }

    fn runtime(&self) -> &ToolRuntime {
        &self.runtime
    }

    async fn invoke(
        &self,
        ctx: &ToolInvokeContext,
        parameters: Map<String, Value>,
    ) -> Result<ToolMessageStream> {
        tracing::debug!(
            tool = %self.entity.name(),
            provider_type = %self.provider_type,
            depth = ctx.workflow_call_depth,
            "invoking in-process tool"
        );
        (self.handler)(ctx, parameters)
    }

    fn fork_tool_runtime(&self, runtime: ToolRuntime) -> Arc<dyn Tool> {
        Arc::new(Self {
            runtime,
            ..self.clone()
        })
    }
}

/// 内置回显工具：`text` 原样输出，`link` 作为链接输出，全部参数另附一条 JSON
#[derive(Clone)]
pub struct EchoTool {
    entity: ToolEntity,
    runtime: ToolRuntime,
}

impl EchoTool {
    pub const PROVIDER: &'static str = "echo";

    pub fn new() -> Self {
        let entity = ToolEntity::new(Self::PROVIDER, "echo")
            .with_parameter(
                ToolParameter::new("text", ToolParameterType::String, ToolParameterForm::Llm)
                    .required(),
            )
            .with_parameter(ToolParameter::new(
                "link",
                ToolParameterType::String,
                ToolParameterForm::Form,
            ));
        Self {
            entity,
            runtime: ToolRuntime::default(),
        }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn entity(&self) -> &ToolEntity {
        &self.entity
    }

    fn provider_type(&self) -> ToolProviderType {
        ToolProviderType::BuiltIn
    }

    fn runtime(&self) -> &ToolRuntime {
        &self.runtime
    }

    async fn invoke(
        &self,
        _ctx: &ToolInvokeContext,
        parameters: Map<String, Value>,
    ) -> Result<ToolMessageStream> {
        let mut messages = Vec::new();
        match parameters.get("text") {
            Some(Value::String(text)) => messages.push(ToolInvokeMessage::text(text.clone())),
            Some(Value::Null) | None => {}
            Some(other) => messages.push(ToolInvokeMessage::text(other.to_string())),
        }
        if let Some(link) = parameters.get("link").and_then(Value::as_str) {
            if !link.is_empty() {
                messages.push(ToolInvokeMessage::link(link));
            }
        }
        messages.push(ToolInvokeMessage::json(parameters));
        Ok(Box::pin(stream::iter(messages.into_iter().map(Ok))))
    }

    fn fork_tool_runtime(&self, runtime: ToolRuntime) -> Arc<dyn Tool> {
        Arc::new(Self {
            entity: self.entity.clone(),
            runtime,
        })
    }
}

pub fn builtin_providers() -> Vec<StaticToolProvider> {
    vec![StaticToolProvider::builtin(EchoTool::PROVIDER).with_tool(Arc::new(EchoTool::new()))]
}
