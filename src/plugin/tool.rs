use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::event_stream::{decode_event_stream, ValueStream};
use super::transport::{PluginInvokeRequest, PluginToolTarget, PluginTransport};
use crate::error::Result;
use crate::tools::{
    Tool, ToolEntity, ToolInvokeContext, ToolInvokeMessage, ToolMessageStream, ToolParameter,
    ToolProviderType, ToolRuntime,
};

/// 由插件进程提供的工具
///
/// 声明了 `has_runtime_parameters` 的工具在第一次取参数时向插件拉取，
/// 之后使用缓存。并发首次拉取时以最后一次写入为准。
pub struct PluginTool {
    entity: ToolEntity,
    runtime: ToolRuntime,
    plugin_id: String,
    transport: Arc<dyn PluginTransport>,
    runtime_parameters: RwLock<Option<Vec<ToolParameter>>>,
}

impl PluginTool {
    pub fn new(
        entity: ToolEntity,
        runtime: ToolRuntime,
        plugin_id: impl Into<String>,
        transport: Arc<dyn PluginTransport>,
    ) -> Self {
        Self {
            entity,
            runtime,
            plugin_id: plugin_id.into(),
            transport,
            runtime_parameters: RwLock::new(None),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    fn target(&self, user_id: &str) -> PluginToolTarget {
        PluginToolTarget {
            tenant_id: self.runtime.tenant_id.clone(),
            user_id: user_id.to_string(),
            plugin_id: self.plugin_id.clone(),
            provider: self.entity.provider().to_string(),
            tool: self.entity.name().to_string(),
            credentials: self.runtime.credentials.clone(),
        }
    }
}

#[async_trait]
impl Tool for PluginTool {
    fn entity(&self) -> &ToolEntity {
        &self.entity
    }

    fn provider_type(&self) -> ToolProviderType {
        ToolProviderType::Plugin
    }

    fn runtime(&self) -> &ToolRuntime {
        &self.runtime
    }

    async fn runtime_parameters(&self) -> Result<Vec<ToolParameter>> {
        if !self.entity.has_runtime_parameters {
            return Ok(self.entity.parameters.clone());
        }
        let cached = self.runtime_parameters.read().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let fetched = self.transport.runtime_parameters(&self.target("")).await?;
        tracing::debug!(
            tool = %self.entity.name(),
            count = fetched.len(),
            "fetched runtime parameters from plugin"
        );
        *self.runtime_parameters.write() = Some(fetched.clone());
        Ok(fetched)
    }

    async fn invoke(
        &self,
        ctx: &ToolInvokeContext,
        parameters: Map<String, Value>,
    ) -> Result<ToolMessageStream> {
        let request = PluginInvokeRequest {
            target: self.target(&ctx.user_id),
            tool_parameters: parameters,
            conversation_id: ctx.conversation_id.clone(),
        };
        let bytes = self.transport.invoke_tool(request).await?;
        Ok(Box::pin(PluginMessageStream::new(
            decode_event_stream(bytes),
            self.entity.name(),
        )))
    }

    fn fork_tool_runtime(&self, runtime: ToolRuntime) -> Arc<dyn Tool> {
        Arc::new(PluginTool::new(
            self.entity.clone(),
            runtime,
            self.plugin_id.clone(),
            Arc::clone(&self.transport),
        ))
    }
}

/// 插件返回的消息流
///
/// 无法解析为工具消息的帧记录警告后跳过。未读完即被丢弃时释放底层连接。
pub struct PluginMessageStream {
    frames: ValueStream,
    tool: String,
    finished: bool,
}

impl PluginMessageStream {
    pub fn new(frames: ValueStream, tool: impl Into<String>) -> Self {
        Self {
            frames,
            tool: tool.into(),
            finished: false,
        }
    }
}

impl Stream for PluginMessageStream {
    type Item = Result<ToolInvokeMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.frames.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(value))) => {
                    match serde_json::from_value::<ToolInvokeMessage>(value) {
                        Ok(message) => return Poll::Ready(Some(Ok(message))),
                        Err(err) => {
                            tracing::warn!(
                                tool = %this.tool,
                                error = %err,
                                "skipping malformed tool message from plugin"
                            );
                        }
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for PluginMessageStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(tool = %self.tool, "plugin message stream abandoned, closing connection");
        }
    }
}
