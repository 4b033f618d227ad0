use std::sync::Arc;

use futures::{stream, StreamExt};
use serde_json::{Map, Value};

use super::event_stream::{convert_to_event_stream, EventStreamBody, InvocationChunk, InvocationResponse};
use crate::error::{Result, ToolFlowError};
use crate::tools::{ToolInvokeContext, ToolReference, ToolRuntimeResolver};

/// 插件反向调用引擎中的工具，回复为事件流
pub struct BackwardsInvocation {
    resolver: Arc<dyn ToolRuntimeResolver>,
}

impl BackwardsInvocation {
    pub fn new(resolver: Arc<dyn ToolRuntimeResolver>) -> Self {
        Self { resolver }
    }

    /// 解析工具并调用；取工具或调用失败时回复一帧错误
    pub async fn invoke_tool(
        &self,
        tenant_id: &str,
        ctx: &ToolInvokeContext,
        reference: &ToolReference,
        parameters: Map<String, Value>,
    ) -> EventStreamBody {
        let response = match self.invoke_inner(tenant_id, ctx, reference, parameters).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(tool = %reference.tool_name, error = %err, "backwards tool invocation failed");
                InvocationResponse::from_stream(stream::iter([Err(err)]))
            }
        };
        convert_to_event_stream(response)
    }

    async fn invoke_inner(
        &self,
        tenant_id: &str,
        ctx: &ToolInvokeContext,
        reference: &ToolReference,
        parameters: Map<String, Value>,
    ) -> Result<InvocationResponse> {
        let tool = self
            .resolver
            .get_tool_runtime(tenant_id, &ctx.user_id, reference)
            .await?;
        let messages = tool.invoke(ctx, parameters).await?;
        let chunks = messages.map(|item| -> Result<InvocationChunk> {
            let message = item?;
            serde_json::to_value(message)
                .map(InvocationChunk::Data)
                .map_err(ToolFlowError::from)
        });
        Ok(InvocationResponse::from_stream(chunks))
    }
}
