use std::sync::Arc;

use futures::{stream, StreamExt};
use serde_json::{Map, Value};
use tracing::Instrument;

use super::binder::ParameterBinder;
use super::collector::MessageCollector;
use super::entities::ToolNodeData;
use super::events::{NodeEvent, NodeEventStream, NodeRunResult};
use crate::error::ToolFlowError;
use crate::state::VariablePool;
use crate::tools::{
    DynToolFileManager, FileOwner, ToolFileMessageTransformer, ToolInvokeContext,
    ToolMessageStream, ToolRuntimeResolver,
};

/// 工具节点
///
/// `run` 返回的事件流先按消息顺序产出文本片段，最后恰好产出一个
/// `RunCompleted`。任何失败都体现在结果的状态与错误信息里，不会向外抛出。
#[derive(Clone)]
pub struct ToolNode {
    node_id: String,
    tenant_id: String,
    ctx: ToolInvokeContext,
    data: ToolNodeData,
    resolver: Arc<dyn ToolRuntimeResolver>,
    files: DynToolFileManager,
}

struct ActiveRun {
    messages: ToolMessageStream,
    collector: MessageCollector,
    inputs: Map<String, Value>,
    tool_info: Map<String, Value>,
}

enum RunState {
    Start(ToolNode, Arc<VariablePool>),
    Streaming(ActiveRun),
    Done,
}

impl ToolNode {
    pub fn new(
        node_id: impl Into<String>,
        data: ToolNodeData,
        resolver: Arc<dyn ToolRuntimeResolver>,
        files: DynToolFileManager,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            tenant_id: String::new(),
            ctx: ToolInvokeContext::default(),
            data,
            resolver,
            files,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.ctx.user_id = user_id.into();
        self
    }

    /// 调度方提供的调用深度、线程池等标识，原样传给工具
    pub fn with_invoke_context(mut self, ctx: ToolInvokeContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn data(&self) -> &ToolNodeData {
        &self.data
    }

    pub fn run(&self, pool: Arc<VariablePool>) -> NodeEventStream {
        let initial = RunState::Start(self.clone(), pool);
        Box::pin(stream::unfold(initial, |mut state| async move {
            loop {
                state = match state {
                    RunState::Start(node, pool) => match node.start(pool).await {
                        Ok(run) => RunState::Streaming(run),
                        Err(result) => return Some((completed(result), RunState::Done)),
                    },
                    RunState::Streaming(mut run) => match run.messages.next().await {
                        Some(Ok(message)) => match run.collector.accept(&message) {
                            Ok(Some(chunk)) => {
                                return Some((NodeEvent::StreamChunk(chunk), RunState::Streaming(run)))
                            }
                            Ok(None) => RunState::Streaming(run),
                            Err(err) => {
                                tracing::warn!(
                                    kind = message.kind().as_str(),
                                    error = %err,
                                    "skipping tool message"
                                );
                                RunState::Streaming(run)
                            }
                        },
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "tool stream failed");
                            let result = NodeRunResult::failed(
                                run.inputs,
                                Some(run.collector.finish()),
                                run.tool_info,
                                err.kind(),
                                format!("Failed to invoke tool: {err}"),
                            );
                            return Some((completed(result), RunState::Done));
                        }
                        None => {
                            let result = NodeRunResult::succeeded(
                                run.inputs,
                                run.collector.finish(),
                                run.tool_info,
                            );
                            return Some((completed(result), RunState::Done));
                        }
                    },
                    RunState::Done => return None,
                };
            }
        }))
    }

    async fn start(self, pool: Arc<VariablePool>) -> Result<ActiveRun, NodeRunResult> {
        let span = tracing::info_span!(
            "tool_node",
            node_id = %self.node_id,
            provider = %self.data.provider_id,
            tool = %self.data.tool_name
        );
        self.start_inner(pool).instrument(span).await
    }

    async fn start_inner(self, pool: Arc<VariablePool>) -> Result<ActiveRun, NodeRunResult> {
        let tool_info = self.data.tool_info();
        let fail = |inputs: Map<String, Value>, operation: &str, err: ToolFlowError| {
            let error = format!("{operation}: {err}");
            tracing::warn!(%error, "tool node failed before streaming");
            NodeRunResult::failed(inputs, None, tool_info.clone(), err.kind(), error)
        };

        let tool = self
            .resolver
            .get_tool_runtime(&self.tenant_id, &self.ctx.user_id, &self.data.tool_reference())
            .await
            .map_err(|err| fail(Map::new(), "Failed to get tool runtime", err))?;

        let declared = tool
            .runtime_parameters()
            .await
            .map_err(|err| fail(Map::new(), "Failed to get tool parameters", err))?;

        let parameters = ParameterBinder::generate_parameters(&declared, &self.data, &pool, false)
            .map_err(|err| fail(Map::new(), "Failed to resolve tool parameters", err))?;
        let inputs = ParameterBinder::generate_parameters(&declared, &self.data, &pool, true)
            .map_err(|err| fail(Map::new(), "Failed to resolve tool parameters", err))?;

        tracing::info!(parameters = inputs.len(), "invoking tool");
        let messages = tool
            .invoke(&self.ctx, parameters)
            .await
            .map_err(|err| fail(inputs.clone(), "Failed to invoke tool", err))?;

        let owner = FileOwner {
            user_id: self.ctx.user_id.clone(),
            tenant_id: self.tenant_id.clone(),
            conversation_id: self.ctx.conversation_id.clone(),
        };
        let messages =
            ToolFileMessageTransformer::transform_tool_invoke_messages(messages, self.files, owner);

        Ok(ActiveRun {
            messages,
            collector: MessageCollector::new(self.node_id, self.tenant_id),
            inputs,
            tool_info,
        })
    }
}

fn completed(run_result: NodeRunResult) -> NodeEvent {
    NodeEvent::RunCompleted { run_result }
}
