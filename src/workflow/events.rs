use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;
use crate::tools::FileVar;

pub type NodeEventStream = Pin<Box<dyn Stream<Item = NodeEvent> + Send>>;

pub const TOOL_INFO_KEY: &str = "tool_info";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowNodeExecutionStatus {
    Succeeded,
    Failed,
}

/// 工具节点的三项固定输出
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolNodeOutputs {
    pub text: String,
    pub files: Vec<FileVar>,
    pub json: Vec<Map<String, Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeRunResult {
    pub status: WorkflowNodeExecutionStatus,
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<ToolNodeOutputs>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 失败类别：凭据错误需要重新填写凭据，配置错误需要修改节点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl NodeRunResult {
    pub fn succeeded(
        inputs: Map<String, Value>,
        outputs: ToolNodeOutputs,
        tool_info: Map<String, Value>,
    ) -> Self {
        Self {
            status: WorkflowNodeExecutionStatus::Succeeded,
            inputs,
            outputs: Some(outputs),
            metadata: metadata_with(tool_info),
            error: None,
            error_kind: None,
        }
    }

    /// 失败结果；已经收集到的部分输出通过 `outputs` 保留
    pub fn failed(
        inputs: Map<String, Value>,
        outputs: Option<ToolNodeOutputs>,
        tool_info: Map<String, Value>,
        kind: ErrorKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: WorkflowNodeExecutionStatus::Failed,
            inputs,
            outputs,
            metadata: metadata_with(tool_info),
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowNodeExecutionStatus::Succeeded
    }

    pub fn tool_info(&self) -> Option<&Map<String, Value>> {
        self.metadata.get(TOOL_INFO_KEY).and_then(Value::as_object)
    }
}

fn metadata_with(tool_info: Map<String, Value>) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(TOOL_INFO_KEY.to_string(), Value::Object(tool_info));
    metadata
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunStreamChunkEvent {
    pub from_variable_selector: Vec<String>,
    pub chunk_content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NodeEvent {
    StreamChunk(RunStreamChunkEvent),
    RunCompleted { run_result: NodeRunResult },
}

impl NodeEvent {
    pub fn is_completed(&self) -> bool {
        matches!(self, NodeEvent::RunCompleted { .. })
    }
}
