//! 工具节点：参数绑定、消息折叠与运行事件

pub mod binder;
pub mod collector;
pub mod entities;
pub mod events;
pub mod node;

pub use binder::{extract_variable_selector_mapping, ParameterBinder};
pub use collector::MessageCollector;
pub use entities::{ToolInput, ToolInputType, ToolNodeData};
pub use events::{
    NodeEvent, NodeEventStream, NodeRunResult, RunStreamChunkEvent, ToolNodeOutputs,
    WorkflowNodeExecutionStatus, TOOL_INFO_KEY,
};
pub use node::ToolNode;
