pub mod cli;
pub mod config;
pub mod error;
pub mod plugin;
pub mod state;
pub mod template;
pub mod tools;
pub mod utils;
pub mod workflow;

pub use cli::{load_plugin_manifests, run_node_as_event_stream};
pub use config::{EnvConfig, FileUrlConfig, PluginDaemonConfig};
pub use error::{ErrorKind, Result, ToolFlowError};
#[cfg(feature = "plugin-http")]
pub use plugin::HttpPluginTransport;
pub use plugin::{
    convert_to_event_stream, decode_event_stream, BackwardsInvocation,
    BackwardsInvocationResponse, EventFrame, EventStreamBody, EventStreamDecoder,
    InvocationChunk, InvocationResponse, PluginManifest, PluginRegistry, PluginTool,
    PluginToolProvider, PluginTransport,
};
pub use state::{Segment, Selector, VariablePool};
pub use template::{convert_template, SegmentGroup, VariableTemplateParser};
#[cfg(feature = "api-tool")]
pub use tools::ApiTool;
pub use tools::{
    EchoTool, FileVar, FunctionTool, MemoryToolFileManager, MessageType, StaticToolProvider, Tool,
    ToolEntity, ToolFileManager, ToolInvokeContext, ToolInvokeMessage, ToolParameter,
    ToolProviderController, ToolProviderType, ToolReference, ToolRegistry, ToolRuntime,
    ToolRuntimeResolver,
};
pub use utils::{logging, validation};
pub use workflow::{
    extract_variable_selector_mapping, NodeEvent, NodeRunResult, ParameterBinder, ToolInput,
    ToolNode, ToolNodeData, WorkflowNodeExecutionStatus,
};
