//! 工具：声明、消息、运行句柄与提供方

#[cfg(feature = "api-tool")]
pub mod api;
pub mod builtin;
pub mod entities;
pub mod file_transformer;
pub mod files;
pub mod message;
pub mod provider;
pub mod registry;
pub mod tool;

#[cfg(feature = "api-tool")]
pub use api::ApiTool;
pub use builtin::{builtin_providers, EchoTool, FunctionTool, ToolHandler};
pub use entities::{
    I18nObject, ProviderCredentialSchema, ToolDescription, ToolEntity, ToolIdentity,
    ToolParameter, ToolParameterForm, ToolParameterOption, ToolParameterType,
    ToolProviderEntityWithPlugin, ToolProviderIdentity, ToolProviderType,
};
pub use file_transformer::ToolFileMessageTransformer;
pub use files::{
    DynToolFileManager, FileOwner, FileTransferMethod, FileType, FileVar, MemoryToolFileManager,
    ToolFile, ToolFileManager,
};
pub use message::{MessagePayload, MessageType, ToolInvokeMessage, ToolMessageStream, VariableMessage};
pub use provider::{StaticToolProvider, ToolProviderController};
pub use registry::{ToolReference, ToolRegistry, ToolRuntimeResolver};
pub use tool::{DynTool, Tool, ToolInvokeContext, ToolRuntime};
