use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::tool::PluginTool;
use super::transport::PluginTransport;
use crate::error::{Result, ToolFlowError};
use crate::tools::{
    Tool, ToolEntity, ToolProviderController, ToolProviderEntityWithPlugin, ToolProviderType,
    ToolRuntime,
};

/// 插件声明的工具提供方
///
/// 注册名为 `plugin_id/provider`，与节点配置中的 `provider_id` 对应。
pub struct PluginToolProvider {
    entity: ToolProviderEntityWithPlugin,
    tenant_id: String,
    plugin_id: String,
    name: String,
    transport: Arc<dyn PluginTransport>,
}

impl PluginToolProvider {
    pub fn new(
        entity: ToolProviderEntityWithPlugin,
        tenant_id: impl Into<String>,
        plugin_id: impl Into<String>,
        transport: Arc<dyn PluginTransport>,
    ) -> Self {
        let plugin_id = plugin_id.into();
        let name = format!("{}/{}", plugin_id, entity.identity.name);
        Self {
            entity,
            tenant_id: tenant_id.into(),
            plugin_id,
            name,
            transport,
        }
    }

    pub fn entity(&self) -> &ToolProviderEntityWithPlugin {
        &self.entity
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

#[async_trait]
impl ToolProviderController for PluginToolProvider {
    fn provider_type(&self) -> ToolProviderType {
        ToolProviderType::Plugin
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn validate_credentials(
        &self,
        user_id: &str,
        credentials: &Map<String, Value>,
    ) -> Result<()> {
        let missing = self.entity.missing_credentials(credentials);
        if !missing.is_empty() {
            return Err(ToolFlowError::CredentialValidation(format!(
                "missing required credentials: {}",
                missing.join(", ")
            )));
        }
        if self.entity.credentials_schema.is_empty() {
            return Ok(());
        }

        let valid = self
            .transport
            .validate_credentials(
                &self.tenant_id,
                user_id,
                &self.plugin_id,
                &self.entity.identity.name,
                credentials,
            )
            .await?;
        if valid {
            Ok(())
        } else {
            Err(ToolFlowError::CredentialValidation("Invalid credentials".into()))
        }
    }

    fn get_tool(&self, tool_name: &str, runtime: ToolRuntime) -> Result<Arc<dyn Tool>> {
        let entity = self
            .entity
            .tools
            .iter()
            .find(|tool| tool.name() == tool_name)
            .ok_or_else(|| ToolFlowError::ToolRuntimeNotFound {
                provider: self.name.clone(),
                tool: tool_name.to_string(),
            })?;
        Ok(Arc::new(PluginTool::new(
            entity.clone(),
            runtime,
            self.plugin_id.clone(),
            Arc::clone(&self.transport),
        )))
    }

    fn get_tools(&self) -> Vec<ToolEntity> {
        self.entity.tools.clone()
    }
}
