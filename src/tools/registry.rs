use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entities::{ToolEntity, ToolProviderType};
use super::provider::ToolProviderController;
use super::tool::{Tool, ToolRuntime};
use crate::error::{Result, ToolFlowError};

/// 节点配置中对工具的引用
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ToolReference {
    pub provider_type: ToolProviderType,
    pub provider_id: String,
    pub tool_name: String,
}

impl ToolReference {
    pub fn new(
        provider_type: ToolProviderType,
        provider_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            provider_type,
            provider_id: provider_id.into(),
            tool_name: tool_name.into(),
        }
    }
}

/// 按租户解析出可调用的工具句柄
#[async_trait]
pub trait ToolRuntimeResolver: Send + Sync {
    async fn get_tool_runtime(
        &self,
        tenant_id: &str,
        user_id: &str,
        reference: &ToolReference,
    ) -> Result<Arc<dyn Tool>>;
}

type ProviderKey = (ToolProviderType, String);
type CredentialKey = (String, ToolProviderType, String);

/// 工具提供方注册表
///
/// 凭据按 (租户, 提供方类型, 提供方) 保存；校验通过的组合会被记住，
/// 重新设置凭据后需要再次校验。
#[derive(Default)]
pub struct ToolRegistry {
    providers: RwLock<HashMap<ProviderKey, Arc<dyn ToolProviderController>>>,
    credentials: RwLock<HashMap<CredentialKey, Map<String, Value>>>,
    validated: RwLock<HashSet<CredentialKey>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置提供方
    pub fn with_builtin_providers(self) -> Self {
        for provider in super::builtin::builtin_providers() {
            self.register_provider(Arc::new(provider));
        }
        self
    }

    pub fn register_provider(&self, provider: Arc<dyn ToolProviderController>) {
        let key = (provider.provider_type(), provider.name().to_string());
        tracing::debug!(provider_type = %key.0, provider = %key.1, "registering tool provider");
        if self.providers.write().insert(key, provider).is_some() {
            tracing::warn!("tool provider replaced an existing registration");
        }
    }

    pub fn provider(
        &self,
        provider_type: ToolProviderType,
        provider_id: &str,
    ) -> Option<Arc<dyn ToolProviderController>> {
        self.providers
            .read()
            .get(&(provider_type, provider_id.to_string()))
            .cloned()
    }

    pub fn set_credentials(
        &self,
        tenant_id: &str,
        provider_type: ToolProviderType,
        provider_id: &str,
        credentials: Map<String, Value>,
    ) {
        let key = (tenant_id.to_string(), provider_type, provider_id.to_string());
        self.validated.write().remove(&key);
        self.credentials.write().insert(key, credentials);
    }

    /// 列出全部提供方及其工具声明，按类型和名称排序
    pub fn list_tools(&self) -> Vec<(ToolProviderType, String, Vec<ToolEntity>)> {
        let mut listed: Vec<_> = self
            .providers
            .read()
            .iter()
            .map(|((kind, name), provider)| (*kind, name.clone(), provider.get_tools()))
            .collect();
        listed.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        listed
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

#[async_trait]
impl ToolRuntimeResolver for ToolRegistry {
    async fn get_tool_runtime(
        &self,
        tenant_id: &str,
        user_id: &str,
        reference: &ToolReference,
    ) -> Result<Arc<dyn Tool>> {
        let provider = self
            .provider(reference.provider_type, &reference.provider_id)
            .ok_or_else(|| {
                ToolFlowError::ProviderNotFound(format!(
                    "{}/{}",
                    reference.provider_type, reference.provider_id
                ))
            })?;

        let key = (
            tenant_id.to_string(),
            reference.provider_type,
            reference.provider_id.clone(),
        );
        let credentials = self.credentials.read().get(&key).cloned().unwrap_or_default();
        let already_validated = self.validated.read().contains(&key);
        if !already_validated {
            provider.validate_credentials(user_id, &credentials).await?;
            self.validated.write().insert(key);
        }

        let runtime = ToolRuntime::new(tenant_id).with_credentials(credentials);
        provider.get_tool(&reference.tool_name, runtime)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::tools::builtin::EchoTool;

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolProviderController for CountingProvider {
        fn provider_type(&self) -> ToolProviderType {
            ToolProviderType::Api
        }

        fn name(&self) -> &str {
            "counting"
        }

        async fn validate_credentials(
            &self,
            _user_id: &str,
            credentials: &Map<String, Value>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if credentials.contains_key("api_key") {
                Ok(())
            } else {
                Err(ToolFlowError::CredentialValidation("api_key is required".into()))
            }
        }

        fn get_tool(&self, _tool_name: &str, runtime: ToolRuntime) -> Result<Arc<dyn Tool>> {
            Ok(EchoTool::new().fork_tool_runtime(runtime))
        }

        fn get_tools(&self) -> Vec<ToolEntity> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn validated_credentials_are_remembered_until_replaced() {
        let registry = ToolRegistry::new();
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        registry.register_provider(provider.clone());
        let reference = ToolReference::new(ToolProviderType::Api, "counting", "echo");

        let err = registry
            .get_tool_runtime("t1", "u1", &reference)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ToolFlowError::CredentialValidation(_)));

        let mut credentials = Map::new();
        credentials.insert("api_key".into(), Value::from("k"));
        registry.set_credentials("t1", ToolProviderType::Api, "counting", credentials);

        let tool = registry.get_tool_runtime("t1", "u1", &reference).await.unwrap();
        assert_eq!(tool.runtime().tenant_id, "t1");
        registry.get_tool_runtime("t1", "u1", &reference).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_provider_and_tool() {
        let registry = ToolRegistry::new().with_builtin_providers();
        let missing_provider = ToolReference::new(ToolProviderType::BuiltIn, "nope", "echo");
        assert!(matches!(
            registry.get_tool_runtime("t", "u", &missing_provider).await,
            Err(ToolFlowError::ProviderNotFound(_))
        ));

        let missing_tool = ToolReference::new(ToolProviderType::BuiltIn, "echo", "nope");
        assert!(matches!(
            registry.get_tool_runtime("t", "u", &missing_tool).await,
            Err(ToolFlowError::ToolRuntimeNotFound { .. })
        ));
    }
}
