use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event_stream::ByteStream;
use crate::error::Result;
use crate::tools::ToolParameter;

/// 插件进程侧的工具定位
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PluginToolTarget {
    pub tenant_id: String,
    pub user_id: String,
    pub plugin_id: String,
    pub provider: String,
    pub tool: String,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PluginInvokeRequest {
    #[serde(flatten)]
    pub target: PluginToolTarget,
    #[serde(default)]
    pub tool_parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// 与插件守护进程之间的调用约定
///
/// `invoke_tool` 返回原始事件流字节，由调用方解码。
#[async_trait]
pub trait PluginTransport: Send + Sync {
    async fn invoke_tool(&self, request: PluginInvokeRequest) -> Result<ByteStream>;

    async fn runtime_parameters(&self, target: &PluginToolTarget) -> Result<Vec<ToolParameter>>;

    async fn validate_credentials(
        &self,
        tenant_id: &str,
        user_id: &str,
        plugin_id: &str,
        provider: &str,
        credentials: &Map<String, Value>,
    ) -> Result<bool>;
}

#[cfg(feature = "plugin-http")]
pub use http::HttpPluginTransport;

#[cfg(feature = "plugin-http")]
mod http {
    use futures::{StreamExt, TryStreamExt};
    use serde::de::DeserializeOwned;
    use serde_json::json;

    use super::*;
    use crate::config::PluginDaemonConfig;
    use crate::error::ToolFlowError;
    use crate::plugin::event_stream::decode_event_stream;

    /// 通过 HTTP 访问插件守护进程
    #[derive(Clone)]
    pub struct HttpPluginTransport {
        client: reqwest::Client,
        config: PluginDaemonConfig,
    }

    #[derive(Deserialize)]
    struct RuntimeParametersReply {
        #[serde(default)]
        parameters: Vec<ToolParameter>,
    }

    #[derive(Deserialize)]
    struct ValidateCredentialsReply {
        result: bool,
    }

    impl HttpPluginTransport {
        pub fn new(config: PluginDaemonConfig) -> Result<Self> {
            let client = reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(config.timeout())
                .build()
                .map_err(|e| ToolFlowError::Config(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client, config })
        }

        pub fn from_env() -> Result<Self> {
            Self::new(PluginDaemonConfig::from_env()?)
        }

        async fn request_stream(
            &self,
            tenant_id: &str,
            plugin_id: &str,
            action: &str,
            body: Value,
        ) -> Result<ByteStream> {
            let url = self
                .config
                .endpoint(&format!("plugin/{tenant_id}/dispatch/{action}"));
            let mut request = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("X-Plugin-ID", plugin_id);
            if !self.config.api_key.is_empty() {
                request = request.header("X-Api-Key", self.config.api_key.as_str());
            }

            tracing::debug!(%url, plugin = plugin_id, "dispatching to plugin daemon");
            let response = request
                .json(&body)
                .send()
                .await
                .map_err(|e| ToolFlowError::Transport(format!("plugin daemon unreachable: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ToolFlowError::PluginDaemon(format!(
                    "request to {url} failed with status {status}: {text}"
                )));
            }

            Ok(Box::pin(
                response
                    .bytes_stream()
                    .map_ok(|bytes| bytes.to_vec())
                    .map_err(|e| ToolFlowError::Transport(format!("plugin stream broken: {e}"))),
            ))
        }

        async fn request_single<T: DeserializeOwned>(
            &self,
            tenant_id: &str,
            plugin_id: &str,
            action: &str,
            body: Value,
        ) -> Result<T> {
            let bytes = self.request_stream(tenant_id, plugin_id, action, body).await?;
            let mut values = decode_event_stream(bytes);
            match values.next().await {
                Some(value) => Ok(serde_json::from_value(value?)?),
                None => Err(ToolFlowError::PluginDaemon(format!(
                    "`{action}` returned no data"
                ))),
            }
        }
    }

    #[async_trait]
    impl PluginTransport for HttpPluginTransport {
        async fn invoke_tool(&self, request: PluginInvokeRequest) -> Result<ByteStream> {
            let body = json!({
                "user_id": request.target.user_id,
                "conversation_id": request.conversation_id,
                "data": {
                    "provider": request.target.provider,
                    "tool": request.target.tool,
                    "credentials": request.target.credentials,
                    "tool_parameters": request.tool_parameters,
                },
            });
            self.request_stream(
                &request.target.tenant_id,
                &request.target.plugin_id,
                "tool/invoke",
                body,
            )
            .await
        }

        async fn runtime_parameters(
            &self,
            target: &PluginToolTarget,
        ) -> Result<Vec<ToolParameter>> {
            let body = json!({
                "user_id": target.user_id,
                "data": {
                    "provider": target.provider,
                    "tool": target.tool,
                    "credentials": target.credentials,
                },
            });
            let reply: RuntimeParametersReply = self
                .request_single(
                    &target.tenant_id,
                    &target.plugin_id,
                    "tool/get_runtime_parameters",
                    body,
                )
                .await?;
            Ok(reply.parameters)
        }

        async fn validate_credentials(
            &self,
            tenant_id: &str,
            user_id: &str,
            plugin_id: &str,
            provider: &str,
            credentials: &Map<String, Value>,
        ) -> Result<bool> {
            let body = json!({
                "user_id": user_id,
                "data": {
                    "provider": provider,
                    "credentials": credentials,
                },
            });
            let reply: ValidateCredentialsReply = self
                .request_single(tenant_id, plugin_id, "tool/validate_credentials", body)
                .await?;
            Ok(reply.result)
        }
    }
}
