use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::{Map, Value};

use super::entities::{ToolEntity, ToolProviderType};
use super::message::{ToolInvokeMessage, ToolMessageStream};
use super::tool::{Tool, ToolInvokeContext, ToolRuntime};
use crate::error::{Result, ToolFlowError};

const API_KEY_CREDENTIAL: &str = "api_key";
const AUTH_HEADER_CREDENTIAL: &str = "api_key_header_prefix";

/// 以 HTTP 接口描述的工具：参数作为 JSON 请求体 POST 到 `endpoint`
///
/// 凭据中的 `api_key` 作为 `Authorization` 头发送，默认前缀 `Bearer`。
/// 响应为 JSON 对象时产出 JSON 消息，否则把响应体作为文本。
#[derive(Clone)]
pub struct ApiTool {
    entity: ToolEntity,
    endpoint: String,
    runtime: ToolRuntime,
    client: reqwest::Client,
}

impl ApiTool {
    pub fn new(entity: ToolEntity, endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ToolFlowError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            entity,
            endpoint: endpoint.into(),
            runtime: ToolRuntime::default(),
            client,
        })
    }

    fn authorization(&self) -> Option<String> {
        let key = self
            .runtime
            .credentials
            .get(API_KEY_CREDENTIAL)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())?;
        let prefix = self
            .runtime
            .credentials
            .get(AUTH_HEADER_CREDENTIAL)
            .and_then(Value::as_str)
            .unwrap_or("Bearer");
        Some(format!("{prefix} {key}"))
    }
}

#[async_trait]
impl Tool for ApiTool {
    fn entity(&self) -> &ToolEntity {
        &self.entity
    }

    fn provider_type(&self) -> ToolProviderType {
        ToolProviderType::Api
    }

    fn runtime(&self) -> &ToolRuntime {
        &self.runtime
    }

    #[tracing::instrument(skip_all, fields(tool = %self.entity.name(), endpoint = %self.endpoint))]
    async fn invoke(
        &self,
        ctx: &ToolInvokeContext,
        parameters: Map<String, Value>,
    ) -> Result<ToolMessageStream> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("X-Toolflow-User", ctx.user_id.as_str());
        if let Some(auth) = self.authorization() {
            request = request.header("Authorization", auth);
        }

        let response = request
            .json(&Value::Object(parameters))
            .send()
            .await
            .map_err(|e| ToolFlowError::Transport(format!("HTTP request error: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolFlowError::Transport(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(ToolFlowError::Transport(format!(
                "request failed with status {status}: {}",
                truncate(&body, 500)
            )));
        }

        let message = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(object)) => ToolInvokeMessage::json(object),
            _ => ToolInvokeMessage::text(body),
        };
        Ok(Box::pin(stream::iter([Ok(message)])))
    }

    fn fork_tool_runtime(&self, runtime: ToolRuntime) -> Arc<dyn Tool> {
        Arc::new(Self {
            runtime,
            ..self.clone()
        })
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(已截断，总长度: {} 字节)", &text[..end], text.len())
}
