use std::pin::Pin;

use base64::{engine::general_purpose, Engine as _};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ToolFlowError};
use crate::utils::ConfigValidator;

pub type ToolMessageStream = Pin<Box<dyn Stream<Item = Result<ToolInvokeMessage>> + Send>>;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Link,
    Blob,
    Json,
    ImageLink,
    FileVar,
    Variable,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Link => "link",
            MessageType::Blob => "blob",
            MessageType::Json => "json",
            MessageType::ImageLink => "image_link",
            MessageType::FileVar => "file_var",
            MessageType::Variable => "variable",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VariableMessage {
    pub variable_name: String,
    pub variable_value: Value,
    #[serde(default)]
    pub stream: bool,
}

impl VariableMessage {
    fn validate(&self) -> Result<()> {
        ConfigValidator::validate_variable_name(&self.variable_name)?;
        if self.variable_value.is_null() {
            return Err(ToolFlowError::InvalidMessage(format!(
                "variable `{}` has no value",
                self.variable_name
            )));
        }
        if self.stream && !self.variable_value.is_string() {
            return Err(ToolFlowError::InvalidMessage(format!(
                "streamed variable `{}` must carry a string value",
                self.variable_name
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MessagePayload {
    Text(String),
    Json(Map<String, Value>),
    Blob(Vec<u8>),
    Variable(VariableMessage),
}

impl MessagePayload {
    fn shape(&self) -> &'static str {
        match self {
            MessagePayload::Text(_) => "text",
            MessagePayload::Json(_) => "json_object",
            MessagePayload::Blob(_) => "blob",
            MessagePayload::Variable(_) => "variable",
        }
    }
}

/// 工具返回的单条消息
///
/// 消息类型与负载形状在构造时校验，之后只读。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawToolInvokeMessage", into = "RawToolInvokeMessage")]
pub struct ToolInvokeMessage {
    kind: MessageType,
    payload: Option<MessagePayload>,
    meta: Map<String, Value>,
    save_as: String,
}

impl ToolInvokeMessage {
    pub fn new(kind: MessageType, payload: Option<MessagePayload>) -> Result<Self> {
        check_payload(kind, payload.as_ref())?;
        Ok(Self {
            kind,
            payload,
            meta: Map::new(),
            save_as: String::new(),
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::unchecked(MessageType::Text, MessagePayload::Text(text.into()))
    }

    pub fn link(url: impl Into<String>) -> Self {
        Self::unchecked(MessageType::Link, MessagePayload::Text(url.into()))
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::unchecked(MessageType::Image, MessagePayload::Text(url.into()))
    }

    pub fn image_link(url: impl Into<String>) -> Self {
        Self::unchecked(MessageType::ImageLink, MessagePayload::Text(url.into()))
    }

    pub fn blob(data: Vec<u8>) -> Self {
        Self::unchecked(MessageType::Blob, MessagePayload::Blob(data))
    }

    pub fn json(object: Map<String, Value>) -> Self {
        Self::unchecked(MessageType::Json, MessagePayload::Json(object))
    }

    pub fn try_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self::json(object)),
            other => Err(ToolFlowError::InvalidMessage(format!(
                "json message must carry an object, got {other}"
            ))),
        }
    }

    pub fn variable(name: impl Into<String>, value: Value, stream: bool) -> Result<Self> {
        Self::new(
            MessageType::Variable,
            Some(MessagePayload::Variable(VariableMessage {
                variable_name: name.into(),
                variable_value: value,
                stream,
            })),
        )
    }

    fn unchecked(kind: MessageType, payload: MessagePayload) -> Self {
        Self {
            kind,
            payload: Some(payload),
            meta: Map::new(),
            save_as: String::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_save_as(mut self, save_as: impl Into<String>) -> Self {
        self.save_as = save_as.into();
        self
    }

    /// 用新的类型与负载替换，保留 meta 与 save_as
    pub fn replace(self, kind: MessageType, payload: MessagePayload) -> Result<Self> {
        check_payload(kind, Some(&payload))?;
        Ok(Self {
            kind,
            payload: Some(payload),
            ..self
        })
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn payload(&self) -> Option<&MessagePayload> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<MessagePayload> {
        self.payload
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }

    pub fn save_as(&self) -> &str {
        &self.save_as
    }

    pub fn text_payload(&self) -> Option<&str> {
        match &self.payload {
            Some(MessagePayload::Text(text)) => Some(text),
            _ => None,
        }
    }
}

fn check_payload(kind: MessageType, payload: Option<&MessagePayload>) -> Result<()> {
    let valid = match (kind, payload) {
        (
            MessageType::Text | MessageType::Link | MessageType::Image | MessageType::ImageLink,
            Some(MessagePayload::Text(_)),
        ) => true,
        (MessageType::Json, Some(MessagePayload::Json(_))) => true,
        // blob 在托管后以 URL 文本继续传递
        (MessageType::Blob, Some(MessagePayload::Blob(_) | MessagePayload::Text(_))) => true,
        (MessageType::Variable, Some(MessagePayload::Variable(variable))) => {
            variable.validate()?;
            true
        }
        (
            MessageType::FileVar,
            None | Some(MessagePayload::Text(_) | MessagePayload::Json(_)),
        ) => true,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ToolFlowError::InvalidMessage(format!(
            "`{}` message cannot carry a {} payload",
            kind.as_str(),
            payload.map_or("missing", MessagePayload::shape)
        )))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Variable {
        variable_name: String,
        variable_value: Value,
        #[serde(default)]
        stream: bool,
    },
    Json {
        json_object: Map<String, Value>,
    },
    Blob {
        blob: String,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize, Deserialize)]
struct RawToolInvokeMessage {
    #[serde(rename = "type", default)]
    kind: MessageType,
    #[serde(default)]
    message: Option<RawPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Map<String, Value>>,
    #[serde(default)]
    save_as: String,
}

impl TryFrom<RawToolInvokeMessage> for ToolInvokeMessage {
    type Error = ToolFlowError;

    fn try_from(raw: RawToolInvokeMessage) -> Result<Self> {
        let payload = raw.message.map(|payload| match payload {
            RawPayload::Text { text } => MessagePayload::Text(text),
            RawPayload::Json { json_object } => MessagePayload::Json(json_object),
            RawPayload::Blob { blob } => MessagePayload::Blob(
                general_purpose::STANDARD
                    .decode(blob.as_bytes())
                    .unwrap_or_else(|_| blob.into_bytes()),
            ),
            RawPayload::Variable {
                variable_name,
                variable_value,
                stream,
            } => MessagePayload::Variable(VariableMessage {
                variable_name,
                variable_value,
                stream,
            }),
        });
        let mut message = ToolInvokeMessage::new(raw.kind, payload)?;
        message.meta = raw.meta.unwrap_or_default();
        message.save_as = raw.save_as;
        Ok(message)
    }
}

impl From<ToolInvokeMessage> for RawToolInvokeMessage {
    fn from(message: ToolInvokeMessage) -> Self {
        let payload = message.payload.map(|payload| match payload {
            MessagePayload::Text(text) => RawPayload::Text { text },
            MessagePayload::Json(json_object) => RawPayload::Json { json_object },
            MessagePayload::Blob(data) => RawPayload::Blob {
                blob: general_purpose::STANDARD.encode(data),
            },
            MessagePayload::Variable(variable) => RawPayload::Variable {
                variable_name: variable.variable_name,
                variable_value: variable.variable_value,
                stream: variable.stream,
            },
        });
        Self {
            kind: message.kind,
            message: payload,
            meta: if message.meta.is_empty() {
                None
            } else {
                Some(message.meta)
            },
            save_as: message.save_as,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_blob_from_base64() {
        let message: ToolInvokeMessage = serde_json::from_value(json!({
            "type": "blob",
            "message": {"blob": "aGVsbG8="},
            "meta": {"mime_type": "text/plain"},
            "save_as": "hello.txt"
        }))
        .unwrap();
        assert_eq!(message.kind(), MessageType::Blob);
        assert_eq!(message.payload(), Some(&MessagePayload::Blob(b"hello".to_vec())));
        assert_eq!(message.meta_str("mime_type"), Some("text/plain"));
        assert_eq!(message.save_as(), "hello.txt");
    }

    #[test]
    fn rejects_mismatched_kind_and_payload() {
        let err = serde_json::from_value::<ToolInvokeMessage>(json!({
            "type": "image",
            "message": {"json_object": {"k": 1}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("image"));

        assert!(ToolInvokeMessage::new(MessageType::Json, None).is_err());
    }

    #[test]
    fn variable_messages_are_validated() {
        assert!(ToolInvokeMessage::variable("text", json!("x"), false).is_err());
        assert!(ToolInvokeMessage::variable("summary", json!(3), true).is_err());
        assert!(ToolInvokeMessage::variable("summary", json!("partial"), true).is_ok());
    }

    #[test]
    fn serializes_wire_shape() {
        let value = serde_json::to_value(
            ToolInvokeMessage::blob(b"hi".to_vec()).with_save_as("a.bin"),
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "blob", "message": {"blob": "aGk="}, "save_as": "a.bin"})
        );
    }
}
