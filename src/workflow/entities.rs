use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ToolFlowError};
use crate::state::Selector;
use crate::tools::{ToolProviderType, ToolReference};
use crate::utils::ConfigValidator;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolInputType {
    Constant,
    Variable,
    Mixed,
}

/// 节点上某个参数的取值方式
///
/// `variable` 的值必须是字符串数组（变量路径），`mixed` 的值必须是模板字符串。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawToolInput")]
pub struct ToolInput {
    #[serde(rename = "type")]
    pub input_type: ToolInputType,
    pub value: Value,
}

#[derive(Deserialize)]
struct RawToolInput {
    #[serde(rename = "type")]
    input_type: ToolInputType,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawToolInput> for ToolInput {
    type Error = ToolFlowError;

    fn try_from(raw: RawToolInput) -> Result<Self> {
        match raw.input_type {
            ToolInputType::Variable => {
                let valid = raw
                    .value
                    .as_array()
                    .is_some_and(|parts| !parts.is_empty() && parts.iter().all(Value::is_string));
                if !valid {
                    return Err(ToolFlowError::Config(format!(
                        "variable input must be a list of strings, got {}",
                        raw.value
                    )));
                }
            }
            ToolInputType::Mixed if !raw.value.is_string() => {
                return Err(ToolFlowError::Config(format!(
                    "mixed input must be a string, got {}",
                    raw.value
                )));
            }
            _ => {}
        }
        Ok(Self {
            input_type: raw.input_type,
            value: raw.value,
        })
    }
}

impl ToolInput {
    pub fn constant(value: impl Into<Value>) -> Self {
        Self {
            input_type: ToolInputType::Constant,
            value: value.into(),
        }
    }

    pub fn variable(selector: &Selector) -> Self {
        Self {
            input_type: ToolInputType::Variable,
            value: Value::from(selector.segments().to_vec()),
        }
    }

    pub fn mixed(template: impl Into<String>) -> Self {
        Self {
            input_type: ToolInputType::Mixed,
            value: Value::String(template.into()),
        }
    }

    /// `variable` 输入对应的变量路径
    pub fn selector(&self) -> Option<Selector> {
        if self.input_type != ToolInputType::Variable {
            return None;
        }
        let parts = self.value.as_array()?;
        Some(Selector::new(parts.iter().filter_map(Value::as_str)))
    }

    /// 常量和模板的文本形式；数字、布尔等常量取其 JSON 文本
    pub fn template(&self) -> Option<Cow<'_, str>> {
        match (self.input_type, &self.value) {
            (ToolInputType::Variable, _) => None,
            (_, Value::String(text)) => Some(Cow::Borrowed(text)),
            (_, Value::Null) => Some(Cow::Borrowed("")),
            (_, other) => Some(Cow::Owned(other.to_string())),
        }
    }
}

/// 工具节点配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolNodeData {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub provider_type: ToolProviderType,
    pub provider_id: String,
    #[serde(default)]
    pub provider_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_label: String,
    /// 按参数名排序，保证两次绑定的键顺序一致
    #[serde(default)]
    pub tool_parameters: BTreeMap<String, ToolInput>,
    #[serde(default)]
    pub tool_configurations: Map<String, Value>,
}

impl ToolNodeData {
    pub fn new(
        provider_type: ToolProviderType,
        provider_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        let tool_name = tool_name.into();
        Self {
            title: tool_name.clone(),
            desc: None,
            provider_type,
            provider_id: provider_id.into(),
            provider_name: String::new(),
            tool_label: tool_name.clone(),
            tool_name,
            tool_parameters: BTreeMap::new(),
            tool_configurations: Map::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, input: ToolInput) -> Self {
        self.tool_parameters.insert(name.into(), input);
        self
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let data: Self = serde_json::from_value(value)?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate_tool_name(&self.provider_id)?;
        ConfigValidator::validate_tool_name(&self.tool_name)
    }

    pub fn tool_reference(&self) -> ToolReference {
        ToolReference::new(self.provider_type, self.provider_id.clone(), self.tool_name.clone())
    }

    /// 结果元数据中的 `tool_info`
    pub fn tool_info(&self) -> Map<String, Value> {
        let mut info = Map::new();
        info.insert(
            "provider_type".to_string(),
            Value::from(self.provider_type.as_str()),
        );
        info.insert("provider_id".to_string(), Value::from(self.provider_id.clone()));
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inputs_are_checked_on_load() {
        let data = ToolNodeData::from_json(json!({
            "provider_type": "builtin",
            "provider_id": "echo",
            "tool_name": "echo",
            "tool_parameters": {
                "text": {"type": "mixed", "value": "hi {{#start.name#}}"},
                "count": {"type": "constant", "value": 3},
                "query": {"type": "variable", "value": ["start", "query"]}
            }
        }))
        .unwrap();
        assert_eq!(
            data.tool_parameters["query"].selector(),
            Some(Selector::new(["start", "query"]))
        );
        assert_eq!(data.tool_parameters["count"].template().as_deref(), Some("3"));
        assert_eq!(data.tool_parameters["query"].template(), None);

        let err = serde_json::from_value::<ToolInput>(json!({"type": "variable", "value": "x"}));
        assert!(err.is_err());
        let err = serde_json::from_value::<ToolInput>(json!({"type": "mixed", "value": 1}));
        assert!(err.is_err());
    }
}
