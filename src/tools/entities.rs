use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ToolFlowError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ToolProviderType {
    #[serde(rename = "plugin")]
    Plugin,
    #[serde(rename = "builtin")]
    BuiltIn,
    #[serde(rename = "workflow")]
    Workflow,
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "app")]
    App,
    #[serde(rename = "dataset-retrieval")]
    DatasetRetrieval,
}

impl ToolProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolProviderType::Plugin => "plugin",
            ToolProviderType::BuiltIn => "builtin",
            ToolProviderType::Workflow => "workflow",
            ToolProviderType::Api => "api",
            ToolProviderType::App => "app",
            ToolProviderType::DatasetRetrieval => "dataset-retrieval",
        }
    }

    pub fn value_of(value: &str) -> Result<Self> {
        [
            ToolProviderType::Plugin,
            ToolProviderType::BuiltIn,
            ToolProviderType::Workflow,
            ToolProviderType::Api,
            ToolProviderType::App,
            ToolProviderType::DatasetRetrieval,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == value)
        .ok_or_else(|| ToolFlowError::Config(format!("invalid provider type value {value}")))
    }
}

impl fmt::Display for ToolProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolParameterType {
    String,
    Number,
    Boolean,
    Select,
    SecretInput,
    File,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterForm {
    /// 添加工具时确定
    Schema,
    /// 调用前由用户填写
    Form,
    /// 由模型生成
    Llm,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct I18nObject {
    #[serde(rename = "en_US")]
    pub en_us: String,
    #[serde(rename = "zh_Hans", default, skip_serializing_if = "Option::is_none")]
    pub zh_hans: Option<String>,
}

impl I18nObject {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            en_us: text.into(),
            zh_hans: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolParameterOption {
    pub value: String,
    #[serde(default)]
    pub label: I18nObject,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(default)]
    pub label: I18nObject,
    #[serde(rename = "type")]
    pub parameter_type: ToolParameterType,
    pub form: ToolParameterForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ToolParameterOption>,
}

impl ToolParameter {
    pub fn new(
        name: impl Into<String>,
        parameter_type: ToolParameterType,
        form: ToolParameterForm,
    ) -> Self {
        let name = name.into();
        Self {
            label: I18nObject::new(name.clone()),
            name,
            parameter_type,
            form,
            llm_description: None,
            required: false,
            default: None,
            min: None,
            max: None,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options
            .into_iter()
            .map(|value| {
                let value = value.into();
                ToolParameterOption {
                    label: I18nObject::new(value.clone()),
                    value,
                }
            })
            .collect();
        self
    }

    pub fn is_file(&self) -> bool {
        self.parameter_type == ToolParameterType::File
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolIdentity {
    pub author: String,
    pub name: String,
    #[serde(default)]
    pub label: I18nObject,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDescription {
    pub human: I18nObject,
    pub llm: String,
}

/// 工具声明，加载后不可变
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolEntity {
    pub identity: ToolIdentity,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<ToolDescription>,
    /// 参数列表需要在运行时向提供方拉取
    #[serde(default)]
    pub has_runtime_parameters: bool,
}

impl ToolEntity {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            identity: ToolIdentity {
                author: String::new(),
                label: I18nObject::new(name.clone()),
                name,
                provider: provider.into(),
                icon: None,
            },
            parameters: Vec::new(),
            description: None,
            has_runtime_parameters: false,
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_runtime_parameters(mut self) -> Self {
        self.has_runtime_parameters = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn provider(&self) -> &str {
        &self.identity.provider
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolProviderIdentity {
    pub author: String,
    pub name: String,
    #[serde(default)]
    pub description: I18nObject,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub label: I18nObject,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProviderCredentialSchema {
    #[serde(rename = "type")]
    pub credential_type: ToolParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// 插件声明的工具提供方（静态配置）
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolProviderEntityWithPlugin {
    pub identity: ToolProviderIdentity,
    #[serde(default)]
    pub credentials_schema: HashMap<String, ProviderCredentialSchema>,
    #[serde(default)]
    pub tools: Vec<ToolEntity>,
}

impl ToolProviderEntityWithPlugin {
    /// 检查必填凭据是否齐全
    pub fn missing_credentials(&self, credentials: &serde_json::Map<String, Value>) -> Vec<String> {
        let mut missing: Vec<String> = self
            .credentials_schema
            .iter()
            .filter(|(name, schema)| {
                schema.required
                    && schema.default.is_none()
                    && credentials
                        .get(name.as_str())
                        .map_or(true, |value| value.is_null() || value.as_str() == Some(""))
            })
            .map(|(name, _)| name.clone())
            .collect();
        missing.sort();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_type_round_trip() {
        for raw in ["plugin", "builtin", "workflow", "api", "app", "dataset-retrieval"] {
            let kind = ToolProviderType::value_of(raw).unwrap();
            assert_eq!(kind.as_str(), raw);
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(raw));
        }
        assert!(ToolProviderType::value_of("bogus").is_err());
    }

    #[test]
    fn parameter_deserializes_from_declaration() {
        let parameter: ToolParameter = serde_json::from_value(json!({
            "name": "query",
            "type": "secret-input",
            "form": "llm",
            "required": true
        }))
        .unwrap();
        assert_eq!(parameter.parameter_type, ToolParameterType::SecretInput);
        assert_eq!(parameter.form, ToolParameterForm::Llm);
        assert!(parameter.required);
    }
}
