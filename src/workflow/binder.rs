use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use super::entities::{ToolInput, ToolInputType, ToolNodeData};
use crate::error::{Result, ToolFlowError};
use crate::state::VariablePool;
use crate::template::{convert_template, VariableTemplateParser};
use crate::tools::{FileVar, ToolParameter};

/// 参数绑定：把节点上的取值配置解析为工具调用参数
pub struct ParameterBinder;

impl ParameterBinder {
    /// 按节点配置逐项生成参数
    ///
    /// - 工具未声明的参数绑定为 `null`
    /// - `file` 类型参数忽略配置，绑定会话文件列表
    /// - `variable` 取变量池中的值，不存在时报错
    /// - 常量与模板经模板渲染，`for_log` 时取展示值
    pub fn generate_parameters(
        declared: &[ToolParameter],
        data: &ToolNodeData,
        pool: &VariablePool,
        for_log: bool,
    ) -> Result<Map<String, Value>> {
        let declared: HashMap<&str, &ToolParameter> = declared
            .iter()
            .map(|parameter| (parameter.name.as_str(), parameter))
            .collect();

        let mut result = Map::new();
        for (name, input) in &data.tool_parameters {
            let value = match declared.get(name.as_str()) {
                None => Value::Null,
                Some(parameter) if parameter.is_file() => Value::Array(
                    Self::fetch_files(pool)
                        .iter()
                        .map(FileVar::to_value)
                        .collect(),
                ),
                Some(_) => Self::resolve_input(input, pool, for_log)?,
            };
            result.insert(name.clone(), value);
        }
        Ok(result)
    }

    fn resolve_input(input: &ToolInput, pool: &VariablePool, for_log: bool) -> Result<Value> {
        if input.input_type == ToolInputType::Variable {
            let selector = input.selector().ok_or_else(|| {
                ToolFlowError::Config(format!("invalid variable selector {}", input.value))
            })?;
            return pool
                .get(&selector)
                .map(|segment| segment.to_value())
                .ok_or_else(|| ToolFlowError::MissingVariable(selector.to_string()));
        }

        let template = input.template().unwrap_or_default();
        Ok(convert_template(&template, pool).render(for_log))
    }

    fn fetch_files(pool: &VariablePool) -> Vec<FileVar> {
        pool.system_files()
    }
}

/// 节点依赖的变量：`node_id.<参数名>` 或 `node_id.#a.b#` 到变量路径
pub fn extract_variable_selector_mapping(
    node_id: &str,
    data: &ToolNodeData,
) -> BTreeMap<String, Vec<String>> {
    let mut mapping = BTreeMap::new();
    for (name, input) in &data.tool_parameters {
        match input.input_type {
            ToolInputType::Mixed => {
                let template = input.value.as_str().unwrap_or_default();
                for selector in VariableTemplateParser::new(template).extract_variable_selectors() {
                    mapping.insert(
                        format!("{node_id}.{}", selector.variable),
                        selector.value_selector.segments().to_vec(),
                    );
                }
            }
            ToolInputType::Variable => {
                if let Some(selector) = input.selector() {
                    mapping.insert(format!("{node_id}.{name}"), selector.segments().to_vec());
                }
            }
            ToolInputType::Constant => {}
        }
    }
    mapping
}
