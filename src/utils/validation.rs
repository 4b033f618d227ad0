use crate::error::{Result, ToolFlowError};

/// 工具输出中保留的变量名
pub const RESERVED_VARIABLE_NAMES: [&str; 3] = ["text", "json", "files"];

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证 URL 格式
    pub fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ToolFlowError::Config("URL 不能为空".to_string()));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolFlowError::Config(format!(
                "URL 必须以 http:// 或 https:// 开头: {url}"
            )));
        }

        Ok(())
    }

    /// 验证节点 ID
    pub fn validate_node_id(node_id: &str) -> Result<()> {
        if node_id.is_empty() {
            return Err(ToolFlowError::Config("节点 ID 不能为空".to_string()));
        }

        if !node_id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ToolFlowError::Config(format!(
                "节点 ID '{node_id}' 包含无效字符，应该只包含字母、数字、下划线和短横线"
            )));
        }

        Ok(())
    }

    /// 验证工具或提供方名称
    pub fn validate_tool_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ToolFlowError::Config("工具名称不能为空".to_string()));
        }

        if name.len() > 100 {
            return Err(ToolFlowError::Config(format!(
                "工具名称过长（最多 100 字符）: {name}"
            )));
        }

        Ok(())
    }

    /// 变量消息不能覆盖节点的固定输出
    pub fn validate_variable_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ToolFlowError::InvalidMessage(
                "variable name must not be empty".to_string(),
            ));
        }
        if RESERVED_VARIABLE_NAMES.contains(&name) {
            return Err(ToolFlowError::InvalidMessage(format!(
                "the variable name '{name}' is reserved"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(ConfigValidator::validate_url("").is_err());
        assert!(ConfigValidator::validate_url("example.com").is_err());
        assert!(ConfigValidator::validate_url("http://example.com").is_ok());
        assert!(ConfigValidator::validate_url("https://example.com").is_ok());
    }

    #[test]
    fn test_validate_node_id() {
        assert!(ConfigValidator::validate_node_id("").is_err());
        assert!(ConfigValidator::validate_node_id("node-1").is_ok());
        assert!(ConfigValidator::validate_node_id("node_1").is_ok());
        assert!(ConfigValidator::validate_node_id("node@1").is_err());
    }

    #[test]
    fn test_validate_variable_name() {
        assert!(ConfigValidator::validate_variable_name("text").is_err());
        assert!(ConfigValidator::validate_variable_name("files").is_err());
        assert!(ConfigValidator::validate_variable_name("").is_err());
        assert!(ConfigValidator::validate_variable_name("summary").is_ok());
    }
}
