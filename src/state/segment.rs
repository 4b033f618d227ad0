use serde_json::{Map, Value};

use crate::tools::files::FileVar;

/// 变量池中的值单元
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    None,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Object(Map<String, Value>),
    Array(Vec<Value>),
    File(FileVar),
    ArrayFile(Vec<FileVar>),
    Secret(String),
}

impl Segment {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Segment::None,
            Value::Bool(b) => Segment::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Segment::Integer(i),
                None => Segment::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Segment::String(s),
            Value::Array(items) => Segment::Array(items),
            Value::Object(map) => Segment::Object(map),
        }
    }

    pub fn value_type(&self) -> &'static str {
        match self {
            Segment::None => "none",
            Segment::String(_) => "string",
            Segment::Integer(_) | Segment::Float(_) => "number",
            Segment::Boolean(_) => "boolean",
            Segment::Object(_) => "object",
            Segment::Array(_) => "array[any]",
            Segment::File(_) => "file",
            Segment::ArrayFile(_) => "array[file]",
            Segment::Secret(_) => "secret",
        }
    }

    /// 执行时使用的文本形式
    pub fn text(&self) -> String {
        match self {
            Segment::None => String::new(),
            Segment::String(s) | Segment::Secret(s) => s.clone(),
            Segment::Integer(i) => i.to_string(),
            Segment::Float(f) => f.to_string(),
            Segment::Boolean(b) => b.to_string(),
            Segment::Object(map) => Value::Object(map.clone()).to_string(),
            Segment::Array(items) => Value::Array(items.clone()).to_string(),
            Segment::File(file) => file.to_markdown(),
            Segment::ArrayFile(files) => files
                .iter()
                .map(FileVar::to_markdown)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// 日志展示形式：密钥打码，文件只保留摘要
    pub fn log(&self) -> String {
        match self {
            Segment::Secret(s) => obfuscate(s),
            Segment::File(file) => file.summary(),
            Segment::ArrayFile(files) => files
                .iter()
                .map(FileVar::summary)
                .collect::<Vec<_>>()
                .join(", "),
            other => other.text(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Segment::None => Value::Null,
            Segment::String(s) | Segment::Secret(s) => Value::String(s.clone()),
            Segment::Integer(i) => Value::from(*i),
            Segment::Float(f) => Value::from(*f),
            Segment::Boolean(b) => Value::Bool(*b),
            Segment::Object(map) => Value::Object(map.clone()),
            Segment::Array(items) => Value::Array(items.clone()),
            Segment::File(file) => file.to_value(),
            Segment::ArrayFile(files) => Value::Array(files.iter().map(FileVar::to_value).collect()),
        }
    }

    /// Walks into object keys (or file attributes) below the addressed cell.
    pub fn descend(&self, path: &[String]) -> Option<Segment> {
        if path.is_empty() {
            return Some(self.clone());
        }
        let mut current = self.to_value();
        for key in path {
            current = match current {
                Value::Object(mut map) => map.remove(key)?,
                _ => return None,
            };
        }
        Some(Segment::from_value(current))
    }
}

fn obfuscate(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(6));
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(12))
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Segment::String(value.to_string())
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        Segment::String(value)
    }
}

impl From<i64> for Segment {
    fn from(value: i64) -> Self {
        Segment::Integer(value)
    }
}

impl From<bool> for Segment {
    fn from(value: bool) -> Self {
        Segment::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secret_is_masked_only_in_log() {
        let segment = Segment::Secret("sk-abcdefghijklmnop".into());
        assert_eq!(segment.text(), "sk-abcdefghijklmnop");
        assert_eq!(segment.log(), "sk-abc************op");
    }

    #[test]
    fn descend_into_object() {
        let segment = Segment::from_value(json!({"user": {"name": "alice"}}));
        let path = vec!["user".to_string(), "name".to_string()];
        assert_eq!(segment.descend(&path), Some(Segment::String("alice".into())));
        assert_eq!(segment.descend(&["missing".to_string()]), None);
    }
}
