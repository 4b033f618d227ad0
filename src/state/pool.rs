use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::segment::Segment;
use crate::error::{Result, ToolFlowError};
use crate::tools::files::FileVar;

pub const SYSTEM_VARIABLE_NODE_ID: &str = "sys";
pub const SYSTEM_FILES_KEY: &str = "files";

/// 变量路径，例如 `["start", "query"]`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(Vec<String>);

impl Selector {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn parse(path: &str) -> Self {
        Self::new(path.split('.').filter(|part| !part.is_empty()))
    }

    pub fn system_files() -> Self {
        Self::new([SYSTEM_VARIABLE_NODE_ID, SYSTEM_FILES_KEY])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<Vec<String>> for Selector {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

/// 工作流运行期的变量池
///
/// 前两段路径定位一个值单元，更深的路径在对象内部继续查找。
#[derive(Default)]
pub struct VariablePool {
    variables: RwLock<HashMap<String, HashMap<String, Segment>>>,
}

impl VariablePool {
    pub fn new() -> Self {
        Self {
            variables: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, selector: &Selector, segment: impl Into<Segment>) -> Result<()> {
        let [node_id, key, ..] = selector.segments() else {
            return Err(ToolFlowError::Config(format!(
                "selector `{selector}` needs at least a node id and a key"
            )));
        };
        if selector.len() > 2 {
            return Err(ToolFlowError::Config(format!(
                "selector `{selector}` is too deep to write"
            )));
        }
        self.variables
            .write()
            .entry(node_id.clone())
            .or_default()
            .insert(key.clone(), segment.into());
        Ok(())
    }

    pub fn get(&self, selector: &Selector) -> Option<Segment> {
        let [node_id, key, rest @ ..] = selector.segments() else {
            return None;
        };
        let variables = self.variables.read();
        let segment = variables.get(node_id)?.get(key)?;
        segment.descend(rest)
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.get(selector).is_some()
    }

    pub fn add_system_files(&self, files: Vec<FileVar>) {
        self.variables
            .write()
            .entry(SYSTEM_VARIABLE_NODE_ID.to_string())
            .or_default()
            .insert(SYSTEM_FILES_KEY.to_string(), Segment::ArrayFile(files));
    }

    /// 当前会话上传的文件列表，不存在时返回空列表
    pub fn system_files(&self) -> Vec<FileVar> {
        match self.get(&Selector::system_files()) {
            Some(Segment::ArrayFile(files)) => files,
            Some(Segment::File(file)) => vec![file],
            Some(Segment::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn remove_node(&self, node_id: &str) {
        self.variables.write().remove(node_id);
    }

    /// Loads a pool from `{"node_id": {"key": value}}`; `sys.files` is read as a file list.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(nodes) = value else {
            return Err(ToolFlowError::Config(
                "variable pool must be a JSON object".to_string(),
            ));
        };
        let pool = Self::new();
        for (node_id, entries) in nodes {
            let Value::Object(entries) = entries else {
                return Err(ToolFlowError::Config(format!(
                    "variables of node `{node_id}` must be an object"
                )));
            };
            for (key, value) in entries {
                if node_id == SYSTEM_VARIABLE_NODE_ID && key == SYSTEM_FILES_KEY {
                    let files: Vec<FileVar> = serde_json::from_value(value)?;
                    pool.add_system_files(files);
                    continue;
                }
                pool.add(
                    &Selector::new([node_id.as_str(), key.as_str()]),
                    Segment::from_value(value),
                )?;
            }
        }
        Ok(pool)
    }
}

impl fmt::Debug for VariablePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variables = self.variables.read();
        f.debug_struct("VariablePool")
            .field("nodes", &variables.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_lookup_descends_into_objects() {
        let pool = VariablePool::new();
        pool.add(
            &Selector::parse("start.profile"),
            Segment::from_value(json!({"city": "Berlin"})),
        )
        .unwrap();

        assert_eq!(
            pool.get(&Selector::parse("start.profile.city")),
            Some(Segment::String("Berlin".into()))
        );
        assert!(pool.get(&Selector::parse("start.other")).is_none());
        assert!(pool.get(&Selector::parse("start")).is_none());
    }

    #[test]
    fn missing_system_files_is_empty() {
        let pool = VariablePool::new();
        assert!(pool.system_files().is_empty());
    }
}
