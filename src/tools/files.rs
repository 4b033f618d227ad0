//! 工具产出文件：文件引用、托管接口与 MIME 推断

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FileUrlConfig;
use crate::error::{Result, ToolFlowError};
use crate::utils::ids::new_id;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Document,
    Audio,
    Video,
    Custom,
}

impl FileType {
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            FileType::Image
        } else if mime.starts_with("audio/") {
            FileType::Audio
        } else if mime.starts_with("video/") {
            FileType::Video
        } else if mime.starts_with("text/")
            || mime == "application/pdf"
            || mime == "application/json"
            || mime.contains("document")
        {
            FileType::Document
        } else {
            FileType::Custom
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileTransferMethod {
    RemoteUrl,
    LocalFile,
    ToolFile,
}

impl FileTransferMethod {
    pub fn value_of(value: &str) -> Option<Self> {
        match value {
            "remote_url" => Some(FileTransferMethod::RemoteUrl),
            "local_file" => Some(FileTransferMethod::LocalFile),
            "tool_file" => Some(FileTransferMethod::ToolFile),
            _ => None,
        }
    }
}

/// 节点结果中的文件引用
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FileVar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub transfer_method: FileTransferMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileVar {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_markdown(&self) -> String {
        let name = self.filename.as_deref().unwrap_or("file");
        let url = self.url.as_deref().unwrap_or_default();
        match self.file_type {
            FileType::Image => format!("![{name}]({url})"),
            _ => format!("[{name}]({url})"),
        }
    }

    pub fn summary(&self) -> String {
        let name = self.filename.as_deref().unwrap_or("file");
        match self.mime_type.as_deref() {
            Some(mime) => format!("{name} ({mime})"),
            None => name.to_string(),
        }
    }
}

static MIME_EXTENSIONS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("image/png", ".png"),
        ("image/jpeg", ".jpg"),
        ("image/gif", ".gif"),
        ("image/webp", ".webp"),
        ("image/svg+xml", ".svg"),
        ("image/bmp", ".bmp"),
        ("application/pdf", ".pdf"),
        ("application/json", ".json"),
        ("application/zip", ".zip"),
        ("text/plain", ".txt"),
        ("text/csv", ".csv"),
        ("text/markdown", ".md"),
        ("text/html", ".html"),
        ("audio/mpeg", ".mp3"),
        ("audio/wav", ".wav"),
        ("video/mp4", ".mp4"),
    ]
});

pub fn guess_extension(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    MIME_EXTENSIONS
        .iter()
        .find(|(candidate, _)| *candidate == mime)
        .map(|(_, ext)| *ext)
        .unwrap_or(".bin")
}

pub fn guess_mime_type(extension: &str) -> Option<&'static str> {
    let ext = extension.to_ascii_lowercase();
    if ext == ".jpeg" {
        return Some("image/jpeg");
    }
    MIME_EXTENSIONS
        .iter()
        .find(|(_, candidate)| *candidate == ext)
        .map(|(mime, _)| *mime)
}

/// 取 URL 路径的最后一段（忽略查询串与片段）
pub fn last_path_segment(url: &str) -> &str {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default()
}

/// 文件名的扩展名（含点），没有扩展名时返回空串
pub fn extension_of(name: &str) -> String {
    let base = last_path_segment(name);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(pos) => base[pos..].to_string(),
    }
}

/// 文件名去掉扩展名后的部分，用作关联 id
pub fn file_stem(url: &str) -> String {
    let base = last_path_segment(url);
    base.split('.').next().unwrap_or_default().to_string()
}

/// 托管后的工具文件
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolFile {
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    pub size: usize,
}

#[derive(Clone, Debug, Default)]
pub struct FileOwner {
    pub user_id: String,
    pub tenant_id: String,
    pub conversation_id: Option<String>,
}

/// 文件存储协作方
#[async_trait]
pub trait ToolFileManager: Send + Sync {
    async fn create_file_by_raw(
        &self,
        owner: &FileOwner,
        data: Vec<u8>,
        mimetype: &str,
    ) -> Result<ToolFile>;

    async fn create_file_by_url(&self, owner: &FileOwner, url: &str) -> Result<ToolFile>;

    fn file_url(&self, file: &ToolFile, extension: &str) -> String;
}

pub type DynToolFileManager = Arc<dyn ToolFileManager>;

/// In-memory file host used by tests and the CLI.
pub struct MemoryToolFileManager {
    files: RwLock<HashMap<String, (ToolFile, Vec<u8>)>>,
    urls: FileUrlConfig,
}

impl MemoryToolFileManager {
    pub fn new() -> Self {
        Self::with_url_config(FileUrlConfig::default())
    }

    pub fn with_url_config(urls: FileUrlConfig) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            urls,
        }
    }

    pub fn get(&self, id: &str) -> Option<ToolFile> {
        self.files.read().get(id).map(|(file, _)| file.clone())
    }

    pub fn data(&self, id: &str) -> Option<Vec<u8>> {
        self.files.read().get(id).map(|(_, data)| data.clone())
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl Default for MemoryToolFileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolFileManager for MemoryToolFileManager {
    async fn create_file_by_raw(
        &self,
        owner: &FileOwner,
        data: Vec<u8>,
        mimetype: &str,
    ) -> Result<ToolFile> {
        let file = ToolFile {
            id: new_id("file"),
            user_id: owner.user_id.clone(),
            tenant_id: owner.tenant_id.clone(),
            conversation_id: owner.conversation_id.clone(),
            mimetype: mimetype.to_string(),
            original_url: None,
            size: data.len(),
        };
        self.files
            .write()
            .insert(file.id.clone(), (file.clone(), data));
        Ok(file)
    }

    async fn create_file_by_url(&self, owner: &FileOwner, url: &str) -> Result<ToolFile> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolFlowError::Transport(format!(
                "cannot fetch `{url}`: only http(s) URLs are supported"
            )));
        }
        let mimetype = guess_mime_type(&extension_of(url)).unwrap_or("image/jpeg");
        let file = ToolFile {
            id: new_id("file"),
            user_id: owner.user_id.clone(),
            tenant_id: owner.tenant_id.clone(),
            conversation_id: owner.conversation_id.clone(),
            mimetype: mimetype.to_string(),
            original_url: Some(url.to_string()),
            size: 0,
        };
        self.files
            .write()
            .insert(file.id.clone(), (file.clone(), Vec::new()));
        Ok(file)
    }

    fn file_url(&self, file: &ToolFile, extension: &str) -> String {
        format!(
            "{}/{}{}",
            self.urls.files_url_prefix.trim_end_matches('/'),
            file.id,
            extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_helpers() {
        assert_eq!(extension_of("http://x/y.png"), ".png");
        assert_eq!(extension_of("http://x/y.tar.gz?sig=1"), ".gz");
        assert_eq!(extension_of("http://x/y"), "");
        assert_eq!(file_stem("/files/tools/abc-1.png"), "abc-1");
        assert_eq!(last_path_segment("http://x/a/b.jpg#frag"), "b.jpg");
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(guess_extension("image/PNG"), ".png");
        assert_eq!(guess_extension("application/x-unknown"), ".bin");
        assert_eq!(guess_mime_type(".jpeg"), Some("image/jpeg"));
        assert_eq!(FileType::from_mime("image/png"), FileType::Image);
        assert_eq!(FileType::from_mime("application/octet-stream"), FileType::Custom);
    }
}
