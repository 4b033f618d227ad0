use super::events::{RunStreamChunkEvent, ToolNodeOutputs};
use crate::error::{Result, ToolFlowError};
use crate::tools::files::{extension_of, file_stem, last_path_segment};
use crate::tools::{
    FileTransferMethod, FileType, FileVar, MessagePayload, MessageType, ToolInvokeMessage,
};

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
const DEFAULT_BLOB_MIME: &str = "application/octet-stream";

/// 把工具消息逐条折叠为节点输出
///
/// 文本与链接追加到 `text` 并产出一个流式片段；图片与 blob 产生文件引用；
/// JSON 对象按到达顺序收集。单条消息无法归类时返回错误，已收集的内容不受影响。
#[derive(Debug)]
pub struct MessageCollector {
    node_id: String,
    tenant_id: String,
    outputs: ToolNodeOutputs,
}

impl MessageCollector {
    pub fn new(node_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            tenant_id: tenant_id.into(),
            outputs: ToolNodeOutputs::default(),
        }
    }

    pub fn accept(&mut self, message: &ToolInvokeMessage) -> Result<Option<RunStreamChunkEvent>> {
        tracing::debug!(kind = message.kind().as_str(), "collecting tool message");
        match message.kind() {
            MessageType::Text => {
                let text = required_text(message)?;
                self.outputs.text.push_str(text);
                self.outputs.text.push('\n');
                Ok(Some(self.chunk(text.to_string())))
            }
            MessageType::Link => {
                let formatted = format!("Link: {}\n", required_text(message)?);
                self.outputs.text.push_str(&formatted);
                Ok(Some(self.chunk(formatted)))
            }
            MessageType::Image | MessageType::ImageLink => {
                let file = self.image_file(message)?;
                self.outputs.files.push(file);
                Ok(None)
            }
            MessageType::Blob => {
                let file = self.blob_file(message)?;
                self.outputs.files.push(file);
                Ok(None)
            }
            MessageType::Json => match message.payload() {
                Some(MessagePayload::Json(object)) => {
                    self.outputs.json.push(object.clone());
                    Ok(None)
                }
                _ => Err(ToolFlowError::Classification(
                    "json message without an object payload".into(),
                )),
            },
            MessageType::Variable | MessageType::FileVar => Ok(None),
        }
    }

    pub fn outputs(&self) -> &ToolNodeOutputs {
        &self.outputs
    }

    pub fn finish(self) -> ToolNodeOutputs {
        self.outputs
    }

    fn chunk(&self, chunk_content: String) -> RunStreamChunkEvent {
        RunStreamChunkEvent {
            from_variable_selector: vec![self.node_id.clone(), "text".to_string()],
            chunk_content,
        }
    }

    fn image_file(&self, message: &ToolInvokeMessage) -> Result<FileVar> {
        let url = required_text(message)?;
        let mime_type = message.meta_str("mime_type").unwrap_or(DEFAULT_IMAGE_MIME);
        let filename = if message.save_as().is_empty() {
            last_path_segment(url).to_string()
        } else {
            message.save_as().to_string()
        };
        let transfer_method = match message.meta_str("transfer_method") {
            Some(raw) => FileTransferMethod::value_of(raw).ok_or_else(|| {
                ToolFlowError::Classification(format!("unknown transfer method `{raw}`"))
            })?,
            None => FileTransferMethod::ToolFile,
        };

        Ok(FileVar {
            id: None,
            tenant_id: self.tenant_id.clone(),
            file_type: FileType::Image,
            transfer_method,
            url: Some(url.to_string()),
            related_id: Some(file_stem(url)),
            filename: Some(filename),
            extension: Some(extension_of(url)),
            mime_type: Some(mime_type.to_string()),
        })
    }

    fn blob_file(&self, message: &ToolInvokeMessage) -> Result<FileVar> {
        let save_as = message.save_as();
        if save_as.is_empty() {
            return Err(ToolFlowError::Classification(
                "blob message needs `save_as` to name the file".into(),
            ));
        }
        let mime_type = message.meta_str("mime_type").unwrap_or(DEFAULT_BLOB_MIME);
        let url = message.text_payload();

        Ok(FileVar {
            id: None,
            tenant_id: self.tenant_id.clone(),
            file_type: FileType::from_mime(mime_type),
            transfer_method: FileTransferMethod::ToolFile,
            url: url.map(str::to_string),
            related_id: url.map(file_stem),
            filename: Some(save_as.to_string()),
            extension: Some(extension_of(save_as)),
            mime_type: Some(mime_type.to_string()),
        })
    }
}

fn required_text(message: &ToolInvokeMessage) -> Result<&str> {
    message.text_payload().ok_or_else(|| {
        ToolFlowError::Classification(format!(
            "`{}` message without a text payload",
            message.kind().as_str()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn text_and_links_accumulate_with_chunks() {
        let mut collector = MessageCollector::new("tool1", "tenant");
        let chunk = collector
            .accept(&ToolInvokeMessage::text("hello"))
            .unwrap()
            .unwrap();
        assert_eq!(chunk.chunk_content, "hello");
        assert_eq!(chunk.from_variable_selector, vec!["tool1", "text"]);

        let chunk = collector
            .accept(&ToolInvokeMessage::link("http://x"))
            .unwrap()
            .unwrap();
        assert_eq!(chunk.chunk_content, "Link: http://x\n");
        assert_eq!(collector.outputs().text, "hello\nLink: http://x\n");
    }

    #[test]
    fn image_file_fields() {
        let mut collector = MessageCollector::new("tool1", "tenant");
        let message = ToolInvokeMessage::image_link("/files/tools/abc.png")
            .with_meta("mime_type", "image/png");
        assert!(collector.accept(&message).unwrap().is_none());

        let file = &collector.outputs().files[0];
        assert_eq!(file.extension.as_deref(), Some(".png"));
        assert_eq!(file.filename.as_deref(), Some("abc.png"));
        assert_eq!(file.related_id.as_deref(), Some("abc"));
        assert_eq!(file.mime_type.as_deref(), Some("image/png"));
        assert_eq!(file.transfer_method, FileTransferMethod::ToolFile);
        assert_eq!(file.tenant_id, "tenant");
    }

    #[test]
    fn blob_without_name_is_rejected_without_losing_state() {
        let mut collector = MessageCollector::new("tool1", "tenant");
        collector.accept(&ToolInvokeMessage::text("kept")).unwrap();
        let err = collector
            .accept(&ToolInvokeMessage::blob(b"x".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ToolFlowError::Classification(_)));

        collector
            .accept(&ToolInvokeMessage::json(Map::new()))
            .unwrap();
        let outputs = collector.finish();
        assert_eq!(outputs.text, "kept\n");
        assert!(outputs.files.is_empty());
        assert_eq!(outputs.json.len(), 1);
    }
}
