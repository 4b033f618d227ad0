use std::sync::Arc;

use futures::StreamExt;

use super::files::{extension_of, guess_extension, FileOwner, ToolFileManager};
use super::message::{MessagePayload, MessageType, ToolInvokeMessage, ToolMessageStream};
use crate::error::{Result, ToolFlowError};

const DEFAULT_BLOB_MIME: &str = "application/octet-stream";

/// 文件托管预处理
///
/// - IMAGE：按 URL 拉取并托管，改写为指向托管地址的 IMAGE_LINK
/// - BLOB：原始字节写入文件存储，负载改为托管地址；图片类型改写为 IMAGE_LINK
///
/// 单条消息托管失败时记录警告并跳过该条，流中的错误原样透传。
pub struct ToolFileMessageTransformer;

impl ToolFileMessageTransformer {
    pub fn transform_tool_invoke_messages(
        messages: ToolMessageStream,
        files: Arc<dyn ToolFileManager>,
        owner: FileOwner,
    ) -> ToolMessageStream {
        let owner = Arc::new(owner);
        Box::pin(messages.filter_map(move |item| {
            let files = Arc::clone(&files);
            let owner = Arc::clone(&owner);
            async move {
                let message = match item {
                    Ok(message) => message,
                    Err(err) => return Some(Err(err)),
                };
                let kind = message.kind();
                match Self::transform_one(message, files.as_ref(), &owner).await {
                    Ok(message) => Some(Ok(message)),
                    Err(err) => {
                        tracing::warn!(
                            kind = kind.as_str(),
                            error = %err,
                            "skipping tool message whose file could not be stored"
                        );
                        None
                    }
                }
            }
        }))
    }

    async fn transform_one(
        message: ToolInvokeMessage,
        files: &dyn ToolFileManager,
        owner: &FileOwner,
    ) -> Result<ToolInvokeMessage> {
        match message.kind() {
            MessageType::Image => {
                let url = message
                    .text_payload()
                    .map(str::to_string)
                    .ok_or_else(|| ToolFlowError::InvalidMessage("image without url".into()))?;
                let file = files.create_file_by_url(owner, &url).await?;
                let mut extension = extension_of(&url);
                if extension.is_empty() {
                    extension = guess_extension(&file.mimetype).to_string();
                }
                let hosted = files.file_url(&file, &extension);
                tracing::debug!(source = %url, hosted = %hosted, "hosted tool image");
                message
                    .with_meta("mime_type", file.mimetype.clone())
                    .replace(MessageType::ImageLink, MessagePayload::Text(hosted))
            }
            MessageType::Blob => {
                if matches!(message.payload(), Some(MessagePayload::Text(_))) {
                    // 已是托管地址
                    return Ok(message);
                }
                let mimetype = message
                    .meta_str("mime_type")
                    .unwrap_or(DEFAULT_BLOB_MIME)
                    .to_string();
                let mut extension = extension_of(message.save_as());
                if extension.is_empty() {
                    extension = guess_extension(&mimetype).to_string();
                }
                let data = match message.payload() {
                    Some(MessagePayload::Blob(data)) => data.clone(),
                    _ => return Err(ToolFlowError::InvalidMessage("blob without data".into())),
                };
                let file = files.create_file_by_raw(owner, data, &mimetype).await?;
                let hosted = files.file_url(&file, &extension);
                let kind = if mimetype.starts_with("image/") {
                    MessageType::ImageLink
                } else {
                    MessageType::Blob
                };
                message
                    .with_meta("mime_type", mimetype)
                    .replace(kind, MessagePayload::Text(hosted))
            }
            _ => Ok(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{stream, StreamExt};

    use super::*;
    use crate::tools::files::MemoryToolFileManager;

    async fn run(messages: Vec<Result<ToolInvokeMessage>>) -> Vec<Result<ToolInvokeMessage>> {
        let files = Arc::new(MemoryToolFileManager::new());
        let transformed = ToolFileMessageTransformer::transform_tool_invoke_messages(
            Box::pin(stream::iter(messages)),
            files,
            FileOwner::default(),
        );
        transformed.collect().await
    }

    #[tokio::test]
    async fn blob_becomes_hosted_url() {
        let out = run(vec![
            Ok(ToolInvokeMessage::blob(b"png".to_vec())
                .with_meta("mime_type", "image/png")
                .with_save_as("chart.png")),
            Ok(ToolInvokeMessage::blob(b"csv".to_vec()).with_save_as("data.csv")),
            Ok(ToolInvokeMessage::blob(b"raw".to_vec())),
        ])
        .await;
        let image = out[0].as_ref().unwrap();
        assert_eq!(image.kind(), MessageType::ImageLink);
        assert!(image.text_payload().unwrap().starts_with("/files/tools/"));
        assert!(image.text_payload().unwrap().ends_with(".png"));
        assert_eq!(image.save_as(), "chart.png");

        let blob = out[1].as_ref().unwrap();
        assert_eq!(blob.kind(), MessageType::Blob);
        assert!(blob.text_payload().unwrap().ends_with(".csv"));
        assert!(out[2].as_ref().unwrap().text_payload().unwrap().ends_with(".bin"));
    }

    #[tokio::test]
    async fn unreachable_image_is_skipped_and_errors_pass_through() {
        let out = run(vec![
            Ok(ToolInvokeMessage::image("ftp://host/a.png")),
            Ok(ToolInvokeMessage::image("https://host/b.gif")),
            Err(ToolFlowError::Transport("boom".into())),
        ])
        .await;
        assert_eq!(out.len(), 2);
        let hosted = out[0].as_ref().unwrap();
        assert_eq!(hosted.kind(), MessageType::ImageLink);
        assert!(hosted.text_payload().unwrap().ends_with(".gif"));
        assert!(out[1].is_err());
    }
}
