use llm_dust_model::Attachment;
use reqwest::multipart::{Form, Part};
use tokio::fs;

use crate::proto::{
    self, FileUploadRequest, FileUploadUrlResponse, FileUploadedResponse,
};
use crate::{Error, Result, Transport};

/// Media types the service accepts as conversation attachments.
pub const SUPPORTED_ATTACHMENT_TYPES: [&str; 6] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "text/plain",
    "text/csv",
    "application/pdf",
];

/// Uploads a local file and returns its remote file id.
///
/// The upload happens in two steps: the service hands out an upload URL
/// for the file, then the file content is posted to that URL.
pub async fn upload_attachment(
    transport: &Transport,
    attachment: &Attachment,
) -> Result<String> {
    let path = &attachment.path;
    let content_type = attachment.content_type.essence_str();
    if !SUPPORTED_ATTACHMENT_TYPES.contains(&content_type) {
        return Err(Error::upload(
            path,
            format!("unsupported content type {content_type}"),
        ));
    }

    let metadata = fs::metadata(path)
        .await
        .map_err(|err| Error::upload(path, err))?;
    let file_name = attachment.file_name();
    let request = FileUploadRequest {
        content_type,
        file_name: &file_name,
        file_size: metadata.len(),
        use_case: "conversation",
    };
    let resp: FileUploadUrlResponse = transport
        .post(proto::FILES_PATH, &request)
        .await
        .map_err(|err| Error::upload(path, err))?;
    trace!("got upload url for {}", path.display());

    let content = fs::read(path).await.map_err(|err| Error::upload(path, err))?;
    let part = Part::bytes(content)
        .file_name(file_name)
        .mime_str(content_type)
        .map_err(|err| Error::upload(path, err))?;
    let form = Form::new().part("file", part);
    let resp: FileUploadedResponse = transport
        .post_multipart(&resp.file.upload_url, form)
        .await
        .map_err(|err| Error::upload(path, err))?;

    debug!("uploaded {} as {}", path.display(), resp.file.id);
    Ok(resp.file.id)
}
