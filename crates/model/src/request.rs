use std::path::PathBuf;

use mime::Mime;

/// A prompt to be sent to a conversational model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    /// The user text.
    pub text: String,
    /// Files to attach to the prompt.
    pub attachments: Vec<Attachment>,
}

impl Prompt {
    /// Creates a text-only prompt.
    #[inline]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            attachments: vec![],
        }
    }

    /// Adds an attachment to the prompt.
    #[inline]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A local file attached to a prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Path of the file on the local disk.
    pub path: PathBuf,
    /// The media type of the file content.
    pub content_type: Mime,
}

impl Attachment {
    /// Creates an attachment for the file at `path`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P, content_type: Mime) -> Self {
        Self {
            path: path.into(),
            content_type,
        }
    }

    /// Returns the file name of the attachment, falling back to the
    /// whole path if it has none.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}
