//! Attachment staging.
//!
//! The upload surface itself (picker, progress, storage) is an external
//! collaborator; the composer only needs to know which URL is currently
//! staged so it can attach it to the next submission.

/// Staging state for one composer's image attachment.
#[derive(Debug, Default)]
pub struct AttachmentUpload {
    staged_url: Option<String>,
    is_uploading: bool,
    is_open: bool,
}

impl AttachmentUpload {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of the staged attachment, if any.
    pub fn staged_url(&self) -> Option<&str> {
        self.staged_url.as_deref()
    }

    pub fn is_uploading(&self) -> bool {
        self.is_uploading
    }

    /// Whether the upload dialog is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn begin_upload(&mut self) {
        self.is_uploading = true;
    }

    /// An upload finished: stage its URL and close the dialog.
    pub fn on_uploaded(&mut self, url: String) {
        self.staged_url = Some(url);
        self.is_uploading = false;
        self.is_open = false;
    }

    /// Drop the staged attachment (after a successful send, or on user
    /// request).
    pub fn clear(&mut self) {
        self.staged_url = None;
        self.is_uploading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_lifecycle() {
        let mut upload = AttachmentUpload::new();
        assert!(upload.staged_url().is_none());

        upload.open();
        upload.begin_upload();
        assert!(upload.is_uploading());

        upload.on_uploaded("https://cdn.example/a.png".into());
        assert_eq!(upload.staged_url(), Some("https://cdn.example/a.png"));
        assert!(!upload.is_uploading());
        assert!(!upload.is_open());

        upload.clear();
        assert!(upload.staged_url().is_none());
    }
}
