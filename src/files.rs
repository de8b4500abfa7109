use crate::error::{ExplorerError, PlatformError, Result};
use crate::platform::FileCapability;
use crate::session_gate::SessionGate;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

pub const SUGGESTED_NAME: &str = "example.txt";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenedFile {
    pub name: String,
    pub content: String,
}

fn map_dialog_error(err: PlatformError) -> ExplorerError {
    match err {
        PlatformError::Cancelled => ExplorerError::FileDialogCancelled,
        other => ExplorerError::FetchFailed(other.to_string()),
    }
}

/// Open/save actions over the platform file pickers.
pub struct FileDialogs {
    gate: Arc<SessionGate>,
    files: Arc<dyn FileCapability>,
    current: RwLock<OpenedFile>,
}

impl FileDialogs {
    pub fn new(gate: Arc<SessionGate>, files: Arc<dyn FileCapability>) -> Self {
        Self {
            gate,
            files,
            current: RwLock::new(OpenedFile::default()),
        }
    }

    pub fn current(&self) -> OpenedFile {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn open(&self) -> Result<OpenedFile> {
        self.gate.require()?;
        let picked = self
            .files
            .show_open_file_picker()
            .await
            .map_err(map_dialog_error)?;
        let content = picked
            .read_text()
            .await
            .map_err(|err| ExplorerError::FetchFailed(err.to_string()))?;

        let opened = OpenedFile {
            name: picked.name().to_string(),
            content,
        };
        info!(name = %opened.name, bytes = opened.content.len(), "file opened");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = opened.clone();
        Ok(opened)
    }

    /// Saves the current content under a name chosen in the save picker.
    pub async fn save(&self) -> Result<OpenedFile> {
        self.gate.require()?;
        let content = self.current().content;
        let saved = self
            .files
            .show_save_file_picker(&content, SUGGESTED_NAME)
            .await
            .map_err(map_dialog_error)?;

        info!(name = %saved.name, "file saved");
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.name = saved.name;
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryAuth, MemoryFiles};

    async fn dialogs(files: Arc<MemoryFiles>) -> FileDialogs {
        let gate = Arc::new(SessionGate::new(Arc::new(MemoryAuth::new("alice"))));
        gate.ensure_signed_in().await.expect("sign-in should succeed");
        FileDialogs::new(gate, files)
    }

    #[tokio::test]
    async fn open_reads_name_and_content() {
        let files = Arc::new(MemoryFiles::with_file("notes.txt", "hello"));
        let dialogs = dialogs(files).await;

        let opened = dialogs.open().await.expect("open should succeed");
        assert_eq!(opened.name, "notes.txt");
        assert_eq!(opened.content, "hello");
        assert_eq!(dialogs.current(), opened);
    }

    #[tokio::test]
    async fn cancelled_open_keeps_previous_file() {
        let dialogs = dialogs(Arc::new(MemoryFiles::default())).await;
        let err = dialogs.open().await.expect_err("cancel should surface");
        assert!(matches!(err, ExplorerError::FileDialogCancelled));
        assert_eq!(dialogs.current(), OpenedFile::default());
    }

    #[tokio::test]
    async fn save_uses_suggested_name_and_current_content() {
        let files = Arc::new(MemoryFiles::with_file("notes.txt", "body"));
        let dialogs = dialogs(files.clone()).await;
        dialogs.open().await.expect("open should succeed");

        let saved = dialogs.save().await.expect("save should succeed");
        assert_eq!(saved.name, SUGGESTED_NAME);
        assert_eq!(saved.content, "body");
        assert_eq!(
            files.saved(),
            vec![(SUGGESTED_NAME.to_string(), "body".to_string())]
        );
    }

    #[tokio::test]
    async fn dialogs_require_sign_in() {
        let gate = Arc::new(SessionGate::new(Arc::new(MemoryAuth::new("alice"))));
        let dialogs = FileDialogs::new(gate, Arc::new(MemoryFiles::default()));
        assert!(matches!(
            dialogs.save().await,
            Err(ExplorerError::NotAuthenticated)
        ));
    }
}
