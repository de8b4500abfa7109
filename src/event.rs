use crate::chat::SendOutcome;
use crate::error::ExplorerError;
use crate::files::OpenedFile;
use crate::platform::Identity;
use crate::resource::ResourceCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Session,
    Chat,
    Files,
    KeyValue,
}

impl Panel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Chat => "chat",
            Self::Files => "files",
            Self::KeyValue => "key-value",
        }
    }
}

/// Outcomes of background operations, drained by the UI every frame.
#[derive(Debug, Clone)]
pub enum AppEvent {
    SignedIn(Identity),
    SignedOut,
    EntriesLoaded(ResourceCollection),
    EntryWritten(ResourceCollection),
    ChatReplied(SendOutcome),
    FileOpened(OpenedFile),
    FileSaved(OpenedFile),
    DialogCancelled(Panel),
    Failed {
        panel: Panel,
        message: String,
        blocking: bool,
        /// A write reached the platform even though the operation reported an error.
        written: bool,
    },
}

impl AppEvent {
    pub fn failed(panel: Panel, err: &ExplorerError) -> Self {
        if matches!(err, ExplorerError::FileDialogCancelled) {
            return Self::DialogCancelled(panel);
        }
        Self::Failed {
            panel,
            message: err.to_string(),
            blocking: err.is_blocking(),
            written: matches!(err, ExplorerError::StaleAfterWrite(_)),
        }
    }
}
