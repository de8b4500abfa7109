//! Native dialogs: the sign-in confirmation and the open/save file pickers.

use super::{
    AuthCapability, FileCapability, Identity, PickedFile, PlatformResult, SavedFile,
};
use crate::error::PlatformError;
use async_trait::async_trait;
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageDialogResult, MessageLevel};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::info;

pub struct DesktopAuth {
    username: String,
    session: RwLock<Option<Identity>>,
}

impl DesktopAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            session: RwLock::new(None),
        }
    }

    fn current(&self) -> Option<Identity> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, identity: Option<Identity>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

#[async_trait]
impl AuthCapability for DesktopAuth {
    async fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    async fn sign_in(&self) -> PlatformResult<Identity> {
        let answer = AsyncMessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title("Sign in")
            .set_description(format!("Continue as {}?", self.username))
            .set_buttons(MessageButtons::OkCancel)
            .show()
            .await;

        match answer {
            MessageDialogResult::Ok | MessageDialogResult::Yes => {
                let identity = Identity::new(&self.username);
                self.replace(Some(identity.clone()));
                info!(username = %identity.username, "signed in");
                Ok(identity)
            }
            _ => Err(PlatformError::Cancelled),
        }
    }

    async fn get_user(&self) -> PlatformResult<Identity> {
        self.current()
            .ok_or_else(|| PlatformError::Rejected("no active session".to_string()))
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        self.replace(None);
        Ok(())
    }
}

struct DiskFile {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl PickedFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_text(&self) -> PlatformResult<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

#[derive(Debug, Default)]
pub struct DesktopFiles;

#[async_trait]
impl FileCapability for DesktopFiles {
    async fn show_open_file_picker(&self) -> PlatformResult<Box<dyn PickedFile>> {
        let handle = AsyncFileDialog::new()
            .set_title("Open File")
            .pick_file()
            .await
            .ok_or(PlatformError::Cancelled)?;
        Ok(Box::new(DiskFile {
            name: handle.file_name(),
            path: handle.path().to_path_buf(),
        }))
    }

    async fn show_save_file_picker(
        &self,
        content: &str,
        suggested_name: &str,
    ) -> PlatformResult<SavedFile> {
        let handle = AsyncFileDialog::new()
            .set_title("Save File")
            .set_file_name(suggested_name)
            .save_file()
            .await
            .ok_or(PlatformError::Cancelled)?;
        tokio::fs::write(handle.path(), content).await?;
        Ok(SavedFile {
            name: handle.file_name(),
        })
    }
}
