use crate::error::{ExplorerError, Result};
use crate::platform::{AuthCapability, Identity};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Holds the single authenticated identity every other view-model depends on.
pub struct SessionGate {
    auth: Arc<dyn AuthCapability>,
    // Serializes sign-in so concurrent callers share one prompt.
    sign_in: Mutex<()>,
    identity: RwLock<Option<Identity>>,
}

impl SessionGate {
    pub fn new(auth: Arc<dyn AuthCapability>) -> Self {
        Self {
            auth,
            sign_in: Mutex::new(()),
            identity: RwLock::new(None),
        }
    }

    /// Signs in if needed and returns the identity. A no-op once signed in.
    pub async fn ensure_signed_in(&self) -> Result<Identity> {
        if let Some(identity) = self.cached() {
            return Ok(identity);
        }

        let _guard = self.sign_in.lock().await;
        if let Some(identity) = self.cached() {
            return Ok(identity);
        }

        if !self.auth.is_signed_in().await {
            info!("no platform session, prompting for sign-in");
            self.auth.sign_in().await.map_err(|err| {
                warn!(error = %err, "sign-in failed");
                ExplorerError::AuthenticationFailed(err.to_string())
            })?;
        }

        let identity = self
            .auth
            .get_user()
            .await
            .map_err(|err| ExplorerError::AuthenticationFailed(err.to_string()))?;
        info!(username = %identity.username, "session established");
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        Ok(identity)
    }

    pub fn current_identity(&self) -> Result<Identity> {
        self.cached().ok_or(ExplorerError::NotAuthenticated)
    }

    /// Guard used by dependent view-models before any remote call.
    pub(crate) fn require(&self) -> Result<Identity> {
        self.current_identity()
    }

    pub async fn sign_out(&self) -> Result<()> {
        let _guard = self.sign_in.lock().await;
        self.auth
            .sign_out()
            .await
            .map_err(|err| ExplorerError::AuthenticationFailed(err.to_string()))?;
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("signed out");
        Ok(())
    }

    fn cached(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryAuth;

    fn gate(username: &str) -> (Arc<MemoryAuth>, SessionGate) {
        let auth = Arc::new(MemoryAuth::new(username));
        let gate = SessionGate::new(auth.clone());
        (auth, gate)
    }

    #[tokio::test]
    async fn identity_is_unavailable_before_sign_in() {
        let (_auth, gate) = gate("alice");
        assert!(matches!(
            gate.current_identity(),
            Err(ExplorerError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn sign_in_prompts_once() {
        let (auth, gate) = gate("alice");
        let first = gate.ensure_signed_in().await.expect("sign-in should succeed");
        let second = gate.ensure_signed_in().await.expect("repeat is a no-op");

        assert_eq!(first.username, "alice");
        assert_eq!(first, second);
        assert_eq!(auth.prompt_count(), 1);
        assert_eq!(gate.current_identity().expect("identity").username, "alice");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_prompt() {
        let (auth, gate) = gate("alice");
        let gate = Arc::new(gate);
        let a = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.ensure_signed_in().await }
        });
        let b = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.ensure_signed_in().await }
        });
        a.await.expect("task a").expect("sign-in a");
        b.await.expect("task b").expect("sign-in b");
        assert_eq!(auth.prompt_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_prompt_fails_authentication() {
        let (auth, gate) = gate("alice");
        auth.deny_sign_in(true);

        let err = gate.ensure_signed_in().await.expect_err("cancel should fail");
        assert!(matches!(err, ExplorerError::AuthenticationFailed(_)));
        assert!(gate.current_identity().is_err());

        auth.deny_sign_in(false);
        gate.ensure_signed_in().await.expect("retry should succeed");
        assert_eq!(auth.prompt_count(), 2);
    }

    #[tokio::test]
    async fn sign_out_requires_a_new_prompt() {
        let (auth, gate) = gate("alice");
        gate.ensure_signed_in().await.expect("sign-in should succeed");
        gate.sign_out().await.expect("sign-out should succeed");
        assert!(gate.require().is_err());

        gate.ensure_signed_in().await.expect("sign-in should succeed again");
        assert_eq!(auth.prompt_count(), 2);
    }
}
