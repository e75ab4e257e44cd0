//! Master-session management.
//!
//! Exactly one master session runs at a time. Starting a new one first
//! raises the running session's cancel flag and waits for its task to
//! finish, so sessions hand over gracefully instead of fighting over the
//! beacon marker and the provisioning pipe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tendril_radio::Radio;

use crate::chain::master::{self, MasterOptions};
use crate::config::NetworkConfig;
use crate::error::Error;

struct ActiveSession {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<Result<(), Error>>,
}

/// Owner of the single active master session.
#[derive(Default)]
pub struct MasterSessions {
    active: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl MasterSessions {
    /// Create a session manager with no session running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a master session distributing `config`.
    ///
    /// If a session is already running it is signalled and awaited first;
    /// its outcome is logged, not returned.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when whitelist checking or distribution is
    /// requested with an empty whitelist.
    pub async fn start(
        &self,
        radio: Arc<dyn Radio>,
        config: NetworkConfig,
        options: MasterOptions,
    ) -> Result<(), Error> {
        if (options.whitelist_check || options.distribute_whitelist)
            && config.whitelist.is_empty()
        {
            return Err(Error::InvalidArgument(
                "whitelist checking or distribution requires a non-empty whitelist",
            ));
        }

        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            debug!("pre-empting running master session");
            previous.cancel.store(true, Ordering::Relaxed);
            match previous.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("previous master session ended with error: {e}"),
                Err(e) => warn!("previous master session task join failed: {e}"),
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(master::run(radio, config, options, Arc::clone(&cancel)));

        *active = Some(ActiveSession { cancel, task });
        Ok(())
    }

    /// Wait for the running session to finish its duration budget. `None`
    /// when no session is running.
    pub async fn wait(&self) -> Option<Result<(), Error>> {
        let session = self.active.lock().await.take()?;
        Some(
            session
                .task
                .await
                .unwrap_or_else(|e| Err(Error::Task(e.to_string()))),
        )
    }

    /// Cancel the running session, if any, and wait for it to wind down.
    pub async fn stop(&self) {
        let Some(session) = self.active.lock().await.take() else {
            return;
        };

        session.cancel.store(true, Ordering::Relaxed);
        match session.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("master session ended with error: {e}"),
            Err(e) => warn!("master session task join failed: {e}"),
        }
    }

    /// Whether a session is currently running.
    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }
}
