//! Best-effort persistent copy of the user directory.
//!
//! Writes are queued and applied by a single background task in the order
//! they were dispatched. A failed write is logged and dropped: the
//! in-memory directory stays authoritative and the caller never waits.
//! Reads are used for read-through on a directory miss; a failed read is
//! logged and treated as "not found".

pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::users::model::User;

#[async_trait]
pub trait UserMirror: Send + Sync {
    /// Create or fully replace the stored copy of `user`.
    async fn upsert(&self, user: &User) -> anyhow::Result<()>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<User>>;
    fn name(&self) -> &'static str;
}

/// Used when no persistent store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMirror;

#[async_trait]
impl UserMirror for NoopMirror {
    async fn upsert(&self, _user: &User) -> anyhow::Result<()> {
        Ok(())
    }
    async fn delete(&self, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
        Ok(None)
    }
    async fn find_by_id(&self, _id: &str) -> anyhow::Result<Option<User>> {
        Ok(None)
    }
    fn name(&self) -> &'static str {
        "noop"
    }
}

enum MirrorOp {
    Upsert(Box<User>),
    Delete(String),
    Flush(oneshot::Sender<()>),
}

/// Handle to the mirror queue. Cheap to clone.
#[derive(Clone)]
pub struct Mirror {
    tx: mpsc::UnboundedSender<MirrorOp>,
    store: Arc<dyn UserMirror>,
}

impl Mirror {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn UserMirror>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store.clone(), rx));
        Self { tx, store }
    }

    pub fn upsert(&self, user: &User) {
        self.dispatch(MirrorOp::Upsert(Box::new(user.clone())));
    }

    pub fn delete(&self, id: &str) {
        self.dispatch(MirrorOp::Delete(id.to_string()));
    }

    fn dispatch(&self, op: MirrorOp) {
        if self.tx.send(op).is_err() {
            warn!(mirror = self.store.name(), "mirror worker gone; write dropped");
        }
    }

    /// Wait until every write dispatched before this call has been applied
    /// (or has failed).
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(MirrorOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        match self.store.find_by_email(email).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, mirror = self.store.name(), "mirror read by email failed");
                None
            }
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Option<User> {
        match self.store.find_by_id(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, mirror = self.store.name(), user_id = %id, "mirror read by id failed");
                None
            }
        }
    }
}

async fn run_worker(store: Arc<dyn UserMirror>, mut rx: mpsc::UnboundedReceiver<MirrorOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            MirrorOp::Upsert(user) => match store.upsert(&user).await {
                Ok(()) => debug!(user_id = %user.id, "mirror upsert applied"),
                Err(e) => {
                    warn!(error = %e, mirror = store.name(), user_id = %user.id, "mirror upsert failed; ignored")
                }
            },
            MirrorOp::Delete(id) => match store.delete(&id).await {
                Ok(()) => debug!(user_id = %id, "mirror delete applied"),
                Err(e) => {
                    warn!(error = %e, mirror = store.name(), user_id = %id, "mirror delete failed; ignored")
                }
            },
            MirrorOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("mirror worker stopped");
}
