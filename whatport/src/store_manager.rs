use std::thread;
use tokio::sync::{mpsc, oneshot};
use shared::types::{PortRecord, StoreStatus};
use crate::error::{Result, StoreError};
use crate::query;
use crate::store::db::PortDb;

/// Commands sent to the store thread
pub enum StoreCommand {
    Lookup {
        key: String,
        like: bool,
        reply: oneshot::Sender<Result<Vec<PortRecord>>>,
    },
    Describe(String, oneshot::Sender<Result<String>>),
    Status(oneshot::Sender<Result<StoreStatus>>),
    Shutdown,
}

/// Handle to query the port database from async code.
/// The connection lives on its own thread and is dropped when it exits.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Spawn a new store thread owning the given database
    pub fn spawn(db: PortDb) -> Self {
        let (tx, mut rx) = mpsc::channel::<StoreCommand>(256);

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    StoreCommand::Lookup { key, like, reply } => {
                        let result = query::lookup(&db, &key, like);
                        let _ = reply.send(result);
                    }
                    StoreCommand::Describe(protocol, reply) => {
                        let result = query::describe(&db, &protocol);
                        let _ = reply.send(result);
                    }
                    StoreCommand::Status(reply) => {
                        let _ = reply.send(db.status());
                    }
                    StoreCommand::Shutdown => {
                        tracing::info!("Store thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Find services by port or name, merging protocol variants
    pub async fn lookup(&self, key: String, like: bool) -> Result<Vec<PortRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Lookup { key, like, reply }).await?;
        rx.await.map_err(|_| StoreError::WorkerGone)?
    }

    /// Description of a protocol, empty when unknown
    pub async fn describe(&self, protocol: String) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Describe(protocol, reply)).await?;
        rx.await.map_err(|_| StoreError::WorkerGone)?
    }

    /// Record count and import metadata
    pub async fn status(&self) -> Result<StoreStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Status(reply)).await?;
        rx.await.map_err(|_| StoreError::WorkerGone)?
    }

    /// Shutdown the store thread
    pub async fn shutdown(&self) -> Result<()> {
        self.send(StoreCommand::Shutdown).await
    }

    async fn send(&self, cmd: StoreCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| StoreError::WorkerGone)
    }
}
