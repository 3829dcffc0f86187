//! The background sync loop.
//!
//! One tokio task per attached document. The task owns the sync cadence
//! and talks to its [`SyncHandle`](crate::sync::SyncHandle) over a
//! command channel; status flows back over watch channels. A cycle pulls
//! first, then pushes, so pushed changes are already stamped with a
//! clock that has observed everything the server had.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, warn};

use crate::document::Document;
use crate::sync::errors::SyncError;
use crate::sync::protocol::{PullRequest, PushRequest};
use crate::sync::state::{ConnectionStatus, SyncStatus};
use crate::sync::transport::DocumentTransport;
use crate::sync::SyncOptions;
use crate::time::ActorId;

pub(crate) enum SyncCommand {
    SyncNow {
        respond_to: oneshot::Sender<Result<(), SyncError>>,
    },
    Pause,
    Resume,
    Detach {
        respond_to: oneshot::Sender<Result<(), SyncError>>,
    },
}

pub(crate) struct SyncLoop {
    document: Arc<Mutex<Document>>,
    transport: Arc<dyn DocumentTransport>,
    options: SyncOptions,
    commands: mpsc::Receiver<SyncCommand>,
    status_tx: watch::Sender<SyncStatus>,
    connection_tx: watch::Sender<ConnectionStatus>,
    failures: u32,
    paused: bool,
}

impl SyncLoop {
    pub(crate) fn new(
        document: Arc<Mutex<Document>>,
        transport: Arc<dyn DocumentTransport>,
        options: SyncOptions,
        commands: mpsc::Receiver<SyncCommand>,
        status_tx: watch::Sender<SyncStatus>,
        connection_tx: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            document,
            transport,
            options,
            commands,
            status_tx,
            connection_tx,
            failures: 0,
            paused: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut interval = tokio::time::interval(self.options.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick(), if !self.paused => {
                    if self.cycle().await.is_err() {
                        interval.reset_after(self.backoff());
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(SyncCommand::SyncNow { respond_to }) => {
                        let result = self.cycle().await;
                        let _ = respond_to.send(result);
                    }
                    Some(SyncCommand::Pause) => {
                        self.paused = true;
                        let _ = self.status_tx.send(SyncStatus::Paused);
                    }
                    Some(SyncCommand::Resume) => {
                        if self.paused {
                            self.paused = false;
                            interval.reset_immediately();
                        }
                    }
                    Some(SyncCommand::Detach { respond_to }) => {
                        let result = self.shutdown().await;
                        let _ = respond_to.send(result);
                        return;
                    }
                    // Handle dropped without an explicit detach.
                    None => {
                        let _ = self.shutdown().await;
                        return;
                    }
                },
            }
        }
    }

    /// One pull-then-push exchange.
    async fn cycle(&mut self) -> Result<(), SyncError> {
        let _ = self.status_tx.send(SyncStatus::Syncing);
        let result = match self.pull().await {
            Ok(()) => self.push().await,
            Err(err) => Err(err),
        };
        match &result {
            Ok(()) => {
                self.failures = 0;
                let _ = self.connection_tx.send(ConnectionStatus::Connected);
                let status = if self.paused {
                    SyncStatus::Paused
                } else {
                    SyncStatus::Synced
                };
                let _ = self.status_tx.send(status);
            }
            Err(err) => {
                self.failures += 1;
                warn!(failures = self.failures, %err, "sync cycle failed");
                let _ = self.connection_tx.send(ConnectionStatus::Disconnected);
            }
        }
        result
    }

    async fn pull(&mut self) -> Result<(), SyncError> {
        let (key, actor, after_seq, observed_lamport) = {
            let doc = self.document.lock().await;
            (
                doc.key().clone(),
                doc.actor(),
                doc.last_server_seq(),
                doc.observed_lamport(),
            )
        };
        let response = self
            .transport
            .pull(PullRequest {
                key,
                actor,
                after_seq,
                observed_lamport,
            })
            .await?;

        let mut doc = self.document.lock().await;
        let own = doc.actor();
        for sequenced in &response.changes {
            doc.set_last_server_seq(sequenced.seq);
            // Own changes come back to keep the numbering gapless; they
            // are already applied locally.
            if sequenced.change.actor != own {
                doc.apply_change(&sequenced.change);
            }
        }

        let attached: HashSet<ActorId> = response
            .presences
            .iter()
            .map(|(actor, _)| *actor)
            .collect();
        let departed: Vec<ActorId> = doc
            .presences()
            .map(|(actor, _)| *actor)
            .filter(|actor| *actor != own && !attached.contains(actor))
            .collect();
        for actor in departed {
            doc.remove_presence(actor);
        }
        for (actor, record) in response.presences {
            doc.merge_presence(actor, record);
        }

        doc.garbage_collect(response.min_synced_lamport);
        Ok(())
    }

    async fn push(&mut self) -> Result<(), SyncError> {
        let (key, actor, changes, presence, observed_lamport) = {
            let mut doc = self.document.lock().await;
            (
                doc.key().clone(),
                doc.actor(),
                doc.pending_changes(),
                doc.take_presence_update(),
                doc.observed_lamport(),
            )
        };
        if changes.is_empty() && presence.is_none() {
            return Ok(());
        }
        let pushed = changes.len();
        let response = self
            .transport
            .push(PushRequest {
                key,
                actor,
                changes,
                presence,
                observed_lamport,
            })
            .await?;

        let mut doc = self.document.lock().await;
        doc.acknowledge(response.stored.min(pushed));
        doc.garbage_collect(response.min_synced_lamport);
        debug!(pushed, stored = response.stored, "push acknowledged");
        Ok(())
    }

    /// Flush what we can, then deregister.
    async fn shutdown(&mut self) -> Result<(), SyncError> {
        let result = self.cycle().await;
        let (key, actor) = {
            let doc = self.document.lock().await;
            (doc.key().clone(), doc.actor())
        };
        let detach = self.transport.detach(&key, actor).await;
        self.document.lock().await.mark_detached();
        let _ = self.status_tx.send(SyncStatus::Detached);
        result.and(detach)
    }

    fn backoff(&self) -> Duration {
        let exp = self.failures.min(16);
        let delay = self
            .options
            .interval
            .saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.options.max_backoff)
    }
}
