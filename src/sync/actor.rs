//! Per-account actors.
//!
//! Every account identity gets one task that owns its `Cursor` and handles
//! commands one at a time. Two notifications for the same account can never
//! read the same stale cursor; different accounts run in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::Credential;
use crate::error::SyncError;
use crate::sync::cursor::Cursor;
use crate::sync::cycle::{CycleRunner, ProcessingSummary};

/// Pending commands per account before senders wait.
const ACCOUNT_QUEUE_CAPACITY: usize = 64;

/// Messages understood by an account actor.
#[derive(Debug)]
pub enum Command {
    /// Process a reported sequence before `deadline`.
    Notify {
        credential: Credential,
        sequence: u64,
        deadline: Instant,
        reply: oneshot::Sender<Result<ProcessingSummary, SyncError>>,
    },
    /// Apply a watch baseline; replies with the resulting cursor.
    Rebase {
        baseline: u64,
        reply: oneshot::Sender<u64>,
    },
    /// Read the stored cursor.
    Cursor { reply: oneshot::Sender<Option<u64>> },
}

/// Routes commands to per-account actors, spawning them on first use.
pub struct AccountDispatcher {
    runner: Arc<CycleRunner>,
    accounts: Mutex<HashMap<String, mpsc::Sender<Command>>>,
}

impl AccountDispatcher {
    pub fn new(runner: Arc<CycleRunner>) -> Self {
        Self {
            runner,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Run one notification through the account's actor.
    ///
    /// The budget starts now, so time spent queued behind earlier
    /// notifications for the same account counts against it.
    pub async fn notify(
        &self,
        account: &str,
        credential: Credential,
        sequence: u64,
    ) -> Result<ProcessingSummary, SyncError> {
        let deadline = Instant::now() + self.runner.config().notification_budget;
        let (reply, rx) = oneshot::channel();
        self.send(
            account,
            Command::Notify {
                credential,
                sequence,
                deadline,
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| shutdown(account))?
    }

    /// Apply a watch baseline to the account's cursor.
    pub async fn rebase(&self, account: &str, baseline: u64) -> Result<u64, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(account, Command::Rebase { baseline, reply }).await?;
        rx.await.map_err(|_| shutdown(account))
    }

    /// Stored cursor for an account, `None` if never observed.
    pub async fn cursor(&self, account: &str) -> Result<Option<u64>, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(account, Command::Cursor { reply }).await?;
        rx.await.map_err(|_| shutdown(account))
    }

    async fn send(&self, account: &str, command: Command) -> Result<(), SyncError> {
        let tx = {
            let mut accounts = self.accounts.lock().await;
            accounts
                .entry(account.to_string())
                .or_insert_with(|| self.spawn(account))
                .clone()
        };

        if tx.send(command).await.is_err() {
            warn!(account = %account, "Account actor is gone, dropping its entry");
            let mut accounts = self.accounts.lock().await;
            if accounts.get(account).is_some_and(|current| current.same_channel(&tx)) {
                accounts.remove(account);
            }
            return Err(shutdown(account));
        }
        Ok(())
    }

    fn spawn(&self, account: &str) -> mpsc::Sender<Command> {
        let (tx, rx) = mpsc::channel(ACCOUNT_QUEUE_CAPACITY);
        let actor = AccountActor {
            account: account.to_string(),
            cursor: Cursor::default(),
            runner: self.runner.clone(),
        };
        info!(account = %account, "Starting account actor");
        tokio::spawn(actor.run(rx));
        tx
    }
}

fn shutdown(account: &str) -> SyncError {
    SyncError::Shutdown {
        account: account.to_string(),
    }
}

struct AccountActor {
    account: String,
    cursor: Cursor,
    runner: Arc<CycleRunner>,
}

impl AccountActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Notify {
                    credential,
                    sequence,
                    deadline,
                    reply,
                } => {
                    let result = self.notify(&credential, sequence, deadline).await;
                    // Caller may have gone away; the cursor is already settled.
                    let _ = reply.send(result);
                }
                Command::Rebase { baseline, reply } => {
                    let previous = self.cursor.get();
                    let position = self.cursor.rebase(baseline);
                    info!(
                        account = %self.account,
                        baseline,
                        previous = ?previous,
                        cursor = position,
                        "Cursor rebased from watch"
                    );
                    let _ = reply.send(position);
                }
                Command::Cursor { reply } => {
                    let _ = reply.send(self.cursor.get());
                }
            }
        }
        debug!(account = %self.account, "Account actor stopped");
    }

    async fn notify(
        &mut self,
        credential: &Credential,
        sequence: u64,
        deadline: Instant,
    ) -> Result<ProcessingSummary, SyncError> {
        let budget = self.runner.config().notification_budget;
        let cycle = self
            .runner
            .run(&self.account, credential, self.cursor.get(), sequence, deadline);

        let outcome = match tokio::time::timeout_at(deadline, cycle).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(
                    account = %self.account,
                    sequence,
                    cursor = ?self.cursor.get(),
                    "Notification exceeded its budget, cursor left in place"
                );
                return Err(SyncError::Timeout { budget });
            }
        };

        let summary = outcome.apply(&mut self.cursor);
        info!(
            account = %self.account,
            reported = summary.reported,
            cursor = ?summary.cursor,
            processed = summary.processed,
            transactions = summary.transactions,
            skipped = summary.skipped,
            failed = summary.failed,
            advanced = summary.advanced,
            "Notification processed"
        );
        Ok(summary)
    }
}
