//! One mailbox and one worker task per owner.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use hashbrown::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{OwnerExecutor, OwnerJob};
use crate::effects::OwnerId;

struct Mailbox {
    tx: mpsc::UnboundedSender<OwnerJob>,
    worker: JoinHandle<()>,
    load: Arc<MailboxLoad>,
}

/// Jobs sent but not yet finished, and whether the owner was released.
/// Both are only changed with the mailbox map locked.
#[derive(Default)]
struct MailboxLoad {
    pending: AtomicUsize,
    released: AtomicBool,
}

type Mailboxes = Mutex<HashMap<OwnerId, Mailbox>>;

fn lock(mailboxes: &Mailboxes) -> MutexGuard<'_, HashMap<OwnerId, Mailbox>> {
    mailboxes.lock().unwrap_or_else(|e| e.into_inner())
}

/// [`OwnerExecutor`] backed by tokio tasks.
///
/// The first job for an owner spawns that owner's worker; the worker drains
/// its mailbox in order, awaiting each job before starting the next. A
/// released owner's mailbox is removed as soon as it is idle, so a later job
/// never runs beside an older one.
#[derive(Default)]
pub struct MailboxExecutor {
    mailboxes: Arc<Mailboxes>,
}

impl MailboxExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mailbox_count(&self) -> usize {
        lock(&self.mailboxes).len()
    }

    /// Close every mailbox and wait for queued jobs to finish.
    pub async fn shutdown(&self) {
        let workers: Vec<_> = lock(&self.mailboxes)
            .drain()
            .map(|(_, mailbox)| mailbox.worker)
            .collect();
        for worker in workers {
            let _ = worker.await;
        }
    }

    fn open_mailbox(&self, owner: OwnerId) -> Mailbox {
        let (tx, mut rx) = mpsc::unbounded_channel::<OwnerJob>();
        let load = Arc::new(MailboxLoad::default());
        let registry = Arc::downgrade(&self.mailboxes);
        let worker_load = Arc::clone(&load);
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
                if finish_job(owner, &registry, &worker_load) {
                    break;
                }
            }
            tracing::trace!(owner = %owner, "Owner mailbox closed");
        });
        Mailbox { tx, worker, load }
    }
}

/// Count one finished job. Returns `true` when the owner was released and
/// this was its last queued job; the mailbox has then been removed.
fn finish_job(owner: OwnerId, registry: &Weak<Mailboxes>, load: &Arc<MailboxLoad>) -> bool {
    let Some(registry) = registry.upgrade() else {
        return false;
    };
    let mut mailboxes = lock(&registry);
    let pending = load.pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
    if pending > 0 || !load.released.load(Ordering::SeqCst) {
        return false;
    }
    if mailboxes
        .get(&owner)
        .is_some_and(|mailbox| Arc::ptr_eq(&mailbox.load, load))
    {
        mailboxes.remove(&owner);
    }
    true
}

impl OwnerExecutor for MailboxExecutor {
    fn execute(&self, owner: OwnerId, job: OwnerJob) {
        let mut mailboxes = lock(&self.mailboxes);
        let mailbox = mailboxes
            .entry(owner)
            .or_insert_with(|| self.open_mailbox(owner));
        mailbox.load.released.store(false, Ordering::SeqCst);
        mailbox.load.pending.fetch_add(1, Ordering::SeqCst);

        if let Err(mpsc::error::SendError(job)) = mailbox.tx.send(job) {
            // Worker died (panicked job); start a fresh one
            tracing::warn!(owner = %owner, "Owner worker gone, reopening mailbox");
            let fresh = self.open_mailbox(owner);
            fresh.load.pending.fetch_add(1, Ordering::SeqCst);
            let _ = fresh.tx.send(job);
            *mailbox = fresh;
        }
    }

    fn release(&self, owner: OwnerId) {
        let mut mailboxes = lock(&self.mailboxes);
        let Some(load) = mailboxes.get(&owner).map(|mailbox| Arc::clone(&mailbox.load)) else {
            return;
        };
        if load.pending.load(Ordering::SeqCst) == 0 {
            // Dropping the sender ends the idle worker
            mailboxes.remove(&owner);
        } else {
            load.released.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn jobs_for_one_owner_run_in_order() {
        let executor = MailboxExecutor::new();
        let owner = OwnerId::from_name("alex");
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5u32 {
            let log = log.clone();
            executor.execute(
                owner,
                Box::pin(async move {
                    // later jobs sleep less; ordering must still hold
                    tokio::time::sleep(Duration::from_millis(u64::from(5 - i))).await;
                    log.lock().unwrap().push(i);
                }),
            );
        }

        let (tx, rx) = oneshot::channel();
        executor.execute(
            owner,
            Box::pin(async move {
                let _ = tx.send(());
            }),
        );
        rx.await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(executor.mailbox_count(), 1);
    }

    #[tokio::test]
    async fn owners_do_not_block_each_other() {
        let executor = MailboxExecutor::new();
        let slow = OwnerId::from_name("slow");
        let fast = OwnerId::from_name("fast");

        let (release_tx, release_rx) = oneshot::channel::<()>();
        executor.execute(
            slow,
            Box::pin(async move {
                let _ = release_rx.await;
            }),
        );

        let (done_tx, done_rx) = oneshot::channel();
        executor.execute(
            fast,
            Box::pin(async move {
                let _ = done_tx.send(());
            }),
        );
        // completes while `slow` is still parked
        done_rx.await.unwrap();
        let _ = release_tx.send(());
        executor.shutdown().await;
        assert_eq!(executor.mailbox_count(), 0);
    }

    #[tokio::test]
    async fn released_mailbox_closes_once_drained() {
        let executor = MailboxExecutor::new();
        let owner = OwnerId::from_name("alex");
        let log = Arc::new(Mutex::new(Vec::new()));

        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let first = log.clone();
        executor.execute(
            owner,
            Box::pin(async move {
                let _ = gate_rx.await;
                first.lock().unwrap().push("queued before release");
            }),
        );
        executor.release(owner);
        // still busy, so it stays open
        assert_eq!(executor.mailbox_count(), 1);

        let _ = gate_tx.send(());
        let (done_tx, done_rx) = oneshot::channel();
        let second = log.clone();
        executor.execute(
            owner,
            Box::pin(async move {
                second.lock().unwrap().push("queued after release");
                let _ = done_tx.send(());
            }),
        );
        done_rx.await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["queued before release", "queued after release"]
        );

        executor.release(owner);
        assert_eq!(executor.mailbox_count(), 0);

        // a released owner can come back, and a busy release closes on drain
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();
        executor.execute(
            owner,
            Box::pin(async move {
                let _ = gate_rx.await;
                let _ = done_tx.send(());
            }),
        );
        assert_eq!(executor.mailbox_count(), 1);
        executor.release(owner);
        let _ = gate_tx.send(());
        done_rx.await.unwrap();
        assert_eq!(executor.mailbox_count(), 0);
    }
}
