//! Best-effort background repair of the secondary index.
//!
//! When a principal-scoped query has to fall back to a full table scan, the
//! results it found belong in the index. The backfill must not run inside
//! the read transaction that discovered it, so entries are queued to a
//! worker thread that applies each batch in its own write transaction.
//!
//! A backfill may race with a concurrent revoke and land a stale entry;
//! that leaves a dangling index row, which the query engine skips and the
//! next fallback re-repairs. Failures here are logged and dropped, never
//! surfaced to the read that queued them.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use authmap_kv::{KvError, Store, Tx};

use crate::keys::MAPPINGS_INDEX_TABLE;

/// An index entry to (re)write: index key → primary key.
pub(crate) type IndexEntry = (Vec<u8>, Vec<u8>);

enum IndexJob {
    Add(Vec<IndexEntry>),
    Flush(SyncSender<()>),
}

/// Handle to the index-repair worker. Dropping it drains the queue and
/// joins the thread.
pub struct Indexer {
    jobs: Option<Sender<IndexJob>>,
    worker: Option<JoinHandle<()>>,
}

impl Indexer {
    pub fn spawn<S>(store: Arc<S>) -> Self
    where
        S: Store + Send + Sync + 'static,
    {
        let (jobs, inbox) = mpsc::channel();
        let worker = thread::spawn(move || run(store, inbox));
        Self {
            jobs: Some(jobs),
            worker: Some(worker),
        }
    }

    /// Queue index entries for a background write. Best-effort: entries
    /// queued during shutdown are dropped.
    pub(crate) fn add_to_index(&self, entries: Vec<IndexEntry>) {
        if entries.is_empty() {
            return;
        }
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(IndexJob::Add(entries));
        }
    }

    /// Block until every previously queued backfill has been applied.
    ///
    /// The queue is processed in order, so a rendezvous behind the pending
    /// jobs is a completion barrier. Used by tests and shutdown.
    pub fn flush(&self) {
        let (done, wait) = mpsc::sync_channel(0);
        if let Some(jobs) = &self.jobs {
            if jobs.send(IndexJob::Flush(done)).is_ok() {
                let _ = wait.recv();
            }
        }
    }
}

impl Drop for Indexer {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run<S>(store: Arc<S>, inbox: Receiver<IndexJob>)
where
    S: Store + Send + Sync + 'static,
{
    while let Ok(job) = inbox.recv() {
        match job {
            IndexJob::Add(entries) => {
                let written = store.update(|tx| {
                    let mut index = tx.table(MAPPINGS_INDEX_TABLE)?;
                    for (ikey, pkey) in &entries {
                        index.put(ikey, pkey)?;
                    }
                    Ok::<_, KvError>(())
                });
                if let Err(e) = written {
                    tracing::warn!(error = %e, "index backfill failed; a later read will retry");
                }
            }
            IndexJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
