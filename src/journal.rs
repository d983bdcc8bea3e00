use std::io;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::model::Event;
use crate::wal::Wal;

/// Where the engine records its mutations. The engine applies an event to
/// memory only after `append` succeeds.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn append(&self, event: &Event) -> io::Result<()>;

    /// Replace the journal with `events`, the minimal history recreating current state.
    async fn compact(&self, events: Vec<Event>) -> io::Result<()>;

    async fn appends_since_compact(&self) -> u64;
}

// ── In-memory journal ────────────────────────────────────

/// Keeps events in a Vec. Nothing survives the process.
#[derive(Default)]
pub struct MemoryJournal {
    events: Mutex<Vec<Event>>,
    appends_since_compact: Mutex<u64>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

fn poisoned() -> io::Error {
    io::Error::other("memory journal lock poisoned")
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, event: &Event) -> io::Result<()> {
        self.events.lock().map_err(|_| poisoned())?.push(event.clone());
        *self.appends_since_compact.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }

    async fn compact(&self, events: Vec<Event>) -> io::Result<()> {
        *self.events.lock().map_err(|_| poisoned())? = events;
        *self.appends_since_compact.lock().map_err(|_| poisoned())? = 0;
        Ok(())
    }

    async fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact.lock().map(|n| *n).unwrap_or(0)
    }
}

// ── Group-commit WAL journal ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Durable journal backed by a `Wal` owned by a background writer task.
pub struct WalJournal {
    tx: mpsc::Sender<WalCommand>,
}

impl WalJournal {
    /// Open the WAL at `path` and spawn its writer. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let wal = Wal::open(path)?;
        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, rx));
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> WalCommand,
    ) -> io::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| io::Error::other("WAL writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("WAL writer dropped response"))
    }
}

#[async_trait]
impl Journal for WalJournal {
    async fn append(&self, event: &Event) -> io::Result<()> {
        let event = event.clone();
        self.request(|response| WalCommand::Append { event, response })
            .await?
    }

    async fn compact(&self, events: Vec<Event>) -> io::Result<()> {
        self.request(|response| WalCommand::Compact { events, response })
            .await?
    }

    async fn appends_since_compact(&self) -> u64 {
        self.request(|response| WalCommand::AppendsSinceCompact { response })
            .await
            .unwrap_or(0)
    }
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    tracing::debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

/// Write and sync the whole batch, or leave the file as it was before it.
fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err()
        && let Err(e) = wal.rollback()
    {
        tracing::error!("WAL rollback after failed batch also failed: {e}");
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_journal");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn deleted(id: u64) -> Event {
        Event::ReservationDeleted { id }
    }

    #[tokio::test]
    async fn memory_journal_records_and_compacts() {
        let journal = MemoryJournal::new();
        journal.append(&deleted(1)).await.unwrap();
        journal.append(&deleted(2)).await.unwrap();
        assert_eq!(journal.appends_since_compact().await, 2);
        assert_eq!(journal.events(), vec![deleted(1), deleted(2)]);

        journal.compact(vec![deleted(2)]).await.unwrap();
        assert_eq!(journal.appends_since_compact().await, 0);
        assert_eq!(journal.events(), vec![deleted(2)]);
    }

    #[tokio::test]
    async fn wal_journal_appends_are_replayable() {
        let path = test_wal_path("journal_append.wal");
        let journal = WalJournal::open(&path).unwrap();
        for id in 1..=3 {
            journal.append(&deleted(id)).await.unwrap();
        }
        assert_eq!(journal.appends_since_compact().await, 3);

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![deleted(1), deleted(2), deleted(3)]);
    }

    #[tokio::test]
    async fn wal_journal_concurrent_appends_all_land() {
        let path = test_wal_path("journal_concurrent.wal");
        let journal = std::sync::Arc::new(WalJournal::open(&path).unwrap());

        let mut handles = Vec::new();
        for id in 0..50u64 {
            let j = journal.clone();
            handles.push(tokio::spawn(async move { j.append(&deleted(id)).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let mut ids: Vec<u64> = Wal::replay(&path)
            .unwrap()
            .into_iter()
            .map(|e| match e {
                Event::ReservationDeleted { id } => id,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        ids.sort();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn wal_journal_compact_resets_counter() {
        let path = test_wal_path("journal_compact.wal");
        let journal = WalJournal::open(&path).unwrap();
        for id in 1..=5 {
            journal.append(&deleted(id)).await.unwrap();
        }
        journal.compact(vec![deleted(5)]).await.unwrap();
        assert_eq!(journal.appends_since_compact().await, 0);
        journal.append(&deleted(6)).await.unwrap();

        assert_eq!(Wal::replay(&path).unwrap(), vec![deleted(5), deleted(6)]);
    }
}
