//! Prefetch pipeline
//!
//! A producer task keeps a bounded queue of ready-to-show pairs filled ahead
//! of demand. Each entry is a selected pair plus both prepared assets.
//!
//! - Selection runs under a short read lock on the ranking state
//! - Asset preparation runs on the blocking pool with no lock held
//! - A full queue suspends the producer until the consumer drains it
//! - The producer stops when its `CancellationToken` fires and is joined on
//!   shutdown

use crate::assets::{AssetLoader, PreparedAsset};
use crate::error::{Error, Result};
use crate::ranking::{ComparisonPair, SelectionPolicy, SharedRanking, Side};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A pair with both assets prepared
#[derive(Debug, Clone)]
pub struct PreloadedEntry {
    pub pair: ComparisonPair,
    pub left: Arc<PreparedAsset>,
    pub right: Arc<PreparedAsset>,
}

impl PreloadedEntry {
    pub fn asset(&self, side: Side) -> &Arc<PreparedAsset> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PrefetchSettings {
    /// Ready entries buffered ahead of the consumer
    pub capacity: usize,
    /// Pause after an asset preparation failure
    pub retry_backoff: Duration,
    /// Pause while too few items are eligible
    pub idle_backoff: Duration,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            capacity: 5,
            retry_backoff: Duration::from_millis(250),
            idle_backoff: Duration::from_millis(500),
        }
    }
}

/// Consumer side of the pipeline
pub struct PrefetchQueue {
    rx: mpsc::Receiver<PreloadedEntry>,
}

impl PrefetchQueue {
    /// Oldest ready entry, without waiting
    pub fn try_next(&mut self) -> Option<PreloadedEntry> {
        self.rx.try_recv().ok()
    }

    /// Entries currently buffered
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Control side of the producer task
pub struct PrefetchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    produced: Arc<AtomicU64>,
}

impl PrefetchHandle {
    /// Entries enqueued since start
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Stop the producer and wait for it to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Prefetch producer ended abnormally: {}", e);
        }
    }
}

/// Start the producer task
///
/// `cancel` may be shared with other tasks; cancelling it stops the
/// producer at its next suspension point.
pub fn spawn(
    state: SharedRanking,
    policy: SelectionPolicy,
    loader: Arc<dyn AssetLoader>,
    settings: PrefetchSettings,
    cancel: CancellationToken,
) -> (PrefetchQueue, PrefetchHandle) {
    let (tx, rx) = mpsc::channel(settings.capacity.max(1));
    let produced = Arc::new(AtomicU64::new(0));

    let task = tokio::spawn(producer_loop(
        state,
        policy,
        loader,
        settings,
        tx,
        cancel.clone(),
        produced.clone(),
    ));

    (
        PrefetchQueue { rx },
        PrefetchHandle {
            cancel,
            task,
            produced,
        },
    )
}

async fn producer_loop(
    state: SharedRanking,
    policy: SelectionPolicy,
    loader: Arc<dyn AssetLoader>,
    settings: PrefetchSettings,
    tx: mpsc::Sender<PreloadedEntry>,
    cancel: CancellationToken,
    produced: Arc<AtomicU64>,
) {
    info!("Prefetch producer started (capacity {})", settings.capacity);
    let mut rng = StdRng::from_entropy();

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = select_and_prepare(&state, &policy, &loader, &mut rng) => result,
        };

        let entry = match result {
            Ok(entry) => entry,
            Err(Error::InsufficientCandidates { eligible }) => {
                debug!("Prefetch idle: {} eligible items", eligible);
                if pause(&cancel, settings.idle_backoff).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!("Prefetch failed, retrying: {}", e);
                if pause(&cancel, settings.retry_backoff).await {
                    break;
                }
                continue;
            }
        };

        debug!(
            "Prefetched pair {} ({} vs {})",
            entry.pair.pair_id, entry.pair.left, entry.pair.right
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(entry) => {
                if sent.is_err() {
                    debug!("Prefetch queue closed");
                    break;
                }
                produced.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    info!("Prefetch producer stopped after {} entries", produced.load(Ordering::Relaxed));
}

/// Sleep for `backoff`; true if cancelled meanwhile
async fn pause(cancel: &CancellationToken, backoff: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(backoff) => false,
    }
}

/// Select a pair under the read lock, then prepare its assets without it
pub(crate) async fn select_and_prepare(
    state: &SharedRanking,
    policy: &SelectionPolicy,
    loader: &Arc<dyn AssetLoader>,
    rng: &mut StdRng,
) -> Result<PreloadedEntry> {
    let (pair, left_path, right_path) = {
        let state = state.read().await;
        let (left, right) = policy.select_pair(state.catalog(), &state.blacklist, &state.store, rng)?;
        let left_path = state.path_of(&left)?;
        let right_path = state.path_of(&right)?;
        (ComparisonPair::new(left, right), left_path, right_path)
    };

    let (left, right) = tokio::try_join!(
        prepare_asset(loader, left_path),
        prepare_asset(loader, right_path)
    )?;
    Ok(PreloadedEntry { pair, left, right })
}

/// Prepare one asset on the blocking pool
pub(crate) async fn prepare_asset(loader: &Arc<dyn AssetLoader>, path: PathBuf) -> Result<Arc<PreparedAsset>> {
    let loader = loader.clone();
    tokio::task::spawn_blocking(move || loader.prepare(&path).map(Arc::new))
        .await
        .map_err(|e| Error::Internal(format!("asset task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{Blacklist, CatalogEntry, RankingState, RatingStore};
    use std::path::Path;

    struct StubLoader;

    impl AssetLoader for StubLoader {
        fn prepare(&self, path: &Path) -> Result<PreparedAsset> {
            Ok(PreparedAsset {
                path: path.to_path_buf(),
                mime: "image/png",
                bytes: axum::body::Bytes::new(),
            })
        }
    }

    struct FailingLoader;

    impl AssetLoader for FailingLoader {
        fn prepare(&self, path: &Path) -> Result<PreparedAsset> {
            Err(Error::AssetPreparation {
                path: path.to_path_buf(),
                reason: "corrupt".to_string(),
            })
        }
    }

    fn shared(ids: &[&str]) -> SharedRanking {
        let catalog = ids.iter().map(|id| CatalogEntry::new(*id, format!("/img/{}", id))).collect();
        RankingState::new(catalog, RatingStore::new(), Blacklist::in_memory()).shared()
    }

    #[tokio::test]
    async fn test_select_and_prepare_attaches_matching_assets() {
        let state = shared(&["a", "b"]);
        let loader: Arc<dyn AssetLoader> = Arc::new(StubLoader);
        let mut rng = StdRng::seed_from_u64(1);

        let entry = select_and_prepare(&state, &SelectionPolicy::default(), &loader, &mut rng)
            .await
            .unwrap();
        assert_eq!(entry.left.path, PathBuf::from(format!("/img/{}", entry.pair.left)));
        assert_eq!(entry.right.path, PathBuf::from(format!("/img/{}", entry.pair.right)));
    }

    #[tokio::test]
    async fn test_producer_fills_queue_and_stops_on_cancel() {
        let state = shared(&["a", "b", "c"]);
        let cancel = CancellationToken::new();
        let (queue, handle) = spawn(
            state,
            SelectionPolicy::default(),
            Arc::new(StubLoader),
            PrefetchSettings::default(),
            cancel,
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.len() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(handle.produced(), 5);
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_assets_keep_producer_alive() {
        let state = shared(&["a", "b"]);
        let settings = PrefetchSettings {
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let (mut queue, handle) = spawn(
            state,
            SelectionPolicy::default(),
            Arc::new(FailingLoader),
            settings,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.try_next().is_none());
        assert!(!handle.task.is_finished());
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_too_few_items_idles_until_cancelled() {
        let state = shared(&["lonely"]);
        let settings = PrefetchSettings {
            idle_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let (queue, handle) = spawn(
            state,
            SelectionPolicy::default(),
            Arc::new(StubLoader),
            settings,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(queue.is_empty());
        assert_eq!(handle.produced(), 0);
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await.unwrap();
    }
}
