//! Interactive ranking session
//!
//! The single consumer of the prefetch queue. Tracks the pair currently on
//! screen so every decision can be checked against the pair it was made on.
//! Callers hold the session behind an async mutex.

use crate::assets::{AssetLoader, PreparedAsset};
use crate::error::{Error, Result};
use crate::prefetch::{prepare_asset, select_and_prepare, PrefetchQueue, PreloadedEntry};
use crate::ranking::{
    blacklist_item, ComparisonPair, Progress, RankedItem, RatingStore, SelectionPolicy, SharedRanking, Side, DEFAULT_RATING,
};
use elopix_common::events::{EventBus, ItemSnapshot, RankEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Inline selection attempts when the queue has nothing usable
pub const DEFAULT_FALLBACK_ATTEMPTS: usize = 3;

/// Receives what the session shows and records
pub trait PresentationSink: Send + Sync {
    fn pair_presented(&self, pair: &ComparisonPair, left: ItemSnapshot, right: ItemSnapshot);
    fn outcome_recorded(&self, outcome: &Outcome);
    fn item_blacklisted(&self, id: &str);
    fn progress(&self, progress: Progress);
}

impl PresentationSink for EventBus {
    fn pair_presented(&self, pair: &ComparisonPair, left: ItemSnapshot, right: ItemSnapshot) {
        self.emit_lossy(RankEvent::PairPresented {
            pair_id: pair.pair_id,
            left,
            right,
            timestamp: chrono::Utc::now(),
        });
    }

    fn outcome_recorded(&self, outcome: &Outcome) {
        self.emit_lossy(RankEvent::OutcomeRecorded {
            pair_id: outcome.pair_id,
            winner: outcome.winner.clone(),
            loser: outcome.loser.clone(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn item_blacklisted(&self, id: &str) {
        self.emit_lossy(RankEvent::ItemBlacklisted {
            item_id: id.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn progress(&self, progress: Progress) {
        self.emit_lossy(RankEvent::ProgressUpdated {
            total_items: progress.total_items,
            unrated_items: progress.unrated_items,
            comparisons: progress.comparisons,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Result of a recorded decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub pair_id: Uuid,
    pub winner: ItemSnapshot,
    pub loser: ItemSnapshot,
}

pub struct RankingSession {
    state: SharedRanking,
    policy: SelectionPolicy,
    loader: Arc<dyn AssetLoader>,
    queue: PrefetchQueue,
    sink: Arc<dyn PresentationSink>,
    rng: StdRng,
    current: Option<PreloadedEntry>,
    comparisons: u64,
    fallback_attempts: usize,
}

impl RankingSession {
    pub fn new(
        state: SharedRanking,
        policy: SelectionPolicy,
        loader: Arc<dyn AssetLoader>,
        queue: PrefetchQueue,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        Self {
            state,
            policy,
            loader,
            queue,
            sink,
            rng: StdRng::from_entropy(),
            current: None,
            comparisons: 0,
            fallback_attempts: DEFAULT_FALLBACK_ATTEMPTS,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_fallback_attempts(mut self, attempts: usize) -> Self {
        self.fallback_attempts = attempts.max(1);
        self
    }

    /// Pair currently on screen
    pub fn current(&self) -> Option<&ComparisonPair> {
        self.current.as_ref().map(|entry| &entry.pair)
    }

    /// Decisions recorded this session
    pub fn comparisons(&self) -> u64 {
        self.comparisons
    }

    /// Present the next pair
    ///
    /// Takes the oldest usable prefetched entry; otherwise selects and
    /// prepares one inline. Any pair already on screen is replaced.
    pub async fn request_next_pair(&mut self) -> Result<ComparisonPair> {
        let entry = match self.next_prefetched().await {
            Some(entry) => entry,
            None => self.prepare_inline().await?,
        };
        let pair = entry.pair.clone();
        self.current = Some(entry);
        self.announce(&pair).await;
        Ok(pair)
    }

    /// Record that the item on `side` of pair `pair_id` won
    ///
    /// The pair is consumed; a second decision on it fails with
    /// `PairNotFound`.
    pub async fn report_winner(&mut self, pair_id: Uuid, side: Side) -> Result<Outcome> {
        let pair = self.current_pair(pair_id)?.clone();
        let winner = pair.id(side);
        let loser = pair.id(side.other());

        let (outcome, progress) = {
            let mut state = self.state.write().await;
            state.store.record_outcome(winner, loser)?;
            self.comparisons += 1;
            let outcome = Outcome {
                pair_id,
                winner: snapshot(&state.store, winner),
                loser: snapshot(&state.store, loser),
            };
            (outcome, state.progress(self.comparisons))
        };
        self.current = None;

        info!(
            "{} ({:.1}) beat {} ({:.1})",
            outcome.winner.id, outcome.winner.rating, outcome.loser.id, outcome.loser.rating
        );
        self.sink.outcome_recorded(&outcome);
        self.sink.progress(progress);
        Ok(outcome)
    }

    /// Permanently exclude the item on `side` and show the pair with a
    /// replacement in its place
    ///
    /// The replacement pair gets a fresh `pair_id`. If no replacement is
    /// available, or the blacklist document cannot be written, the displayed
    /// pair is withdrawn.
    pub async fn blacklist_and_replace(&mut self, pair_id: Uuid, side: Side) -> Result<ComparisonPair> {
        let displayed = self.current_pair(pair_id)?.clone();
        let removed = displayed.id(side).clone();

        if let Err(e) = blacklist_item(&self.state, &removed).await {
            // Excluded in memory, so the displayed pair can no longer be decided
            self.current = None;
            return Err(e);
        }
        self.sink.item_blacklisted(&removed);

        let mut last_error = None;
        for attempt in 1..=self.fallback_attempts {
            let path = {
                let state = self.state.read().await;
                self.policy
                    .replace_one(
                        &displayed,
                        side,
                        state.catalog(),
                        &state.blacklist,
                        &state.store,
                        &mut self.rng,
                    )
                    .and_then(|id| state.path_of(&id).map(|path| (id, path)))
            };
            let (replacement, path) = match path {
                Ok(found) => found,
                Err(e) => {
                    self.current = None;
                    return Err(e);
                }
            };

            match prepare_asset(&self.loader, path).await {
                Ok(asset) => {
                    let pair = displayed.with_replaced(side, replacement);
                    let entry = self.replace_entry(pair.clone(), side, asset)?;
                    debug!("Replaced blacklisted {} with {}", removed, pair.id(side));
                    self.current = Some(entry);
                    self.announce(&pair).await;
                    return Ok(pair);
                }
                Err(e) => {
                    warn!("Replacement attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }
        }

        self.current = None;
        Err(last_error.unwrap_or_else(|| Error::Internal("no replacement attempted".to_string())))
    }

    /// Prepared asset for one side of the pair on screen
    pub fn asset(&self, pair_id: Uuid, side: Side) -> Result<Arc<PreparedAsset>> {
        match &self.current {
            Some(entry) if entry.pair.pair_id == pair_id => Ok(entry.asset(side).clone()),
            _ => Err(Error::PairNotFound(pair_id)),
        }
    }

    pub async fn top_ranked(&self, n: usize) -> Vec<RankedItem> {
        self.state.read().await.top_ranked(n)
    }

    pub async fn all_rankings(&self) -> Vec<RankedItem> {
        self.state.read().await.all_rankings()
    }

    pub async fn progress(&self) -> Progress {
        self.state.read().await.progress(self.comparisons)
    }

    fn current_pair(&self, pair_id: Uuid) -> Result<&ComparisonPair> {
        self.current
            .as_ref()
            .map(|entry| &entry.pair)
            .filter(|pair| pair.pair_id == pair_id)
            .ok_or(Error::PairNotFound(pair_id))
    }

    /// Oldest queued entry that contains no blacklisted item
    async fn next_prefetched(&mut self) -> Option<PreloadedEntry> {
        while let Some(entry) = self.queue.try_next() {
            let stale = {
                let state = self.state.read().await;
                state.blacklist.contains(&entry.pair.left) || state.blacklist.contains(&entry.pair.right)
            };
            if stale {
                debug!("Discarding stale prefetched pair {}", entry.pair.pair_id);
                continue;
            }
            return Some(entry);
        }
        None
    }

    async fn prepare_inline(&mut self) -> Result<PreloadedEntry> {
        debug!("Prefetch queue empty, selecting inline");
        let mut last_error = None;
        for attempt in 1..=self.fallback_attempts {
            match select_and_prepare(&self.state, &self.policy, &self.loader, &mut self.rng).await {
                Ok(entry) => return Ok(entry),
                Err(e @ Error::AssetPreparation { .. }) => {
                    warn!("Inline preparation attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Internal("no selection attempted".to_string())))
    }

    /// Current entry with `side` swapped for a newly prepared asset
    fn replace_entry(&self, pair: ComparisonPair, side: Side, asset: Arc<PreparedAsset>) -> Result<PreloadedEntry> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| Error::Internal("no pair on screen".to_string()))?;
        let (left, right) = match side {
            Side::Left => (asset, current.right.clone()),
            Side::Right => (current.left.clone(), asset),
        };
        Ok(PreloadedEntry { pair, left, right })
    }

    async fn announce(&self, pair: &ComparisonPair) {
        let (left, right, progress) = {
            let state = self.state.read().await;
            (
                snapshot(&state.store, &pair.left),
                snapshot(&state.store, &pair.right),
                state.progress(self.comparisons),
            )
        };
        self.sink.pair_presented(pair, left, right);
        self.sink.progress(progress);
    }
}

fn snapshot(store: &RatingStore, id: &str) -> ItemSnapshot {
    let (rating, compared) = store
        .get(id)
        .map(|record| (record.rating, record.compared))
        .unwrap_or((DEFAULT_RATING, 0));
    ItemSnapshot {
        id: id.to_string(),
        rating,
        compared,
    }
}
