//! Durable save of ratings and blacklist
//!
//! Both documents are snapshotted under the state read lock and written
//! outside it on the blocking pool.

use super::blacklist::write_blacklist;
use super::item::ItemId;
use super::state::{RankingState, SharedRanking};
use super::store::RatingStore;
use crate::error::{Error, Result};
use elopix_common::events::{EventBus, RankEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const RATINGS_FILE: &str = "ratings.json";
pub const BLACKLIST_FILE: &str = "blacklist.json";

/// What a save wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SaveSummary {
    pub items: usize,
    pub blacklisted: usize,
}

#[derive(Debug, Clone)]
pub struct PersistenceController {
    ratings_path: PathBuf,
    blacklist_path: PathBuf,
}

impl PersistenceController {
    pub fn new(ratings_path: impl Into<PathBuf>, blacklist_path: impl Into<PathBuf>) -> Self {
        Self {
            ratings_path: ratings_path.into(),
            blacklist_path: blacklist_path.into(),
        }
    }

    /// Controller for the standard document names inside `data_folder`
    pub fn in_folder(data_folder: &Path) -> Self {
        Self::new(data_folder.join(RATINGS_FILE), data_folder.join(BLACKLIST_FILE))
    }

    pub fn ratings_path(&self) -> &Path {
        &self.ratings_path
    }

    pub fn blacklist_path(&self) -> &Path {
        &self.blacklist_path
    }

    /// Write both documents
    ///
    /// In-memory state is never touched by a failed save.
    pub async fn save(&self, state: &RwLock<RankingState>) -> Result<SaveSummary> {
        let (store, blacklist): (RatingStore, Vec<ItemId>) = {
            let state = state.read().await;
            (state.store.clone(), state.blacklist.snapshot())
        };
        let summary = SaveSummary {
            items: store.len(),
            blacklisted: blacklist.len(),
        };

        let ratings_path = self.ratings_path.clone();
        let blacklist_path = self.blacklist_path.clone();
        let written = tokio::task::spawn_blocking(move || -> Result<Vec<ItemId>> {
            store.save(&ratings_path)?;
            write_blacklist(&blacklist_path, &blacklist)?;
            Ok(blacklist)
        })
        .await
        .map_err(|e| Error::Internal(format!("save task failed: {}", e)))?;

        match written {
            Ok(saved_ids) => {
                state.write().await.blacklist.mark_saved(saved_ids.len());
                info!(
                    "Saved {} ratings to {} and {} blacklisted ids to {}",
                    summary.items,
                    self.ratings_path.display(),
                    summary.blacklisted,
                    self.blacklist_path.display()
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Save failed: {}", e);
                Err(e)
            }
        }
    }

    /// Save every `interval` until cancelled
    ///
    /// Failures are logged and retried on the next tick.
    pub fn spawn_autosave(
        &self,
        state: SharedRanking,
        interval: Duration,
        cancel: CancellationToken,
        events: EventBus,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            info!("Autosave every {}s", interval.as_secs());
            let mut tick = tokio::time::interval(interval);
            // First tick completes immediately
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Autosave stopping");
                        break;
                    }
                    _ = tick.tick() => {
                        if let Ok(summary) = controller.save(&state).await {
                            events.emit_lossy(RankEvent::RatingsSaved {
                                items: summary.items,
                                blacklisted: summary.blacklisted,
                                timestamp: chrono::Utc::now(),
                            });
                        }
                    }
                }
            }
        })
    }
}

/// Blacklist `id` and write the blacklist document
///
/// The id is inserted and snapshotted under the write lock; the document is
/// written on the blocking pool after the lock is released. If the write
/// fails the exclusion still holds in memory and the next addition or save
/// retries it. Returns whether `id` was newly added.
pub async fn blacklist_item(state: &RwLock<RankingState>, id: &str) -> Result<bool> {
    let (added, pending) = {
        let mut state = state.write().await;
        let added = state.blacklist.insert(id);
        (added, state.blacklist.pending_write())
    };
    let Some((path, ids)) = pending else {
        return Ok(added);
    };

    let saved_len = ids.len();
    tokio::task::spawn_blocking(move || write_blacklist(&path, &ids))
        .await
        .map_err(|e| Error::Internal(format!("blacklist write task failed: {}", e)))??;

    state.write().await.blacklist.mark_saved(saved_len);
    debug!("Blacklist document holds {} ids", saved_len);
    Ok(added)
}
