//! Shared ranking state
//!
//! The catalog, rating store and blacklist live together behind one
//! `RwLock`. Only the interactive path takes the write lock.

use super::blacklist::Blacklist;
use super::item::{CatalogEntry, ItemId};
use super::store::RatingStore;
use crate::error::{Error, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State shared by the prefetch producer and the interactive session
pub type SharedRanking = Arc<RwLock<RankingState>>;

/// One row of a ranking listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub id: ItemId,
    pub path: String,
    pub rating: f64,
    pub compared: u64,
    pub confidence: f64,
    pub blacklisted: bool,
}

/// Session progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total_items: usize,
    pub unrated_items: usize,
    pub comparisons: u64,
}

#[derive(Debug)]
pub struct RankingState {
    catalog: Vec<CatalogEntry>,
    catalog_paths: HashMap<ItemId, PathBuf>,
    pub store: RatingStore,
    pub blacklist: Blacklist,
}

impl RankingState {
    /// Build the state from a scanned catalog
    ///
    /// Reconciles the store so every catalog item has a record. Duplicate
    /// catalog ids keep their first path.
    pub fn new(catalog: Vec<CatalogEntry>, mut store: RatingStore, blacklist: Blacklist) -> Self {
        let report = store.reconcile(&catalog);
        tracing::info!(
            "Reconciled catalog: {} new items, {} existing, {} blacklisted",
            report.added,
            report.existing,
            blacklist.len()
        );

        let mut catalog_paths = HashMap::with_capacity(catalog.len());
        for entry in &catalog {
            catalog_paths
                .entry(entry.id.clone())
                .or_insert_with(|| entry.path.clone());
        }

        Self {
            catalog,
            catalog_paths,
            store,
            blacklist,
        }
    }

    pub fn shared(self) -> SharedRanking {
        Arc::new(RwLock::new(self))
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn in_catalog(&self, id: &str) -> bool {
        self.catalog_paths.contains_key(id)
    }

    /// Current path of a catalog item
    pub fn path_of(&self, id: &str) -> Result<PathBuf> {
        self.catalog_paths
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Best `n` items that are in the catalog and not blacklisted
    pub fn top_ranked(&self, n: usize) -> Vec<RankedItem> {
        let mut rows: Vec<RankedItem> = self
            .rows()
            .filter(|row| !row.blacklisted && self.in_catalog(&row.id))
            .collect();
        sort_by_rating(&mut rows);
        rows.truncate(n);
        rows
    }

    /// Every record in the store, blacklisted and missing items included
    pub fn all_rankings(&self) -> Vec<RankedItem> {
        let mut rows: Vec<RankedItem> = self.rows().collect();
        sort_by_rating(&mut rows);
        rows
    }

    pub fn progress(&self, comparisons: u64) -> Progress {
        let unrated_items = self
            .catalog_paths
            .keys()
            .filter(|id| !self.blacklist.contains(id) && self.store.compared(id) == 0)
            .count();
        Progress {
            total_items: self.catalog_paths.len(),
            unrated_items,
            comparisons,
        }
    }

    fn rows(&self) -> impl Iterator<Item = RankedItem> + '_ {
        self.store.iter().map(|(id, record)| RankedItem {
            id: id.clone(),
            path: record.path.clone(),
            rating: record.rating,
            compared: record.compared,
            confidence: record.confidence,
            blacklisted: self.blacklist.contains(id),
        })
    }
}

/// Rating descending, ties by id
fn sort_by_rating(rows: &mut [RankedItem]) {
    rows.sort_by(|a, b| match b.rating.total_cmp(&a.rating) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
}
