//! Persisted rating store
//!
//! Maps item identity to a fully-populated [`RatingRecord`]. The on-disk
//! document is a JSON object `{ id: {path, rating, compared, confidence} }`.
//!
//! Two older record shapes are upgraded once, at load:
//! - bare numbers (`"cat.png": 1350`) from the first rating format
//! - records without `compared`/`confidence`
//!
//! Saves always write the current shape.

use super::elo;
use super::item::{CatalogEntry, ItemId, RatingRecord, DEFAULT_RATING};
use crate::error::{Error, Result};
use elopix_common::atomic_file::write_json_atomic;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Record shapes accepted when reading a ratings document
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    /// Bare rating
    Bare(f64),
    /// Record, possibly missing fields added later
    Record(PartialRecord),
}

#[derive(Debug, Deserialize)]
struct PartialRecord {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    compared: Option<u64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// What the load-time migration changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries read from the document
    pub entries: usize,
    /// Bare-number entries upgraded to records
    pub upgraded_bare: usize,
    /// Records that were missing one or more fields
    pub filled_defaults: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.upgraded_bare == 0 && self.filled_defaults == 0
    }
}

/// Outcome of reconciling the store against a catalog scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Catalog items that got a fresh record
    pub added: usize,
    /// Catalog items whose existing record was kept
    pub existing: usize,
}

/// Rating store: identity → rating record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingStore {
    records: BTreeMap<ItemId, RatingRecord>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ratings document at `path`
    ///
    /// A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No ratings document at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::persistence(path, e))?;
        let (store, report) = Self::from_json_str(&content).map_err(|e| Error::persistence(path, e))?;

        if report.is_noop() {
            debug!("Loaded {} rating records from {}", report.entries, path.display());
        } else {
            info!(
                "Loaded {} rating records from {} (upgraded {} bare ratings, filled defaults on {} records)",
                report.entries,
                path.display(),
                report.upgraded_bare,
                report.filled_defaults
            );
        }
        Ok(store)
    }

    /// Parse a ratings document, running the legacy migration
    pub fn from_json_str(content: &str) -> serde_json::Result<(Self, MigrationReport)> {
        let stored: BTreeMap<ItemId, StoredRecord> = serde_json::from_str(content)?;
        Ok(Self::migrate(stored))
    }

    /// Upgrade every stored entry to a complete record
    fn migrate(stored: BTreeMap<ItemId, StoredRecord>) -> (Self, MigrationReport) {
        let mut report = MigrationReport {
            entries: stored.len(),
            ..Default::default()
        };

        let records = stored
            .into_iter()
            .map(|(id, entry)| {
                let record = match entry {
                    StoredRecord::Bare(rating) => {
                        report.upgraded_bare += 1;
                        RatingRecord {
                            path: String::new(),
                            rating,
                            compared: 0,
                            confidence: 0.0,
                        }
                    }
                    StoredRecord::Record(partial) => {
                        if partial.path.is_none()
                            || partial.rating.is_none()
                            || partial.compared.is_none()
                            || partial.confidence.is_none()
                        {
                            report.filled_defaults += 1;
                        }
                        RatingRecord {
                            path: partial.path.unwrap_or_default(),
                            rating: partial.rating.unwrap_or(DEFAULT_RATING),
                            compared: partial.compared.unwrap_or(0),
                            confidence: partial.confidence.unwrap_or(0.0),
                        }
                    }
                };
                (id, record)
            })
            .collect();

        (Self { records }, report)
    }

    /// Make sure every catalog item has a record
    ///
    /// New items get a default record; existing ones keep their rating
    /// history and get their path refreshed. Records for items missing from
    /// the catalog are left untouched.
    pub fn reconcile(&mut self, catalog: &[CatalogEntry]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for entry in catalog {
            let path = entry.path.to_string_lossy().into_owned();
            match self.records.get_mut(&entry.id) {
                Some(record) => {
                    record.path = path;
                    report.existing += 1;
                }
                None => {
                    self.records.insert(entry.id.clone(), RatingRecord::new(path));
                    report.added += 1;
                }
            }
        }
        report
    }

    /// Record that `winner` beat `loser`
    ///
    /// Both compared counts go up and ratings move per the Elo update. Both
    /// confidences are recomputed against the current record count, which
    /// includes records retained for items no longer in the catalog.
    /// Returns the new `(winner, loser)` ratings. Nothing changes on error.
    pub fn record_outcome(&mut self, winner: &str, loser: &str) -> Result<(f64, f64)> {
        if winner == loser {
            return Err(Error::BadRequest(format!(
                "item {} cannot be compared with itself",
                winner
            )));
        }
        let winner_rating = self.get(winner).ok_or_else(|| Error::NotFound(winner.to_string()))?.rating;
        let loser_rating = self.get(loser).ok_or_else(|| Error::NotFound(loser.to_string()))?.rating;

        let (new_winner, new_loser) = elo::apply(winner_rating, loser_rating);
        let total = self.records.len() as f64;

        for (id, rating) in [(winner, new_winner), (loser, new_loser)] {
            if let Some(record) = self.records.get_mut(id) {
                record.compared += 1;
                record.confidence = record.compared as f64 / total;
                record.rating = rating;
            }
        }
        Ok((new_winner, new_loser))
    }

    /// Write the full mapping to `path` (write-then-rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.records).map_err(|e| Error::persistence(path, e))
    }

    pub fn get(&self, id: &str) -> Option<&RatingRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Compared count of `id`, 0 for unknown items
    pub fn compared(&self, id: &str) -> u64 {
        self.records.get(id).map(|r| r.compared).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &RatingRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn abc_catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("A", "/img/A.png"),
            CatalogEntry::new("B", "/img/B.png"),
            CatalogEntry::new("C", "/img/C.png"),
        ]
    }

    #[test]
    fn test_bare_rating_is_upgraded() {
        let (store, report) = RatingStore::from_json_str(r#"{"old.png": 1350}"#).unwrap();

        assert_eq!(
            store.get("old.png").unwrap(),
            &RatingRecord {
                path: String::new(),
                rating: 1350.0,
                compared: 0,
                confidence: 0.0,
            }
        );
        assert_eq!(report.upgraded_bare, 1);
    }

    #[test]
    fn test_record_without_counts_gets_defaults() {
        let (store, report) =
            RatingStore::from_json_str(r#"{"x.jpg": {"path": "/p/x.jpg", "rating": 1250.5}}"#).unwrap();

        let record = store.get("x.jpg").unwrap();
        assert_eq!(record.path, "/p/x.jpg");
        assert_eq!(record.rating, 1250.5);
        assert_eq!(record.compared, 0);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(report.filled_defaults, 1);
        assert_eq!(report.upgraded_bare, 0);
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        assert!(RatingStore::from_json_str("[1, 2, 3]").is_err());
        assert!(RatingStore::from_json_str(r#"{"a": "high"}"#).is_err());
    }

    #[test]
    fn test_reconcile_adds_and_refreshes_but_never_purges() {
        let (mut store, _) = RatingStore::from_json_str(
            r#"{
                "A": {"path": "/old/A.png", "rating": 1300, "compared": 4, "confidence": 0.5},
                "gone.png": {"path": "/old/gone.png", "rating": 1100, "compared": 2, "confidence": 0.25}
            }"#,
        )
        .unwrap();

        let report = store.reconcile(&abc_catalog());

        assert_eq!(report, ReconcileReport { added: 2, existing: 1 });
        let a = store.get("A").unwrap();
        assert_eq!(a.path, "/img/A.png");
        assert_eq!(a.rating, 1300.0);
        assert_eq!(a.compared, 4);
        assert_eq!(store.get("B").unwrap(), &RatingRecord::new("/img/B.png"));
        assert_eq!(store.get("gone.png").unwrap().rating, 1100.0);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_scenario_a_beats_b() {
        let mut store = RatingStore::new();
        store.reconcile(&abc_catalog());

        let (w, l) = store.record_outcome("A", "B").unwrap();

        assert_eq!((w, l), (1216.0, 1184.0));
        let a = store.get("A").unwrap();
        let b = store.get("B").unwrap();
        let c = store.get("C").unwrap();
        assert_eq!((a.rating, a.compared), (1216.0, 1));
        assert_eq!((b.rating, b.compared), (1184.0, 1));
        assert_eq!((c.rating, c.compared), (1200.0, 0));
        assert_eq!(a.confidence, 1.0 / 3.0);
    }

    #[test]
    fn test_confidence_tracks_compared_over_total() {
        let mut store = RatingStore::new();
        store.reconcile(&abc_catalog());

        store.record_outcome("A", "B").unwrap();
        store.record_outcome("C", "A").unwrap();
        store.record_outcome("A", "C").unwrap();

        let total = store.len() as f64;
        for (_, record) in store.iter() {
            assert_eq!(record.confidence, record.compared as f64 / total);
        }
        assert_eq!(store.get("A").unwrap().compared, 3);
    }

    #[test]
    fn test_unknown_item_is_not_found_and_mutates_nothing() {
        let mut store = RatingStore::new();
        store.reconcile(&abc_catalog());
        let before = store.clone();

        assert!(matches!(store.record_outcome("A", "Z"), Err(Error::NotFound(id)) if id == "Z"));
        assert!(matches!(store.record_outcome("Z", "A"), Err(Error::NotFound(id)) if id == "Z"));
        assert_eq!(store, before);
    }

    #[test]
    fn test_self_comparison_rejected() {
        let mut store = RatingStore::new();
        store.reconcile(&abc_catalog());
        assert!(matches!(store.record_outcome("A", "A"), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ratings.json");

        let mut store = RatingStore::new();
        store.reconcile(&abc_catalog());
        store.record_outcome("B", "C").unwrap();
        store.save(&path).unwrap();

        let loaded = RatingStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        loaded.save(&path).unwrap();
        assert_eq!(RatingStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_fractional_ratings_survive_save_and_load_bit_for_bit() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ratings.json");
        let catalog: Vec<CatalogEntry> = (0..200)
            .map(|i| CatalogEntry::new(format!("i{}", i), format!("/img/i{}.png", i)))
            .collect();
        let mut store = RatingStore::new();
        store.reconcile(&catalog);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20_000 {
            let winner = rng.gen_range(0..catalog.len());
            let loser = rng.gen_range(0..catalog.len());
            if winner != loser {
                store.record_outcome(&catalog[winner].id, &catalog[loser].id).unwrap();
            }
        }

        for _ in 0..3 {
            store.save(&path).unwrap();
            let loaded = RatingStore::load(&path).unwrap();
            for (id, record) in store.iter() {
                let reloaded = loaded.get(id).unwrap();
                assert_eq!(reloaded.rating.to_bits(), record.rating.to_bits(), "rating of {}", id);
                assert_eq!(reloaded.confidence.to_bits(), record.confidence.to_bits(), "confidence of {}", id);
            }
            assert_eq!(loaded, store);
            store = loaded;
        }
    }

    #[test]
    fn test_missing_document_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = RatingStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_document_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ratings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(RatingStore::load(&path), Err(Error::Persistence { .. })));
    }
}
