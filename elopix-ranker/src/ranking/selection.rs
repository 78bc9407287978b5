//! Pair selection policy
//!
//! Pairs are drawn from the least-compared eligible items so that every
//! item's confidence rises at roughly the same pace. Sampling within a pool
//! rather than always taking the two least-compared items keeps pairings
//! varied.

use super::blacklist::Blacklist;
use super::item::{CatalogEntry, ComparisonPair, ItemId, Side};
use super::store::RatingStore;
use crate::error::{Error, Result};
use rand::seq::index;
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    pool_size: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_POOL_SIZE)
    }
}

impl SelectionPolicy {
    pub const DEFAULT_POOL_SIZE: usize = 20;

    /// Policy sampling from the `pool_size` least-compared items (minimum 2)
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(2),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Choose the next two items to compare
    ///
    /// Returned order is randomized; neither id is blacklisted and the two
    /// are always distinct.
    pub fn select_pair<R: Rng + ?Sized>(
        &self,
        items: &[CatalogEntry],
        blacklist: &Blacklist,
        store: &RatingStore,
        rng: &mut R,
    ) -> Result<(ItemId, ItemId)> {
        let candidates = eligible(items, blacklist, &[]);
        if candidates.len() < 2 {
            return Err(Error::InsufficientCandidates {
                eligible: candidates.len(),
            });
        }

        let pool = self.least_compared(candidates, store);
        let picked = index::sample(rng, pool.len(), 2);
        let (mut a, mut b) = (pool[picked.index(0)].clone(), pool[picked.index(1)].clone());
        if rng.gen_bool(0.5) {
            std::mem::swap(&mut a, &mut b);
        }
        Ok((a, b))
    }

    /// Choose a replacement for one side of `displayed`
    ///
    /// Both displayed items are excluded; the replacement comes from the
    /// least-compared pool of what remains.
    pub fn replace_one<R: Rng + ?Sized>(
        &self,
        displayed: &ComparisonPair,
        side: Side,
        items: &[CatalogEntry],
        blacklist: &Blacklist,
        store: &RatingStore,
        rng: &mut R,
    ) -> Result<ItemId> {
        let candidates = eligible(items, blacklist, &[&displayed.left, &displayed.right]);
        if candidates.is_empty() {
            tracing::debug!(
                "No replacement available for {} side of pair {}",
                side,
                displayed.pair_id
            );
            return Err(Error::InsufficientCandidates { eligible: 0 });
        }

        let pool = self.least_compared(candidates, store);
        let choice = rng.gen_range(0..pool.len());
        Ok(pool[choice].clone())
    }

    /// Stable sort by compared count, truncated to the pool size
    fn least_compared<'a>(&self, mut candidates: Vec<&'a ItemId>, store: &RatingStore) -> Vec<&'a ItemId> {
        candidates.sort_by_key(|id| store.compared(id));
        candidates.truncate(self.pool_size);
        candidates
    }
}

/// Catalog ids that are not blacklisted or excluded, first occurrence wins
fn eligible<'a>(items: &'a [CatalogEntry], blacklist: &Blacklist, exclude: &[&ItemId]) -> Vec<&'a ItemId> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|entry| &entry.id)
        .filter(|id| !blacklist.contains(id) && !exclude.contains(id))
        .filter(|id| seen.insert(*id))
        .collect()
}
