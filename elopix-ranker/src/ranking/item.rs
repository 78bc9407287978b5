//! Item, pair and catalog types shared by the ranking core

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Item identity (file name or relative path, per the identity scheme)
pub type ItemId = String;

/// Rating every item starts from
pub const DEFAULT_RATING: f64 = 1200.0;

/// Persisted rating state of one item
///
/// Always fully populated; legacy documents are upgraded at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Last known path of the item (empty for migrated legacy entries)
    pub path: String,
    pub rating: f64,
    /// Comparisons this item took part in
    pub compared: u64,
    /// `compared / total items` as of the last recorded outcome
    pub confidence: f64,
}

impl RatingRecord {
    /// Fresh record for a newly discovered item
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rating: DEFAULT_RATING,
            compared: 0,
            confidence: 0.0,
        }
    }
}

/// One item found by the catalog scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: ItemId,
    pub path: PathBuf,
}

impl CatalogEntry {
    pub fn new(id: impl Into<ItemId>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Display side of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(format!("unknown side '{}' (expected left or right)", other)),
        }
    }
}

/// Two distinct items to compare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPair {
    pub pair_id: Uuid,
    pub left: ItemId,
    pub right: ItemId,
}

impl ComparisonPair {
    pub fn new(left: ItemId, right: ItemId) -> Self {
        Self {
            pair_id: Uuid::new_v4(),
            left,
            right,
        }
    }

    pub fn id(&self, side: Side) -> &ItemId {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.left == id || self.right == id
    }

    /// New pair (fresh pair_id) with `side` swapped for `replacement`
    pub fn with_replaced(&self, side: Side, replacement: ItemId) -> Self {
        match side {
            Side::Left => Self::new(replacement, self.right.clone()),
            Side::Right => Self::new(self.left.clone(), replacement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_fully_defaulted() {
        let record = RatingRecord::new("/photos/cat.png");
        assert_eq!(record.rating, 1200.0);
        assert_eq!(record.compared, 0);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.path, "/photos/cat.png");
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("LEFT".parse::<Side>().unwrap(), Side::Left);
        assert_eq!("right".parse::<Side>().unwrap(), Side::Right);
        assert!("middle".parse::<Side>().is_err());
        assert_eq!(Side::Left.other(), Side::Right);
    }

    #[test]
    fn test_with_replaced_keeps_other_side() {
        let pair = ComparisonPair::new("a".into(), "b".into());
        let replaced = pair.with_replaced(Side::Left, "c".into());

        assert_eq!(replaced.left, "c");
        assert_eq!(replaced.right, "b");
        assert_ne!(replaced.pair_id, pair.pair_id);
        assert!(pair.contains("a") && !replaced.contains("a"));
    }
}
