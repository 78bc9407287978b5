//! Ranking core
//!
//! Rating records, the Elo update, pair selection, the blacklist and their
//! persistence. Nothing in here knows about HTTP or the prefetch pipeline.

pub mod blacklist;
pub mod elo;
pub mod item;
pub mod persistence;
pub mod selection;
pub mod state;
pub mod store;

pub use blacklist::Blacklist;
pub use item::{CatalogEntry, ComparisonPair, ItemId, RatingRecord, Side, DEFAULT_RATING};
pub use persistence::{blacklist_item, PersistenceController, SaveSummary};
pub use selection::SelectionPolicy;
pub use state::{Progress, RankedItem, RankingState, SharedRanking};
pub use store::RatingStore;
