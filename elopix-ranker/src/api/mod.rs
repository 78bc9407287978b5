//! HTTP API handlers for elopix-ranker
//!
//! REST endpoints drive the session; SSE pushes what it presents.

pub mod health;
pub mod pairs;
pub mod rankings;
pub mod sse;
pub mod ui;

pub use health::health_routes;
pub use pairs::pair_routes;
pub use rankings::ranking_routes;
pub use sse::event_stream;
pub use ui::ui_routes;
