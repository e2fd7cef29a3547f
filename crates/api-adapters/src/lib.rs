//! # api-adapters
//!
//! HTTP surface of Sanctuary. The axum implementation lives behind the
//! `web-axum` feature; [`metrics`] is framework-agnostic.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/health` | storage reachability |
//! | GET | `/metrics` | Prometheus text exposition |
//! | POST | `/api/posts` | submit a post for moderation |
//! | GET | `/api/posts` | approved timeline (`limit`, `offset`, `cursor`, `cursorId`, `since`) |
//! | GET | `/api/posts/{post_id}/reactions` | counts plus the caller's own state |
//! | POST | `/api/posts/{post_id}/reactions` | toggle one reaction |

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use error::ApiError;
#[cfg(feature = "web-axum")]
pub use router::router;
#[cfg(feature = "web-axum")]
pub use state::AppState;
