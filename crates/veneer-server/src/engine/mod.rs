//! Request evaluation engine: route compilation and the per-request pipeline
//! with its supporting machinery.

pub mod auth;
pub mod compile;
pub mod condition;
pub mod context;
pub mod fetch;
pub mod filter;
pub mod mock;
pub mod params;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod template;

use std::time::Duration;

/// Artificial response delay. At most one delay applies per request, owned by
/// the chosen response source; bounded by configuration validation.
pub(crate) async fn apply_delay(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
