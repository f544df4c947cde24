// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// Periodically releases assignments whose response window has elapsed.
/// Each work order is also resolved lazily on its next operation, so this
/// only keeps listings current.
pub async fn start_deadline_sweep_job(app_state: Arc<AppState>, every_secs: u64) {
    let mut interval = interval(Duration::from_secs(every_secs));

    loop {
        interval.tick().await;

        tracing::debug!("Running assignment deadline sweep at {}", Utc::now());

        match app_state.work_order_service.sweep_expired_assignments().await {
            Ok(0) => {}
            Ok(released) => tracing::info!("Deadline sweep released {} work orders", released),
            Err(e) => tracing::error!("Deadline sweep failed: {}", e),
        }
    }
}
