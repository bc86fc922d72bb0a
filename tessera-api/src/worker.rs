use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use tessera_core::SeatStatus;
use tessera_shared::models::events::SeatStatusChangedEvent;

use crate::state::AppState;

/// Periodically makes lapsed holds durable so stored status stays close to
/// what readers already see. Reads never depend on it.
pub async fn start_expiry_worker(state: AppState, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Expiry worker started, sweeping every {:?}", every);

    loop {
        ticker.tick().await;
        sweep_once(&state).await;
    }
}

/// One pass; returns how many seats went back to available.
pub async fn sweep_once(state: &AppState) -> usize {
    match state.coordinator.expire_stale().await {
        Ok(released) => {
            if !released.is_empty() {
                info!("Released {} lapsed seats: {:?}", released.len(), released);
                state.announce(
                    released
                        .iter()
                        .map(|id| SeatStatusChangedEvent::new(*id, SeatStatus::Available.as_str(), None))
                        .collect(),
                );
            }
            released.len()
        }
        Err(e) => {
            error!("Expiry sweep failed: {}", e);
            0
        }
    }
}
