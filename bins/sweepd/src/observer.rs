//! Logging observer: forwards controller events to `tracing`.

use sweeper::{SweepEvent, SweepObserver};

pub struct TracingObserver;

impl SweepObserver for TracingObserver {
    fn on_event(&self, event: &SweepEvent) {
        match event {
            SweepEvent::PhaseChanged { phase } => {
                tracing::debug!(?phase, "phase changed");
            }
            SweepEvent::BalanceUpdated {
                layer,
                address,
                amount,
            } => {
                tracing::info!(?layer, %address, amount, "balance");
            }
            SweepEvent::ActionSubmitted {
                action,
                amount,
                nonce,
            } => {
                tracing::info!(action = action.as_str(), amount, nonce, "action submitted");
            }
            SweepEvent::ActionFailed { action, error } => {
                tracing::warn!(action = action.as_str(), %error, "action failed");
            }
            SweepEvent::CycleFailed {
                error,
                attempt,
                backoff,
            } => {
                tracing::warn!(%error, attempt, ?backoff, "cycle failed, backing off");
            }
            _ => {}
        }
    }
}
