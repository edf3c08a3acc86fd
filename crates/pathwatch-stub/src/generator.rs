//! Synthetic collapse generator.
//!
//! Records a made-up collapse every interval so a dashboard pointed at the
//! stub sees its push channel fire and its history grow. The sequence is
//! deterministic: glyphs and outcomes rotate, risk and Δψ follow a fixed
//! sawtooth.

use std::sync::Arc;
use std::time::Duration;

use pathwatch_types::CollapseResult;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::state::{AppState, CollapseReport};

/// Glyphs cycled through by the generator.
const GLYPHS: [&str; 4] = ["Ψ", "ΞΘ", "ΞΔ", "Φ"];

/// Build the `n`th synthetic collapse.
pub fn synthetic_collapse(n: u64) -> CollapseReport {
    let phase = u8::try_from(n % 10).unwrap_or(0);
    let step = f64::from(phase) / 10.0;
    let glyph = usize::try_from(n % 4)
        .ok()
        .and_then(|i| GLYPHS.get(i))
        .copied()
        .unwrap_or("Ψ");

    CollapseReport {
        glyph: glyph.to_owned(),
        result: if n % 3 == 2 {
            CollapseResult::Fail
        } else {
            CollapseResult::Success
        },
        risk_score: 0.1 + step * 0.6,
        mu: 0.5 + step * 0.3,
        phi: 0.9 - step * 0.4,
        j: step,
        delta: step * 0.25,
    }
}

/// Spawn the generator. It runs until the task is aborted.
pub fn spawn_generator(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        let mut n: u64 = 0;
        loop {
            timer.tick().await;
            let report = synthetic_collapse(n);
            let delivered = state.record_collapse(&report).await;
            debug!(n, glyph = %report.glyph, result = report.result.as_str(), delivered, "synthetic collapse");
            n = n.wrapping_add(1);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_rotates_glyphs_and_outcomes() {
        assert_eq!(synthetic_collapse(0).glyph, "Ψ");
        assert_eq!(synthetic_collapse(1).glyph, "ΞΘ");
        assert_eq!(synthetic_collapse(4).glyph, "Ψ");
        assert_eq!(synthetic_collapse(2).result, CollapseResult::Fail);
        assert_eq!(synthetic_collapse(3).result, CollapseResult::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn generator_announces_each_collapse() {
        let state = Arc::new(AppState::new());
        let mut rx = state.subscribe();
        let task = spawn_generator(Arc::clone(&state), Duration::from_secs(1));

        for _ in 0..3 {
            assert!(rx.recv().await.is_ok());
        }
        task.abort();
        assert_eq!(state.data.read().await.reflection.recent_collapses, 3);
    }
}
