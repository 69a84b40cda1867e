//! Tick Scheduler
//!
//! Drives `SessionRuntime::tick` at a fixed rate while the session is
//! playing. The loop watches the runtime's phase: entering `playing` starts
//! a fresh interval, leaving it drops the interval, so no tick runs outside
//! a round.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use crate::game::state::Phase;
use crate::network::hooks::SessionHooks;
use crate::network::session::SessionRuntime;

/// Interval between ticks at `tick_rate` Hz.
pub fn tick_period(tick_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64)
}

/// Run the tick scheduler until shutdown or until the runtime is dropped.
pub async fn run_tick_loop<H: SessionHooks>(
    runtime: Arc<Mutex<SessionRuntime<H>>>,
    mut phase_rx: watch::Receiver<Phase>,
    tick_rate: u32,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = tick_period(tick_rate);

    loop {
        if *phase_rx.borrow_and_update() != Phase::Playing {
            tokio::select! {
                changed = phase_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
                _ = shutdown.recv() => return,
            }
        }

        debug!(?period, "Tick loop started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;

                    let mut rt = runtime.lock().await;
                    rt.tick(dt);
                    if rt.phase() != Phase::Playing {
                        break;
                    }
                }
                changed = phase_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *phase_rx.borrow_and_update() != Phase::Playing {
                        break;
                    }
                }
                _ = shutdown.recv() => return,
            }
        }

        debug!("Tick loop stopped");
    }
}

/// Spawn the tick scheduler as a tokio task.
pub fn spawn_tick_loop<H: SessionHooks>(
    runtime: Arc<Mutex<SessionRuntime<H>>>,
    phase_rx: watch::Receiver<Phase>,
    tick_rate: u32,
    shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_tick_loop(runtime, phase_rx, tick_rate, shutdown))
}
