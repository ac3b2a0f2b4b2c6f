use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, interval_at},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::run::GenerationRun;

pub const ELAPSED_TICK: Duration = Duration::from_secs(1);
pub const PROGRESS_TICK: Duration = Duration::from_millis(500);
pub const PROGRESS_CAP: f64 = 95.0;
const MAX_PROGRESS_STEP: f64 = 2.0;

/// Cosmetic progress for one run: an elapsed-seconds counter and a slowly
/// creeping percentage. Neither says anything about the real request.
///
/// Both timers live exactly as long as this value. They also stop writing
/// on their own once the run they belong to is terminal or replaced.
pub struct ProgressEstimator {
    stop: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ProgressEstimator {
    pub fn start(run_id: Uuid, status: Arc<watch::Sender<GenerationRun>>) -> Self {
        let stop = CancellationToken::new();
        let tasks = vec![
            spawn_ticker(ELAPSED_TICK, run_id, Arc::clone(&status), stop.clone(), |run| {
                run.elapsed_seconds += 1;
            }),
            spawn_ticker(PROGRESS_TICK, run_id, status, stop.clone(), |run| {
                run.progress = (run.progress + next_step()).min(PROGRESS_CAP);
            }),
        ];
        tracing::trace!(%run_id, "Progress timers started");
        Self { stop, tasks }
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ProgressEstimator {
    fn drop(&mut self) {
        self.stop.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn next_step() -> f64 {
    rand::rng().random_range(0.0..MAX_PROGRESS_STEP)
}

fn spawn_ticker(
    period: Duration,
    run_id: Uuid,
    status: Arc<watch::Sender<GenerationRun>>,
    stop: CancellationToken,
    update: fn(&mut GenerationRun),
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let mut owned = true;
                    status.send_if_modified(|run| {
                        if run.id != run_id || run.state.is_terminal() {
                            owned = false;
                            return false;
                        }
                        update(run);
                        true
                    });
                    if !owned {
                        break;
                    }
                }
            }
        }
    })
}
