//! One generation session: request building, credit reservation, the
//! backend call, response recovery and the result store, with progress
//! timers running alongside.
//!
//! Runs are serialized. Every run that debits and does not succeed gets its
//! credits back exactly once, whichever way it ends.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    assets::Asset,
    config::GeneratorConfig,
    error::{Result, StoryforgeError},
    ledger::{CreditLedger, Reservation},
    normalize::normalize,
    progress::ProgressEstimator,
    request::build_request,
    run::{GenerationRun, RunState},
    store::{ResultStore, StoredResult},
    transport::{Transport, send_cancellable},
};

pub struct GenerationSession {
    config: GeneratorConfig,
    transport: Arc<dyn Transport>,
    ledger: Arc<dyn CreditLedger>,
    store: ResultStore,
    status: Arc<watch::Sender<GenerationRun>>,
    active: Mutex<Option<(Uuid, CancellationToken)>>,
}

impl GenerationSession {
    pub fn new(
        config: GeneratorConfig,
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn CreditLedger>,
    ) -> Self {
        let (status, _) = watch::channel(GenerationRun::idle());
        Self {
            config,
            transport,
            ledger,
            store: ResultStore::new(),
            status: Arc::new(status),
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationRun> {
        self.status.subscribe()
    }

    pub fn current_run(&self) -> GenerationRun {
        self.status.borrow().clone()
    }

    /// Run one generation to completion. The result store is only touched
    /// on success.
    pub async fn start_generation(
        &self,
        topic: &str,
        style_label: &str,
        assets: Vec<Asset>,
        cancel: CancellationToken,
    ) -> Result<StoredResult> {
        let run = GenerationRun::begin();
        let run_id = run.id;
        let mut claimed = false;
        self.status.send_if_modified(|current| {
            if current.state.is_active() {
                return false;
            }
            *current = run;
            claimed = true;
            true
        });
        if !claimed {
            return Err(StoryforgeError::RunInProgress);
        }

        let token = cancel.child_token();
        *self.active.lock().expect("active run poisoned") = Some((run_id, token.clone()));
        tracing::info!(%run_id, "Generation run started");

        let scope = RunScope {
            session: self,
            run_id,
            charged: AtomicU64::new(0),
            settled: false,
        };
        let outcome = self
            .execute(run_id, topic, style_label, assets, &token, &scope.charged)
            .await;
        scope.settle(&outcome);
        outcome
    }

    async fn execute(
        &self,
        run_id: Uuid,
        topic: &str,
        style_label: &str,
        assets: Vec<Asset>,
        cancel: &CancellationToken,
        charged: &AtomicU64,
    ) -> Result<StoredResult> {
        let request = build_request(topic, style_label, assets)?;
        if cancel.is_cancelled() {
            return Err(StoryforgeError::Cancelled);
        }
        let payload = request.to_payload(&self.config);

        let reservation = Reservation::acquire(Arc::clone(&self.ledger), self.config.credit_cost)?;
        charged.store(self.config.credit_cost, Ordering::SeqCst);
        self.transition(run_id, RunState::AwaitingResponse, None, 0);
        let progress = ProgressEstimator::start(run_id, Arc::clone(&self.status));

        let text = send_cancellable(self.transport.as_ref(), &payload, cancel).await?;
        let scripts = normalize(&text)?;
        if cancel.is_cancelled() {
            return Err(StoryforgeError::Cancelled);
        }

        progress.stop();
        let stored = self.store.publish(run_id, scripts, request.assets);
        reservation.commit();
        Ok(stored)
    }

    /// Cancel the run with this id if it is still in flight.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        let active = self.active.lock().expect("active run poisoned");
        match active.as_ref() {
            Some((id, token)) if *id == run_id => {
                token.cancel();
                tracing::info!(%run_id, "Cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Forget results and return to Idle.
    pub fn clear(&self) -> Result<()> {
        let mut cleared = false;
        self.status.send_if_modified(|run| {
            if run.state.is_active() {
                return false;
            }
            self.store.clear();
            *run = GenerationRun::idle();
            cleared = true;
            true
        });
        if !cleared {
            return Err(StoryforgeError::RunInProgress);
        }
        Ok(())
    }

    fn transition(&self, run_id: Uuid, next: RunState, error: Option<String>, refunded: u64) {
        self.status.send_if_modified(|run| {
            if run.id != run_id || !run.advance(next) {
                return false;
            }
            run.error = error;
            run.refunded_credits = refunded;
            true
        });
    }

    fn release(&self, run_id: Uuid) {
        let mut active = self.active.lock().expect("active run poisoned");
        if matches!(active.as_ref(), Some((id, _)) if *id == run_id) {
            active.take();
        }
    }
}

/// Holds the session for one run. Settles the run state on every exit,
/// including the caller dropping the future mid-flight.
struct RunScope<'a> {
    session: &'a GenerationSession,
    run_id: Uuid,
    /// Credits debited so far; refunded by the reservation unless committed.
    charged: AtomicU64,
    settled: bool,
}

impl RunScope<'_> {
    fn settle(mut self, outcome: &Result<StoredResult>) {
        let refunded = match outcome {
            Ok(_) => 0,
            Err(_) => self.charged.load(Ordering::SeqCst),
        };
        let (state, error) = match outcome {
            Ok(_) => (RunState::Succeeded, None),
            Err(StoryforgeError::Cancelled) => {
                (RunState::Cancelled, Some(StoryforgeError::Cancelled.user_message()))
            }
            Err(e) => (RunState::Failed, Some(e.user_message())),
        };
        match outcome {
            Ok(stored) => tracing::info!(
                run_id = %self.run_id,
                scripts = stored.scripts.len(),
                "Generation run succeeded"
            ),
            Err(e) => tracing::warn!(
                run_id = %self.run_id,
                state = ?state,
                error = %e,
                refunded,
                "Generation run ended without result"
            ),
        }
        self.session.transition(self.run_id, state, error, refunded);
        self.settled = true;
    }
}

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(run_id = %self.run_id, "Generation run abandoned");
            self.session.transition(
                self.run_id,
                RunState::Cancelled,
                Some(StoryforgeError::Cancelled.user_message()),
                self.charged.load(Ordering::SeqCst),
            );
        }
        self.session.release(self.run_id);
    }
}
