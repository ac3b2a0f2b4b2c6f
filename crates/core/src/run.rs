use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Building,
    AwaitingResponse,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Cancelled
        )
    }

    /// A run occupies the session from the moment it starts building until
    /// it reaches a terminal state.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Building | RunState::AwaitingResponse)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, AwaitingResponse)
                | (Building, Failed)
                | (Building, Cancelled)
                | (AwaitingResponse, Succeeded)
                | (AwaitingResponse, Failed)
                | (AwaitingResponse, Cancelled)
        )
    }
}

/// Per-attempt record, replaced when the next run starts.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub id: Uuid,
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub elapsed_seconds: u64,
    pub error: Option<String>,
    /// Credits given back when the run ended without a result. Zero when
    /// the run never got as far as the debit.
    pub refunded_credits: u64,
}

impl Default for GenerationRun {
    fn default() -> Self {
        Self::idle()
    }
}

impl GenerationRun {
    pub fn idle() -> Self {
        Self {
            id: Uuid::nil(),
            state: RunState::Idle,
            started_at: None,
            progress: 0.0,
            elapsed_seconds: 0,
            error: None,
            refunded_credits: 0,
        }
    }

    pub fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Building,
            started_at: Some(Utc::now()),
            ..Self::idle()
        }
    }

    pub fn percent(&self) -> u8 {
        self.progress.clamp(0.0, 100.0).round() as u8
    }

    /// Apply a transition; illegal ones are ignored and reported as `false`.
    pub fn advance(&mut self, next: RunState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(run_id = %self.id, from = ?self.state, to = ?next, "Ignored illegal run transition");
            return false;
        }
        self.state = next;
        if next == RunState::Succeeded {
            self.progress = 100.0;
        }
        true
    }
}
