use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicU64, Ordering},
};

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

use super::InitError;
use crate::transport::{Connector, Transport};

type Attempt = JoinHandle<Result<Arc<dyn Transport>, InitError>>;

#[derive(Default)]
struct State {
    /// Attempt in flight. It runs as its own task, so a caller giving up on
    /// its deadline leaves it running for the next caller to pick up.
    pending: Option<Attempt>,
    failure: Option<Failure>,
}

/// Outcome of the most recent failed initialization attempt.
struct Failure {
    attempt: u64,
    error: InitError,
}

/// Transport session built on first use and kept for the life of the client.
///
/// Once a session exists it is handed out without locking. Until then callers
/// serialize on `state`: exactly one attempt runs at a time, and callers that
/// were already waiting when it failed receive that same error instead of
/// starting another attempt. A caller arriving after the failure retries.
pub(crate) struct LazySession {
    ready: OnceLock<Arc<dyn Transport>>,
    state: Mutex<State>,
    completed: AtomicU64,
}

impl LazySession {
    pub(crate) fn new() -> Self {
        Self {
            ready: OnceLock::new(),
            state: Mutex::default(),
            completed: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.ready.get().is_some()
    }

    pub(crate) async fn get_or_connect(
        &self,
        connector: &Arc<dyn Connector>,
    ) -> Result<Arc<dyn Transport>, InitError> {
        if let Some(transport) = self.ready.get() {
            return Ok(transport.clone());
        }

        let observed = self.completed.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if let Some(transport) = self.ready.get() {
            return Ok(transport.clone());
        }
        if let Some(last) = state.failure.as_ref() {
            if last.attempt > observed {
                debug!("Sharing the outcome of a concurrent initialization attempt");
                return Err(last.error.clone());
            }
        }

        let attempt = self.completed.load(Ordering::Acquire) + 1;
        let pending = state.pending.get_or_insert_with(|| {
            debug!(attempt, "Starting transport session initialization");
            let connector = connector.clone();
            tokio::spawn(async move { connector.connect().await })
        });

        // Cancellation here keeps the handle in `state`
        let outcome = match pending.await {
            Ok(outcome) => outcome,
            Err(join) => Err(InitError::Interrupted(join.to_string())),
        };
        state.pending = None;
        self.completed.store(attempt, Ordering::Release);

        match outcome {
            Ok(transport) => {
                let transport = self.ready.get_or_init(|| transport).clone();
                state.failure = None;
                debug!(attempt, "Transport session initialized");
                Ok(transport)
            }
            Err(error) => {
                warn!(attempt, %error, "Transport session initialization failed");
                state.failure = Some(Failure {
                    attempt,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }
}
