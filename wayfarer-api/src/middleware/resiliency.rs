use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    /// One probe request is let through after the cooldown.
    HalfOpen,
}

/// Guards calls to the payment provider so a dead provider fails fast.
pub struct CircuitBreaker {
    pub name: String,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    failure_threshold: u32,
    reset_timeout: Duration,
    last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: u32, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            failure_threshold: threshold.max(1),
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// True if a request may go through. Once the cooldown has passed, the
    /// first caller becomes the probe and everyone else is refused until it
    /// records its outcome.
    pub async fn check(&self) -> bool {
        if *self.state.read().await == CircuitState::Closed {
            return true;
        }

        let mut state = self.state.write().await;
        match *state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let expired = self
                    .last_failure
                    .read()
                    .await
                    .map_or(true, |at| at.elapsed() >= self.reset_timeout);
                if expired {
                    *state = CircuitState::HalfOpen;
                    tracing::info!(circuit = %self.name, "Circuit breaker half-open");
                }
                expired
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            tracing::info!(circuit = %self.name, "Circuit breaker recovered");
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!(circuit = %self.name, failures = count, "Circuit breaker tripped");
        }
    }
}

/// Wraps the checkout endpoint; provider failures surface as 5xx responses.
pub async fn payment_circuit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !req.uri().path().ends_with("/checkout-session") {
        return next.run(req).await;
    }

    let cb = &state.payment_cb;
    if !cb.check().await {
        return AppError::Unavailable("Payment provider is unavailable, try again later".to_string()).into_response();
    }

    let response = next.run(req).await;
    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }
    response
}
