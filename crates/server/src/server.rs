use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};

use crate::{health, webhook};
use engine::Engine;

/// Deadline for reconciling one webhook delivery.
pub const DEFAULT_WEBHOOK_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub webhook_deadline: Duration,
}

impl ServerState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            webhook_deadline: DEFAULT_WEBHOOK_DEADLINE,
        }
    }

    #[must_use]
    pub fn webhook_deadline(mut self, deadline: Duration) -> Self {
        self.webhook_deadline = deadline;
        self
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health::get))
        .route("/webhooks/resend", post(webhook::resend))
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}
