//! Delivery-status core for transactional email.
//!
//! Inbound, [`Engine::handle_event`] folds provider webhooks into one
//! converged [`EmailMessage`] per provider message id, keeps an
//! [`EmailEvent`] ledger and maintains the suppression list. Outbound,
//! [`Dispatcher`] sends email through an [`EmailTransport`] with bounded
//! retries.

pub use dispatch::{
    DispatchError, Dispatcher, EmailTransport, OutboundEmail, RetryPolicy, TransportError,
};
pub use error::EngineError;
pub use events::EmailEvent;
pub use messages::{EmailMessage, StatusMergeOutcome};
pub use ops::{AppliedEvent, Engine, EngineBuilder, ReconcileOutcome};
pub use resend::ResendTransport;
pub use status::EmailStatus;
pub use suppressions::EmailSuppression;
pub use webhook::{IgnoreReason, WebhookPayload};

mod dispatch;
mod error;
mod events;
mod messages;
mod ops;
pub mod resend;
mod status;
mod suppressions;
mod util;
mod webhook;

type ResultEngine<T> = Result<T, EngineError>;
