//! Outbound notifications for approval-workflow transitions.
//!
//! This crate owns the side-effect channel of the approval state machine:
//! - **Events** (`events`) - what happened (`requested`, `granted`, `rejected`)
//! - **Mailer** (`mailer`) - delivery transport (HTTP mail gateway, noop, recording)
//! - **Dispatch** (`dispatch`) - retry policy and fire-and-forget task spawning
//!
//! Dispatch is strictly best-effort with respect to the state transition
//! that triggered it: by the time an event reaches this crate the storage
//! commit has already happened, so delivery failures are logged and
//! swallowed, never propagated back to the approve/reject caller.

pub mod dispatch;
pub mod events;
pub mod mailer;

pub use dispatch::{NotificationDispatcher, RetryPolicy};
pub use events::NotificationEvent;
pub use mailer::{HttpMailer, MailMessage, Mailer, MailerError, NoopMailer, RecordingMailer};
