//! Email Fake
//!
//! TigerStyle: outbound email recorded in an in-memory outbox.
//!
//! Flow of one send:
//! 1. Validate the four required fields
//! 2. Run the fault policy (latency, failure, cancellation)
//! 3. Stamp the message with the clock's current time
//! 4. Append it to the outbox

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SimClock};
use crate::error::{FakeError, FakeResult};
use crate::fault::FaultPolicy;
use crate::matching::eq_ignore_case;
use crate::store::AppendLog;

// =============================================================================
// Types
// =============================================================================

/// A recorded email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    /// Clock time at which the send completed
    pub sent_at: DateTime<Utc>,
}

/// An email under construction; every field must be set before sending.
///
/// Empty strings are valid values, unset fields are not.
#[derive(Debug, Clone, Default)]
pub struct EmailDraft {
    from: Option<String>,
    to: Option<String>,
    subject: Option<String>,
    body: Option<String>,
}

impl EmailDraft {
    /// Start an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the recipient.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Set the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn into_fields(self) -> FakeResult<(String, String, String, String)> {
        let required = |name: &'static str, value: Option<String>| {
            value.ok_or_else(|| FakeError::invalid_argument(name, "is required"))
        };
        Ok((
            required("from", self.from)?,
            required("to", self.to)?,
            required("subject", self.subject)?,
            required("body", self.body)?,
        ))
    }
}

// =============================================================================
// EmailSender Trait
// =============================================================================

/// Contract of an outbound email integration.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send one message.
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        cancel: &CancellationToken,
    ) -> FakeResult<()>;
}

// =============================================================================
// SimEmail
// =============================================================================

/// In-memory email sender with an inspectable outbox.
///
/// Safe to share between tasks (`Arc<SimEmail>`); sends never need external
/// locking.
#[derive(Debug)]
pub struct SimEmail {
    outbox: AppendLog<EmailMessage>,
    fault: FaultPolicy,
    clock: Arc<dyn Clock>,
}

impl SimEmail {
    /// Create a sender using `clock` for timestamps and `fault` before each send.
    pub fn new(clock: Arc<dyn Clock>, fault: FaultPolicy) -> Self {
        Self {
            outbox: AppendLog::new(),
            fault,
            clock,
        }
    }

    /// Send a fully specified draft.
    ///
    /// # Errors
    /// `InvalidArgument` if a field is unset (checked before the fault
    /// policy runs), otherwise whatever the fault policy returns.
    pub async fn send_draft(&self, draft: EmailDraft, cancel: &CancellationToken) -> FakeResult<()> {
        let (from, to, subject, body) = draft.into_fields()?;

        self.fault.apply(cancel).await?;

        let message = EmailMessage {
            from,
            to,
            subject,
            body,
            sent_at: self.clock.now(),
        };
        tracing::trace!(to = %message.to, subject = %message.subject, "email recorded");
        self.outbox.append(message);
        Ok(())
    }

    /// Every recorded message in send order.
    pub fn outbox(&self) -> Vec<EmailMessage> {
        self.outbox.snapshot()
    }

    /// Number of recorded messages.
    pub fn sent_count(&self) -> usize {
        self.outbox.len()
    }

    /// Messages whose subject equals `subject`, ignoring case.
    pub fn find_by_subject(&self, subject: &str) -> Vec<EmailMessage> {
        self.outbox.find(|m| eq_ignore_case(&m.subject, subject))
    }

    /// Messages addressed to `to`, ignoring case.
    pub fn find_by_recipient(&self, to: &str) -> Vec<EmailMessage> {
        self.outbox.find(|m| eq_ignore_case(&m.to, to))
    }

    /// Messages sent from `from`, ignoring case.
    pub fn find_by_sender(&self, from: &str) -> Vec<EmailMessage> {
        self.outbox.find(|m| eq_ignore_case(&m.from, from))
    }

    /// Empty the outbox.
    pub fn clear(&self) {
        let removed = self.outbox.clear();
        tracing::trace!(removed = removed, "outbox cleared");
    }
}

impl Default for SimEmail {
    fn default() -> Self {
        Self::new(Arc::new(SimClock::new()), FaultPolicy::none())
    }
}

#[async_trait]
impl EmailSender for SimEmail {
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        cancel: &CancellationToken,
    ) -> FakeResult<()> {
        let draft = EmailDraft::new()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body);
        self.send_draft(draft, cancel).await
    }
}

// =============================================================================
// Tests
// =============================================================================
