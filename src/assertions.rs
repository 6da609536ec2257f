//! Fluent test assertions over the fakes' recorded state.
//!
//! ```rust
//! # async fn demo() {
//! use sim_fakes::assertions::assert_outbox;
//! use sim_fakes::{EmailSender, SimEmail};
//! use tokio_util::sync::CancellationToken;
//!
//! let email = SimEmail::default();
//! email
//!     .send("shop@x.test", "ana@x.test", "Receipt", "Thanks", &CancellationToken::new())
//!     .await
//!     .unwrap();
//!
//! assert_outbox(&email).has_count(1).has_sent_to("ANA@x.test");
//! # }
//! ```
//!
//! Every check panics with the recorded state on failure.

use crate::email::SimEmail;
use crate::storage::SimBlobStorage;

/// Start asserting on `email`'s outbox.
pub fn assert_outbox(email: &SimEmail) -> OutboxAssert<'_> {
    OutboxAssert { email }
}

/// Start asserting on `storage`'s objects.
pub fn assert_storage(storage: &SimBlobStorage) -> StorageAssert<'_> {
    StorageAssert { storage }
}

// =============================================================================
// OutboxAssert
// =============================================================================

/// Checks over a [`SimEmail`] outbox.
#[derive(Debug, Clone, Copy)]
pub struct OutboxAssert<'a> {
    email: &'a SimEmail,
}

impl<'a> OutboxAssert<'a> {
    /// Exactly `expected` messages were sent.
    #[track_caller]
    pub fn has_count(self, expected: usize) -> Self {
        let actual = self.email.sent_count();
        assert_eq!(
            actual,
            expected,
            "expected {expected} sent message(s), outbox holds {actual}: {:#?}",
            self.email.outbox()
        );
        self
    }

    /// Nothing was sent.
    #[track_caller]
    pub fn is_empty(self) -> Self {
        self.has_count(0)
    }

    /// At least one message went to `to` (case-insensitive).
    #[track_caller]
    pub fn has_sent_to(self, to: &str) -> Self {
        assert!(
            !self.email.find_by_recipient(to).is_empty(),
            "no message sent to {to:?}; recipients: {:?}",
            self.recipients()
        );
        self
    }

    /// No message went to `to` (case-insensitive).
    #[track_caller]
    pub fn has_not_sent_to(self, to: &str) -> Self {
        let matches = self.email.find_by_recipient(to);
        assert!(matches.is_empty(), "unexpected message(s) to {to:?}: {matches:#?}");
        self
    }

    /// At least one message carries `subject` (case-insensitive).
    #[track_caller]
    pub fn has_subject(self, subject: &str) -> Self {
        assert!(
            !self.email.find_by_subject(subject).is_empty(),
            "no message with subject {subject:?}; subjects: {:?}",
            self.email
                .outbox()
                .into_iter()
                .map(|m| m.subject)
                .collect::<Vec<_>>()
        );
        self
    }

    /// The most recent message went to `to` (case-insensitive).
    #[track_caller]
    pub fn last_sent_to(self, to: &str) -> Self {
        let recipients = self.recipients();
        let last = recipients.last();
        assert!(
            last.is_some_and(|last| crate::matching::eq_ignore_case(last, to)),
            "expected last message to go to {to:?}, got {last:?}"
        );
        self
    }

    fn recipients(&self) -> Vec<String> {
        self.email.outbox().into_iter().map(|m| m.to).collect()
    }
}

// =============================================================================
// StorageAssert
// =============================================================================

/// Checks over [`SimBlobStorage`] contents.
#[derive(Debug, Clone, Copy)]
pub struct StorageAssert<'a> {
    storage: &'a SimBlobStorage,
}

impl<'a> StorageAssert<'a> {
    /// `bucket`/`key` holds an object.
    #[track_caller]
    pub fn contains(self, bucket: &str, key: &str) -> Self {
        assert!(
            self.storage.get_blob(bucket, key).is_some(),
            "no object at {bucket}/{key}; keys in bucket: {:?}",
            self.storage.get_all_blobs(bucket).into_keys().collect::<Vec<_>>()
        );
        self
    }

    /// `bucket`/`key` holds nothing.
    #[track_caller]
    pub fn does_not_contain(self, bucket: &str, key: &str) -> Self {
        assert!(
            self.storage.get_blob(bucket, key).is_none(),
            "unexpected object at {bucket}/{key}"
        );
        self
    }

    /// `bucket`/`key` holds exactly `content`.
    #[track_caller]
    pub fn has_content(self, bucket: &str, key: &str, content: impl AsRef<[u8]>) -> Self {
        let expected = content.as_ref();
        match self.storage.get_blob(bucket, key) {
            Some(blob) => assert_eq!(
                blob.content.as_ref(),
                expected,
                "content mismatch at {bucket}/{key}"
            ),
            None => panic!("no object at {bucket}/{key}"),
        }
        self
    }

    /// `bucket`/`key` was stored with `content_type`.
    #[track_caller]
    pub fn has_content_type(self, bucket: &str, key: &str, content_type: &str) -> Self {
        match self.storage.get_blob(bucket, key) {
            Some(blob) => assert_eq!(
                blob.content_type, content_type,
                "content type mismatch at {bucket}/{key}"
            ),
            None => panic!("no object at {bucket}/{key}"),
        }
        self
    }

    /// Exactly `expected` objects exist across all buckets.
    #[track_caller]
    pub fn has_object_count(self, expected: usize) -> Self {
        let actual = self.storage.total_object_count();
        assert_eq!(
            actual, expected,
            "expected {expected} object(s), found {actual}"
        );
        self
    }

    /// Objects total exactly `expected` bytes.
    #[track_caller]
    pub fn has_total_size(self, expected: u64) -> Self {
        let actual = self.storage.total_size_in_bytes();
        assert_eq!(actual, expected, "expected {expected} byte(s), found {actual}");
        self
    }
}
