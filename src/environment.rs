//! Fake Environment
//!
//! One simulated clock, one fault policy and one id generator wired into
//! all three fakes, so a scenario can advance time and inject failures for
//! every integration at once.

use std::sync::Arc;

use crate::clock::SimClock;
use crate::config::FakesConfig;
use crate::email::SimEmail;
use crate::error::FakeResult;
use crate::fault::FaultPolicy;
use crate::id::DeterministicIdGenerator;
use crate::rules::SimHttp;
use crate::storage::SimBlobStorage;

/// The fakes of one test, sharing their collaborators.
#[derive(Debug)]
pub struct FakeEnvironment {
    /// Shared simulated clock
    pub clock: SimClock,
    /// Policy applied by every fake
    pub fault: FaultPolicy,
    /// Ids for test data
    pub ids: Arc<DeterministicIdGenerator>,
    /// Email fake
    pub email: Arc<SimEmail>,
    /// Storage fake
    pub storage: Arc<SimBlobStorage>,
    /// HTTP fake
    pub http: Arc<SimHttp>,
}

impl FakeEnvironment {
    /// Wire `clock` and `fault` into fresh fakes.
    pub fn new(clock: SimClock, fault: FaultPolicy) -> Self {
        let shared_clock = Arc::new(clock.clone());
        Self {
            email: Arc::new(SimEmail::new(shared_clock.clone(), fault.clone())),
            storage: Arc::new(SimBlobStorage::new(shared_clock, fault.clone())),
            http: Arc::new(SimHttp::new(fault.clone())),
            ids: Arc::new(DeterministicIdGenerator::new()),
            clock,
            fault,
        }
    }

    /// Build from a config.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the config's failure probability is
    /// outside `[0, 1]`.
    pub fn from_config(config: &FakesConfig) -> FakeResult<Self> {
        Ok(Self::new(config.clock(), config.fault_policy()?))
    }

    /// Fakes that never delay or fail, with the default start time.
    pub fn reliable() -> Self {
        Self::new(FakesConfig::default().clock(), FaultPolicy::none())
    }

    /// Forget everything recorded by the fakes and restart the id sequence.
    /// HTTP rules and the clock are left as they are.
    pub fn reset(&self) {
        self.email.clear();
        self.storage.clear();
        self.http.clear_requests();
        self.ids.reset();
        tracing::debug!("fake environment reset");
    }
}

impl Default for FakeEnvironment {
    fn default() -> Self {
        Self::reliable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailSender;
    use crate::storage::BlobStorage;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_fakes_share_one_clock() {
        let env = FakeEnvironment::reliable();
        let cancel = CancellationToken::new();

        env.email.send("a", "b", "c", "d", &cancel).await.unwrap();
        env.clock.advance(Duration::from_secs(5));
        env.storage
            .upload_bytes("bkt", "k", "v", None, &cancel)
            .await
            .unwrap();

        let sent_at = env.email.outbox()[0].sent_at;
        let uploaded_at = env.storage.get_blob("bkt", "k").unwrap().uploaded_at;
        assert_eq!(uploaded_at - sent_at, chrono::Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_fault_reaches_every_fake() {
        let env = FakeEnvironment::new(SimClock::new(), FaultPolicy::always_fail());
        let cancel = CancellationToken::new();

        assert!(env.email.send("a", "b", "c", "d", &cancel).await.unwrap_err().is_fault());
        assert!(env.storage.exists("b", "k", &cancel).await.unwrap_err().is_fault());
        assert!(env.http.get("https://x.test", &cancel).await.unwrap_err().is_fault());
    }

    #[tokio::test]
    async fn test_reset() {
        let env = FakeEnvironment::default();
        let cancel = CancellationToken::new();
        env.http.when_get("https://x.test", "{}");
        env.email.send("a", "b", "c", "d", &cancel).await.unwrap();
        env.http.get("https://x.test", &cancel).await.unwrap();
        env.ids.generate_id();

        env.reset();

        assert_eq!(env.email.sent_count(), 0);
        assert_eq!(env.http.request_count(), 0);
        assert_eq!(env.http.rule_count(), 1);
        assert_eq!(env.ids.generate_id(), "000001");
    }

    #[test]
    fn test_from_config_rejects_bad_probability() {
        let config = FakesConfig::default().with_failure_probability(-0.1);
        assert!(FakeEnvironment::from_config(&config).is_err());
    }
}
