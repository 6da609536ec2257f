//! Fault Policy - Latency and Failure Injection
//!
//! TigerStyle: every fake calls [`FaultPolicy::apply`] before it touches its
//! store. The policy runs the same fixed sequence on every call:
//!
//! ```text
//! cancelled already? ──yes──> Err(Cancelled)
//!        │ no
//! fixed latency > 0? ──yes──> wait (token fires ──> Err(Cancelled))
//!        │
//! probability > 0?   ──yes──> draw in [0, 1); draw < p ──> Err(fault)
//!        │
//!       Ok(())
//! ```
//!
//! A policy is an immutable value. Clone it (or wrap it in an `Arc`) to
//! share one fault scenario between several fakes.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;

use crate::constants::FAULT_BLOCKING_WAIT_SLICE_MS;
use crate::error::{FakeError, FakeResult};

// =============================================================================
// Random Source
// =============================================================================

/// Process-wide generator used when a policy is not given its own source.
static SHARED_RNG: Lazy<Mutex<ChaCha8Rng>> = Lazy::new(|| Mutex::new(ChaCha8Rng::from_entropy()));

/// Produces an error for an injected failure.
pub type ErrorFactory = Arc<dyn Fn() -> anyhow::Error + Send + Sync>;

/// Where a policy draws its uniform `[0, 1)` values from.
#[derive(Clone, Default)]
pub enum RandomSource {
    /// The process-wide generator.
    #[default]
    Shared,
    /// A private seeded generator, reproducible across runs.
    Seeded(Arc<Mutex<ChaCha8Rng>>),
    /// Caller-supplied draws.
    Custom(Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl RandomSource {
    /// The process-wide generator.
    pub fn shared() -> Self {
        Self::Shared
    }

    /// A ChaCha8 generator seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))))
    }

    /// Draws supplied by `f`, which must return values in `[0, 1)`.
    pub fn from_fn(f: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Draw one uniform value in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        match self {
            Self::Shared => SHARED_RNG.lock().gen(),
            Self::Seeded(rng) => rng.lock().gen(),
            Self::Custom(f) => f(),
        }
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("Shared"),
            Self::Seeded(_) => f.write_str("Seeded"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

// =============================================================================
// Fault Policy
// =============================================================================

/// Configurable latency and probabilistic-failure injector.
#[derive(Clone, Default)]
pub struct FaultPolicy {
    failure_probability: f64,
    fixed_latency: Option<Duration>,
    error_factory: Option<ErrorFactory>,
    random_source: RandomSource,
}

impl FaultPolicy {
    /// A policy that never delays and never fails.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A policy that fails every call with the generic fault error.
    #[must_use]
    pub fn always_fail() -> Self {
        Self {
            failure_probability: 1.0,
            ..Self::default()
        }
    }

    /// A policy that fails every call with the error built by `factory`.
    pub fn always_fail_with(factory: impl Fn() -> anyhow::Error + Send + Sync + 'static) -> Self {
        Self {
            failure_probability: 1.0,
            error_factory: Some(Arc::new(factory)),
            ..Self::default()
        }
    }

    /// A policy that delays every call by `latency` and never fails.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            fixed_latency: Some(latency),
            ..Self::default()
        }
    }

    /// A policy that fails each call with probability `probability`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `probability` is outside `[0, 1]`.
    pub fn with_failure_probability(probability: f64) -> FakeResult<Self> {
        Self::builder().failure_probability(probability).build()
    }

    /// Start composing a policy.
    #[must_use]
    pub fn builder() -> FaultPolicyBuilder {
        FaultPolicyBuilder::default()
    }

    /// Probability in `[0, 1]` that a call fails.
    pub fn failure_probability(&self) -> f64 {
        self.failure_probability
    }

    /// Delay applied to every call, if any.
    pub fn fixed_latency(&self) -> Option<Duration> {
        self.fixed_latency
    }

    /// Run the policy, suspending the task for the configured latency.
    ///
    /// # Errors
    /// `Cancelled` if `cancel` fires before or during the wait; the fault
    /// error if the random draw falls under the failure probability.
    pub async fn apply(&self, cancel: &CancellationToken) -> FakeResult<()> {
        if cancel.is_cancelled() {
            return Err(FakeError::Cancelled);
        }

        if let Some(latency) = self.active_latency() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(latency_ms = millis(latency), "fault policy wait cancelled");
                    return Err(FakeError::Cancelled);
                }
                () = tokio::time::sleep(latency) => {}
            }
        }

        self.roll()
    }

    /// Run the policy, blocking the current thread for the configured latency.
    ///
    /// The wait is sliced so that cancellation is noticed within
    /// `FAULT_BLOCKING_WAIT_SLICE_MS`.
    ///
    /// # Errors
    /// Same as [`FaultPolicy::apply`].
    pub fn apply_blocking(&self, cancel: &CancellationToken) -> FakeResult<()> {
        if cancel.is_cancelled() {
            return Err(FakeError::Cancelled);
        }

        if let Some(latency) = self.active_latency() {
            let slice = Duration::from_millis(FAULT_BLOCKING_WAIT_SLICE_MS);
            // `None` when the deadline is past what `Instant` can represent:
            // only cancellation ends that wait.
            let deadline = Instant::now().checked_add(latency);
            loop {
                if cancel.is_cancelled() {
                    tracing::debug!(latency_ms = millis(latency), "fault policy wait cancelled");
                    return Err(FakeError::Cancelled);
                }
                let Some(deadline) = deadline else {
                    std::thread::sleep(slice);
                    continue;
                };
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                std::thread::sleep(slice.min(deadline - now));
            }
        }

        self.roll()
    }

    fn active_latency(&self) -> Option<Duration> {
        self.fixed_latency.filter(|latency| !latency.is_zero())
    }

    fn roll(&self) -> FakeResult<()> {
        if self.failure_probability <= 0.0 {
            return Ok(());
        }

        let draw = self.random_source.next_f64();
        if draw < self.failure_probability {
            tracing::debug!(
                draw = draw,
                failure_probability = self.failure_probability,
                "fault policy injected a failure"
            );
            return Err(match &self.error_factory {
                Some(factory) => FakeError::Injected(factory()),
                None => FakeError::FaultTriggered,
            });
        }

        Ok(())
    }
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Debug for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultPolicy")
            .field("failure_probability", &self.failure_probability)
            .field("fixed_latency", &self.fixed_latency)
            .field("error_factory", &self.error_factory.is_some())
            .field("random_source", &self.random_source)
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`FaultPolicy`]; validation happens in [`build`](Self::build).
#[derive(Default)]
pub struct FaultPolicyBuilder {
    failure_probability: f64,
    fixed_latency: Option<Duration>,
    error_factory: Option<ErrorFactory>,
    random_source: RandomSource,
}

impl FaultPolicyBuilder {
    /// Probability in `[0, 1]` that a call fails.
    #[must_use]
    pub fn failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability;
        self
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.fixed_latency = Some(latency);
        self
    }

    /// Error returned by injected failures.
    #[must_use]
    pub fn error(mut self, factory: impl Fn() -> anyhow::Error + Send + Sync + 'static) -> Self {
        self.error_factory = Some(Arc::new(factory));
        self
    }

    /// Draw from a private generator seeded with `seed`.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.random_source = RandomSource::seeded(seed);
        self
    }

    /// Draw from `source`.
    #[must_use]
    pub fn random_source(mut self, source: RandomSource) -> Self {
        self.random_source = source;
        self
    }

    /// Validate and build the policy.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the failure probability is outside
    /// `[0, 1]` or NaN.
    pub fn build(self) -> FakeResult<FaultPolicy> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(FakeError::invalid_argument(
                "failure_probability",
                format!("must be within [0, 1], got {}", self.failure_probability),
            ));
        }

        Ok(FaultPolicy {
            failure_probability: self.failure_probability,
            fixed_latency: self.fixed_latency,
            error_factory: self.error_factory,
            random_source: self.random_source,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_none_never_fails() {
        let policy = FaultPolicy::none();
        let cancel = CancellationToken::new();
        for _ in 0..1_000 {
            assert_ok!(policy.apply(&cancel).await);
        }
    }

    #[tokio::test]
    async fn test_zero_probability_never_draws() {
        let policy = FaultPolicy::builder()
            .random_source(RandomSource::from_fn(|| panic!("must not draw")))
            .build()
            .unwrap();
        assert_ok!(policy.apply(&CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_always_fail() {
        let policy = FaultPolicy::always_fail();
        let cancel = CancellationToken::new();
        for _ in 0..1_000 {
            let err = policy.apply(&cancel).await.unwrap_err();
            assert!(matches!(err, FakeError::FaultTriggered));
        }
    }

    #[tokio::test]
    async fn test_error_factory() {
        let policy = FaultPolicy::always_fail_with(|| anyhow::anyhow!("bucket throttled"));
        let err = policy.apply(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_fault());
        assert_eq!(err.to_string(), "bucket throttled");
    }

    #[test]
    fn test_probability_validation() {
        assert_err!(FaultPolicy::with_failure_probability(-0.01));
        assert_err!(FaultPolicy::with_failure_probability(1.01));
        assert_err!(FaultPolicy::with_failure_probability(f64::NAN));
        assert_ok!(FaultPolicy::with_failure_probability(0.0));
        assert_ok!(FaultPolicy::with_failure_probability(1.0));

        let err = FaultPolicy::with_failure_probability(2.0).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_draw_strictly_less_than_probability() {
        let at_threshold = FaultPolicy::builder()
            .failure_probability(0.5)
            .random_source(RandomSource::from_fn(|| 0.5))
            .build()
            .unwrap();
        assert_ok!(at_threshold.apply_blocking(&CancellationToken::new()));

        let below = FaultPolicy::builder()
            .failure_probability(0.5)
            .random_source(RandomSource::from_fn(|| 0.4999))
            .build()
            .unwrap();
        assert_err!(below.apply_blocking(&CancellationToken::new()));
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let outcomes = |seed| {
            let policy = FaultPolicy::builder()
                .failure_probability(0.3)
                .seed(seed)
                .build()
                .unwrap();
            let cancel = CancellationToken::new();
            (0..64)
                .map(|_| policy.apply_blocking(&cancel).is_ok())
                .collect::<Vec<_>>()
        };

        assert_eq!(outcomes(42), outcomes(42));
        let failures = outcomes(42).iter().filter(|ok| !**ok).count();
        assert!(failures > 0 && failures < 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let policy = FaultPolicy::with_latency(Duration::from_millis(200));
        let start = tokio::time::Instant::now();

        assert_ok!(policy.apply(&CancellationToken::new()).await);

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_precedes_failure() {
        let policy = FaultPolicy::builder()
            .failure_probability(1.0)
            .latency(Duration::from_millis(50))
            .build()
            .unwrap();
        let start = tokio::time::Instant::now();

        let err = policy.apply(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, FakeError::FaultTriggered));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let policy = FaultPolicy::builder()
            .failure_probability(1.0)
            .latency(Duration::from_secs(10))
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();

        let err = policy.apply(&cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = FaultPolicy::none().apply(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_blocking_wait_past_instant_range_is_cancellable() {
        let policy = FaultPolicy::with_latency(Duration::MAX);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });

        let result = policy.apply_blocking(&cancel);
        canceller.join().unwrap();

        assert!(matches!(result, Err(FakeError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_wait_past_instant_range_is_cancellable() {
        let policy = FaultPolicy::with_latency(Duration::MAX);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        assert!(policy.apply(&cancel).await.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_blocking_latency() {
        let policy = FaultPolicy::with_latency(Duration::from_millis(30));
        let start = Instant::now();

        assert_ok!(policy.apply_blocking(&CancellationToken::new()));

        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_blocking_cancel_during_wait() {
        let policy = FaultPolicy::with_latency(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });
        let start = Instant::now();

        let err = policy.apply_blocking(&cancel).unwrap_err();

        canceller.join().unwrap();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_zero_latency_is_ignored() {
        let policy = FaultPolicy::with_latency(Duration::ZERO);
        assert_eq!(policy.active_latency(), None);
        assert_ok!(policy.apply_blocking(&CancellationToken::new()));
    }
}
