//! TigerStyle Constants
//!
//! Every limit and default used by the fakes lives here, named
//! `THING_UNIT_MAX` / `THING_DEFAULT` so the unit is part of the name.

// =============================================================================
// Time
// =============================================================================

/// Milliseconds per second
pub const TIME_MS_PER_SEC: u64 = 1_000;

/// Largest single clock advance accepted by `SimClock` (one year)
pub const CLOCK_ADVANCE_MS_MAX: u64 = 365 * 24 * 60 * 60 * TIME_MS_PER_SEC;

/// Slice length of the blocking latency wait; bounds how late a
/// cancellation is noticed by `FaultPolicy::apply_blocking`
pub const FAULT_BLOCKING_WAIT_SLICE_MS: u64 = 1;

// =============================================================================
// Identifiers
// =============================================================================

/// Minimum rendered width of generated ids (zero padded)
pub const ID_WIDTH_DIGITS: usize = 6;

// =============================================================================
// Storage
// =============================================================================

/// Content type recorded when an upload does not name one
pub const CONTENT_TYPE_DEFAULT: &str = "application/octet-stream";

// =============================================================================
// HTTP
// =============================================================================

/// Content type of synthesized JSON responses
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type of synthesized error responses
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Body of the response returned when no rule matches
pub const HTTP_NO_MATCH_BODY: &str = "No matching rule found for request";

/// Prefix of the body returned when a response factory fails
pub const HTTP_FACTORY_ERROR_PREFIX: &str = "Response factory failed: ";

// =============================================================================
// Fault Policy
// =============================================================================

/// Message of the generic fault error
pub const FAULT_DEFAULT_MESSAGE: &str = "fault policy triggered a failure";

// =============================================================================
// Environment
// =============================================================================

/// Seed for the fault policy random source
pub const ENV_SEED: &str = "FAKES_SEED";

/// Failure probability in `[0, 1]`
pub const ENV_FAILURE_PROBABILITY: &str = "FAKES_FAILURE_PROBABILITY";

/// Fixed latency in milliseconds
pub const ENV_LATENCY_MS: &str = "FAKES_LATENCY_MS";

/// Clock start time (RFC 3339)
pub const ENV_START_TIME: &str = "FAKES_START_TIME";

/// Clock start time when none is configured (2024-01-01T00:00:00Z)
pub const START_TIME_DEFAULT_MS: i64 = 1_704_067_200_000;
