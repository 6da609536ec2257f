//! Sim Fakes - In-Process Integration Fakes
//!
//! TigerStyle stand-ins for email, blob storage and HTTP, for tests that
//! must run without the network.
//!
//! # Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! 1. Every fake exposes the same contract as the real integration
//! 2. Every operation runs a fault policy first (latency, failure, cancellation)
//! 3. Time comes from an injectable clock, never from the system
//! 4. Recorded state is inspectable after the fact
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    FakeEnvironment                       │
//! ├───────────────┬──────────────────┬──────────────────────┤
//! │  SimEmail     │  SimBlobStorage  │  SimHttp             │
//! │  (outbox)     │  (bucket → key)  │  (last-match rules)  │
//! ├───────────────┴──────────────────┴──────────────────────┤
//! │  FaultPolicy         │  SimClock   │  IdGenerator        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::time::Duration;
//! use sim_fakes::{FakeEnvironment, FaultPolicy, SimClock};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let env = FakeEnvironment::new(
//!     SimClock::new(),
//!     FaultPolicy::with_latency(Duration::from_millis(5)),
//! );
//! env.http.when_get("https://api.test/user", r#"{"id": 1}"#);
//!
//! let response = env
//!     .http
//!     .get("https://api.test/user", &CancellationToken::new())
//!     .await
//!     .unwrap();
//! assert_eq!(response.status, http::StatusCode::OK);
//! # }
//! ```
//!
//! Replay a failing run with the same fault draws:
//! ```bash
//! FAKES_SEED=12345 FAKES_FAILURE_PROBABILITY=0.1 cargo test
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assertions;
pub mod clock;
pub mod config;
pub mod constants;
pub mod email;
pub mod environment;
pub mod error;
pub mod fault;
pub mod id;
pub mod rules;
pub mod storage;
pub mod store;

mod matching;

// Re-export common types
pub use clock::{Clock, SimClock, SystemClock};
pub use config::{ConfigError, FakesConfig};
pub use email::{EmailDraft, EmailMessage, EmailSender, SimEmail};
pub use environment::FakeEnvironment;
pub use error::{FakeError, FakeResult};
pub use fault::{ErrorFactory, FaultPolicy, FaultPolicyBuilder, RandomSource};
pub use id::DeterministicIdGenerator;
pub use rules::{HttpHandler, HttpRequest, HttpResponse, HttpRule, SimHttp};
pub use storage::{BlobObject, BlobReader, BlobStorage, SimBlobStorage};
