//! Fakes Demo - runs a short scenario against one fake and prints a JSON
//! summary of what it recorded.
//!
//! Fault settings come from `.env` / `FAKES_*` variables and can be
//! overridden with flags:
//!
//! ```bash
//! fakes-demo --failure-probability 0.3 --seed 7 email --count 10
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use sim_fakes::{
    BlobStorage, Clock, EmailSender, FakeEnvironment, FakesConfig, HttpHandler, HttpRequest,
    HttpResponse,
};
use tokio_util::sync::CancellationToken;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "fakes-demo";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Operations per scenario when `--count` is not given
const SCENARIO_COUNT_DEFAULT: &str = "3";

/// Simulated time between two operations of a scenario
const SCENARIO_STEP_MS: u64 = 1_000;

/// Bucket used by the storage scenario
const DEMO_BUCKET: &str = "demo";

/// Base URL used by the HTTP scenario
const DEMO_BASE_URL: &str = "https://api.demo.test";

// =============================================================================
// CLI
// =============================================================================

/// Exercise the in-process fakes with configurable fault injection
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Run a scenario against the in-process integration fakes")]
#[command(version)]
struct Cli {
    /// Seed for reproducible fault draws (overrides FAKES_SEED)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Failure probability in [0, 1] (overrides FAKES_FAILURE_PROBABILITY)
    #[arg(long, global = true)]
    failure_probability: Option<f64>,

    /// Latency per operation in ms (overrides FAKES_LATENCY_MS)
    #[arg(long, global = true)]
    latency_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send emails and print the outbox
    Email {
        /// Number of emails to send
        #[arg(long, default_value = SCENARIO_COUNT_DEFAULT)]
        count: usize,
    },
    /// Upload objects and print the bucket listing
    Storage {
        /// Number of objects to upload
        #[arg(long, default_value = SCENARIO_COUNT_DEFAULT)]
        count: usize,
    },
    /// Dispatch requests against a small rule set and print the responses
    Http {
        /// Rounds of requests to dispatch
        #[arg(long, default_value = SCENARIO_COUNT_DEFAULT)]
        count: usize,
    },
}

impl Cli {
    fn config(&self) -> anyhow::Result<FakesConfig> {
        let mut config = FakesConfig::from_env()?;
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(probability) = self.failure_probability {
            config = config.with_failure_probability(probability);
        }
        if let Some(ms) = self.latency_ms {
            config = config.with_latency(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("{} v{}", APP_NAME, APP_VERSION);

    let config = cli.config()?;
    let env = FakeEnvironment::from_config(&config)?;
    tracing::info!(
        seed = ?config.seed,
        failure_probability = config.failure_probability,
        "Fake environment ready"
    );

    // Ctrl-C cancels whatever operation is in flight
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let summary = match cli.command {
        Command::Email { count } => run_email(&env, count, &cancel).await,
        Command::Storage { count } => run_storage(&env, count, &cancel).await,
        Command::Http { count } => run_http(&env, count, &cancel).await,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// =============================================================================
// Scenarios
// =============================================================================

async fn run_email(env: &FakeEnvironment, count: usize, cancel: &CancellationToken) -> serde_json::Value {
    let mut errors = Vec::new();

    for _ in 0..count {
        let id = env.ids.generate_id();
        let outcome = env
            .email
            .send(
                "noreply@demo.test",
                &format!("user-{id}@demo.test"),
                &format!("Welcome #{id}"),
                "Thanks for signing up.",
                cancel,
            )
            .await;
        if let Err(err) = outcome {
            tracing::warn!(id = %id, error = %err, "Send failed");
            errors.push(err.to_string());
        }
        env.clock.advance_ms(SCENARIO_STEP_MS);
    }

    json!({
        "scenario": "email",
        "attempted": count,
        "sent": env.email.sent_count(),
        "errors": errors,
        "outbox": env.email.outbox(),
    })
}

async fn run_storage(env: &FakeEnvironment, count: usize, cancel: &CancellationToken) -> serde_json::Value {
    let mut errors = Vec::new();

    for _ in 0..count {
        let id = env.ids.generate_id();
        let key = format!("reports/{id}.json");
        let body = json!({ "id": id, "at": env.clock.now().to_rfc3339() }).to_string();
        let outcome = env
            .storage
            .upload_bytes(DEMO_BUCKET, &key, body, Some("application/json"), cancel)
            .await;
        if let Err(err) = outcome {
            tracing::warn!(key = %key, error = %err, "Upload failed");
            errors.push(err.to_string());
        }
        env.clock.advance_ms(SCENARIO_STEP_MS);
    }

    // Listing goes through the fault policy too; report it rather than abort.
    let listed = match env.storage.list_keys(DEMO_BUCKET, Some("reports/"), cancel).await {
        Ok(keys) => keys,
        Err(err) => {
            errors.push(err.to_string());
            env.storage.get_all_blobs(DEMO_BUCKET).into_keys().collect()
        }
    };

    json!({
        "scenario": "storage",
        "attempted": count,
        "stored": env.storage.total_object_count(),
        "total_size_bytes": env.storage.total_size_in_bytes(),
        "errors": errors,
        "keys": listed,
    })
}

async fn run_http(env: &FakeEnvironment, count: usize, cancel: &CancellationToken) -> serde_json::Value {
    let status_url = format!("{DEMO_BASE_URL}/status");
    let broken_url = format!("{DEMO_BASE_URL}/broken");
    let missing_url = format!("{DEMO_BASE_URL}/missing");

    env.http
        .when_get(status_url.clone(), r#"{"status":"ok"}"#)
        .when_url(broken_url.clone(), |_| anyhow::bail!("upstream unavailable"));

    let mut responses = Vec::new();
    for _ in 0..count {
        for url in [&status_url, &broken_url, &missing_url] {
            let request = HttpRequest::get(url.as_str());
            let entry = match env.http.dispatch(request, cancel).await {
                Ok(response) => describe(url, &response),
                Err(err) => json!({ "url": url, "error": err.to_string() }),
            };
            responses.push(entry);
        }
    }
    env.http.close();

    json!({
        "scenario": "http",
        "answered": env.http.request_count(),
        "responses": responses,
    })
}

fn describe(url: &str, response: &HttpResponse) -> serde_json::Value {
    json!({
        "url": url,
        "status": response.status.as_u16(),
        "content_type": response.content_type(),
        "body": response.body_string(),
    })
}
