//! Tracing setup for hosts embedding onboardkit.
//!
//! The SDK only emits `tracing` events. A host without a subscriber of its
//! own can call [`init_tracing`] once at startup; later calls return `false`.
//!
//! Filtering comes from `ONBOARDKIT_LOG`, then `RUST_LOG`. With neither set,
//! the onboardkit crates log at the requested level and everything else in
//! the process at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding an SDK-specific filter.
pub const LOG_ENV: &str = "ONBOARDKIT_LOG";

const SDK_TARGETS: [&str; 2] = ["onboardkit_core", "onboardkit_store"];

/// Filter directives used when no environment filter is set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    SDK_TARGETS
        .iter()
        .fold(String::from("warn"), |mut directives, target| {
            directives.push_str(&format!(",{target}={level}"));
            directives
        })
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber.
///
/// `json` selects newline-delimited JSON output with span context, for log
/// shipping from long-running hosts. Returns `false` when a global
/// subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let json_layer = json.then(|| fmt::layer().json().with_current_span(true));
    let text_layer = (!json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok()
}
