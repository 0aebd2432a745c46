//! Tracing subscriber setup for the simulator binary.
//!
//! Logs go to stderr so that stdout stays free for the protocol when the
//! simulator serves stdin/stdout. `RUST_LOG` overrides the default level.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "vfd_sim=debug,info"
    } else {
        "info"
    }
}

/// Build the filter: `RUST_LOG` when set and valid, else the default.
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: bool, json: bool) {
    let layer = if json {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(verbose)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(layer)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(verbose, json, "tracing initialised");
    }
}
