//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the given verbosity flags.
pub fn filter_directive(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "stagecue=warn";
    }
    match verbose {
        0 => "stagecue=info",
        1 => "stagecue=debug",
        _ => "stagecue=trace",
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the flags.
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init_logging(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(quiet, verbose)));

    // A second call (tests, embedding) keeps the first subscriber
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}
