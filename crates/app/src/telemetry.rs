//! Tracing setup for the terminal runner.
//!
//! - `QUIZ_LOG` controls the filter (e.g. "debug" or "info,quiz_core=debug").
//! - `QUIZ_LOG_FORMAT` selects "pretty" (default) or "json".
//!
//! Logs go to stderr so they never interleave with the quiz on stdout.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUIZ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match std::env::var("QUIZ_LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
