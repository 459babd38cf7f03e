//! Insights - logging for havoc.
//!
//! One fmt subscriber on stderr, level picked by [`Verbosity`]. Workers are
//! forked after this runs, so they inherit it and their lines carry the
//! `worker` span (kind, instance) opened in [`crate::worker::enter`].
//!
//! ```rust,ignore
//! havoc::init_logging(Verbosity::Verbose);
//! ```

use crate::config::Verbosity;

/// Install the global subscriber. Returns false if one was already set,
/// which is harmless (tests call this more than once).
pub fn init_logging(verbosity: Verbosity) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(verbosity.level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
