//! Logger construction.
//!
//! Every database takes its `slog::Logger` from [`DataBaseOptions`]; this
//! module builds the two roots callers usually want. The terminal drain is
//! only compiled with the `obs_slog` feature.
//!
//! [`DataBaseOptions`]: crate::database::DataBaseOptions
use slog::{o, Discard, Logger};

/// Root logger that drops every record. Default for all option structs.
pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}

/// Asynchronous terminal logger at `level` and above.
#[cfg(feature = "obs_slog")]
pub fn terminal_logger(level: slog::Level) -> Logger {
    use slog::Drain;

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().filter_level(level).fuse();
    Logger::root(drain, o!("crate" => env!("CARGO_PKG_NAME")))
}
