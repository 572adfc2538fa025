//! Feature-gated `tracing` events.
//!
//! `trace_event!` forwards to `tracing::event!` when the `tracing` feature is enabled and
//! expands to nothing otherwise, so hot paths pay nothing in the default build.

macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            tracing::event!(tracing::Level::$level, $($arg)+);
        }
    };
}

pub(crate) use trace_event;
