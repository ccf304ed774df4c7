//! Structured logging for learning runs.
//!
//! Logs always go to stderr so stdout stays a clean JSON payload. Human
//! output uses the `tracing-subscriber` fmt layer; `jsonl` uses its JSON
//! formatter with the enclosing `learn` span attached to each record.

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, LogContext, Stage};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber for `config`.
///
/// Invalid `RUST_LOG` directives fall back to the configured level. Only
/// the first call installs anything; later calls return quietly.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.filter_directives()).unwrap_or_else(|_| {
        let fallback = config.clone().with_level(config.level);
        EnvFilter::new(fallback.filter_directives())
    });

    let output: BoxedLayer = match (config.format, config.timestamps) {
        (LogFormat::Jsonl, _) => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        (LogFormat::Human, with_time) => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if with_time {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
    };

    if tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
}

/// Short random identifier correlating every event of one run.
pub fn generate_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &id[..12])
}

/// Emit a `tracing` event stamped with the run id and stage.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::EXTRACT_FINISHED, Stage::Extract,
///     "statistics extracted", trajectories = 1000);
/// ```
#[macro_export]
macro_rules! log_event {
    (@emit $level:ident, $ctx:expr, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::$level!(
            event = $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, INFO, $($rest:tt)*) => {
        $crate::log_event!(@emit info, $ctx, $($rest)*)
    };
    ($ctx:expr, DEBUG, $($rest:tt)*) => {
        $crate::log_event!(@emit debug, $ctx, $($rest)*)
    };
    ($ctx:expr, WARN, $($rest:tt)*) => {
        $crate::log_event!(@emit warn, $ctx, $($rest)*)
    };
}
