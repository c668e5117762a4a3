use ingest_core::{Config, LogFormat};
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the level implied by `--debug`.
pub fn init_tracing(config: &Config) {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.default_log_filter().into())
    };

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .init();
        }
        LogFormat::Pretty => {
            let console_fmt = tracing_subscriber::fmt::layer()
                .event_format(Format::default().compact().with_target(false));
            tracing_subscriber::registry()
                .with(filter())
                .with(console_fmt)
                .init();
        }
    }
}
