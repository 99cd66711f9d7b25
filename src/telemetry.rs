use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// JSON logs on stderr so that stdout stays free for table output
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,figment=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}
