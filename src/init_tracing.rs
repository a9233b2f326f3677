use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    let default = concat!(env!("CARGO_CRATE_NAME"), "=debug")
        .parse()
        .expect("hard-coded default directive should be valid");

    Registry::default()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default)
                .from_env_lossy(),
        )
        .with(
            // stdout belongs to the console session
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .event_format(tracing_subscriber::fmt::format::Format::default().compact()),
        )
        .init();
}
