use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Installs the global subscriber. `RUST_LOG` wins over `default_directive`.
/// Calling this twice keeps the first subscriber.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let tree = HierarchicalLayer::new(2)
        .with_writer(std::io::stderr)
        .with_indent_lines(true)
        .with_targets(true)
        .with_bracketed_fields(true);
    let _ = Registry::default().with(filter).with(tree).try_init();
}
