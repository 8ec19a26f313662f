use is_terminal::IsTerminal as _;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "engine_worker=info";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter. Interactive sessions get a
/// hierarchical tree of spans, anything else gets one line per event.
pub fn setup_tracing() -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let interactive = std::io::stderr().is_terminal();
    let tree_layer = interactive.then(|| {
        tracing_tree::HierarchicalLayer::new(2)
            .with_writer(std::io::stderr)
            .with_targets(true)
            .with_bracketed_fields(true)
    });
    let fmt_layer = (!interactive).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tree_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
