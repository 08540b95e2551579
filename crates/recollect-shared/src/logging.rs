use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the process-wide tracing subscriber.
///
/// Starts from `RUST_LOG` (or `<crate_name>=info` if unset), then folds in
/// every `LOG_LEVEL_<component_id>` environment variable as a
/// `<component_id>=<level>` directive, so individual pipeline components can
/// have their verbosity raised independently without touching `RUST_LOG`.
pub fn init_tracing(crate_name: &str) {
  let mut filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(format!("{crate_name}=info")));

  for (key, value) in env::vars() {
    if let Some(component) = key.strip_prefix("LOG_LEVEL_") {
      let directive = format!("{}={value}", component.to_lowercase());
      if let Ok(directive) = directive.parse() {
        filter = filter.add_directive(directive);
      }
    }
  }

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer())
    .init();
}
