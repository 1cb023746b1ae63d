//! Tracing subscriber setup.

const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install a compact stderr subscriber. `filter` falls back to `info` with
/// sqlx statement logging kept quiet. Safe to call more than once.
pub fn init_tracing(filter: Option<&str>) {
  let directive = filter
    .map(|f| format!("{},sqlx=warn", f))
    .unwrap_or_else(|| DEFAULT_FILTER.to_string());

  let env_filter = tracing_subscriber::EnvFilter::try_new(&directive)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

  let installed = tracing_subscriber::fmt()
    .compact()
    .with_writer(std::io::stderr)
    .with_ansi(false)
    .with_target(false)
    .with_env_filter(env_filter)
    .try_init()
    .is_ok();

  if installed {
    tracing::info!("wellness_log: log filter: {}", directive);
  }
}
