use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber on stderr; stdout is reserved for rendered
/// output of the command-line tools.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "energy_ingest=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
