/// Logging initialization for the embedding shell.
///
/// Desktop builds log to stderr via `tracing-subscriber::fmt` with an env
/// filter, plus a file at `<data_dir>/finch.log` so logs stay retrievable
/// when the shell runs detached from a terminal.
///
/// Called once at the start of `FfiContext::new()`, before anything else;
/// `try_init` keeps repeated construction (tests) harmless.
pub fn init_logging(data_dir: &str) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "finch_core=debug,info".into());

    let log_path = std::path::Path::new(data_dir).join("finch.log");
    let _ = std::fs::create_dir_all(data_dir);
    let file_layer = if let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
}
