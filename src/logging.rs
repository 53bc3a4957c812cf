use anyhow::{Context, Result};
use log::LevelFilter;

/// Environment variable naming an extra log file
pub const LOG_FILE_ENV: &str = "PHOTO_REPORT_LOG_FILE";

/// Install the global logger.
///
/// Stdout carries the MCP transport, so every line goes to stderr. When
/// `PHOTO_REPORT_LOG_FILE` is set, lines are also appended to that file.
pub fn init() -> Result<()> {
    match std::env::var_os(LOG_FILE_ENV) {
        Some(path) => {
            let level = std::env::var("RUST_LOG")
                .ok()
                .and_then(|value| value.parse::<LevelFilter>().ok())
                .unwrap_or(LevelFilter::Info);

            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] {}: {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .level(level)
                .chain(std::io::stderr())
                .chain(fern::log_file(&path).with_context(|| format!("Failed to open log file {:?}", path))?)
                .apply()
                .context("Failed to install logger")?;
        }
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Stderr)
                .try_init()
                .context("Failed to install logger")?;
        }
    }
    Ok(())
}
