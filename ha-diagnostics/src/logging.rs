use log::LevelFilter;
use std::io::Write;

/// Install the process-wide logger.
///
/// `RUST_LOG` may refine the configured level per module. Calling this more
/// than once is harmless; only the first call installs a logger.
pub fn init(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.target(),
            record.level(),
            record.args()
        )
    });
    if builder.try_init().is_err() {
        log::debug!("[logging] logger already installed");
    }
}
