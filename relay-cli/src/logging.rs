/// Install the global logger.
///
/// Defaults to `info`; override with `RUST_LOG` (e.g. `RUST_LOG=weather_relay_core=debug`).
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();
}
