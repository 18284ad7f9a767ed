/// Install `env_logger` as the global logger, honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored, which lets every
/// test call it unconditionally.
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("marquee_fetch=info"),
    )
    .format_timestamp_millis()
    .is_test(cfg!(test))
    .try_init();
}
