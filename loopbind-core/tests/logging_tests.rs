// Separate test binary: `init` installs the global logger and may run only once per process.

#[test]
fn init_installs_the_global_logger() {
    loopbind_core::logging::init();
    log::info!("logger installed");
    assert!(log::log_enabled!(log::Level::Error));
}
