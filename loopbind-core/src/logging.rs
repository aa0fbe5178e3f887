use env_logger::{Env, Target};

/// Install the process-wide logger: `RUST_LOG` when set, `info` otherwise, written to stderr.
///
/// Panics if a logger is already installed.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .init();
}

/// Route log output through the test harness. Safe to call from every test.
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
