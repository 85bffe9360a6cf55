pub mod mocks;

/// Initializes `env_logger` for test output, the same way the teacher's
/// `tests/error_cases.rs` does. Idempotent: safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
