mod test_data;
mod test_folds;
mod test_presence;
mod test_runner;
mod test_sparse;
mod test_store;

/// Routes `log` output through the test harness.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
