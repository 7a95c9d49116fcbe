use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// copy from https://github.com/tikv/tikv/blob/b15ea3b1cd766375cb52019e35c195ed797124df/components/tikv_util/src/lib.rs#L171-L186
// A handy shortcut to replace `RwLock` write/read().unwrap() pattern to
// shortcut wl and rl.
pub trait HandyRwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

/// Initialize the `env_logger` global logger exactly once per process.
///
/// Tests call this from a `std::sync::Once` guard the way
/// `small-db`'s test setup does, since `cargo test` runs suites in the
/// same process.
pub fn init_log() {
    use std::io::Write;

    let mut builder = env_logger::Builder::from_default_env();
    builder
        .format_timestamp_micros()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(true)
        .try_init()
        .ok();
}
