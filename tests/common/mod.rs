//! Shared test setup: initialize the logger exactly once per test binary,
//! the way `small-db`'s own integration tests do via a `std::sync::Once`
//! guard around `init_log`.

use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup() {
    INIT.call_once(latchtree::util::init_log);
}
