//! Process-wide registry: exactly one scheduler per curator account.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use anyhow::Result;

use super::CuratorScheduler;

static SCHEDULERS: LazyLock<Mutex<HashMap<String, Arc<CuratorScheduler>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The scheduler for `account`, building it with `init` on first use.
/// `init` runs at most once per account.
pub fn get_or_init(
    account: &str,
    init: impl FnOnce() -> Result<CuratorScheduler>,
) -> Result<Arc<CuratorScheduler>> {
    let mut schedulers = SCHEDULERS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = schedulers.get(account) {
        return Ok(existing.clone());
    }
    let scheduler = Arc::new(init()?);
    schedulers.insert(account.to_string(), scheduler.clone());
    Ok(scheduler)
}

pub fn get(account: &str) -> Option<Arc<CuratorScheduler>> {
    SCHEDULERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(account)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn one_scheduler_per_account() {
        let harness = Harness::new();
        let first = get_or_init("registry-test", || harness.scheduler_unshared()).unwrap();

        let mut called = false;
        let second = get_or_init("registry-test", || {
            called = true;
            harness.scheduler_unshared()
        })
        .unwrap();

        assert!(!called);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &get("registry-test").unwrap()));
        assert!(get("registry-other").is_none());
    }
}
