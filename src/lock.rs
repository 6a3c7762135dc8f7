use std::sync::{Mutex, MutexGuard};

/// Lock `lock`, recovering the guard if a previous holder panicked.
///
/// The data behind every mutex in this crate stays consistent across a panic
/// (plain queues and status fields), so a poisoned lock is logged and reused.
pub fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("mutex poisoned in {context}; recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn recovers_poisoned_mutex() {
        let shared = Arc::new(Mutex::new(7_u32));
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(shared.is_poisoned());
        assert_eq!(*lock_or_recover(&shared, "test"), 7);
    }
}
