use std::sync::{Mutex, OnceLock, PoisonError};

/// Process-lifetime value built at most once.
///
/// Concurrent first callers serialize on an init lock; exactly one runs the
/// initializer and the rest observe its result. A failed initializer leaves
/// the cache empty so a later call can retry.
pub struct ProcessCache<T> {
    cell: OnceLock<T>,
    init: Mutex<()>,
}

impl<T: Clone> ProcessCache<T> {
    pub const fn new() -> Self {
        Self { cell: OnceLock::new(), init: Mutex::new(()) }
    }

    pub fn get(&self) -> Option<T> {
        self.cell.get().cloned()
    }

    pub fn get_or_try_init<F, E>(&self, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(v) = self.cell.get() {
            return Ok(v.clone());
        }
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = self.cell.get() {
            return Ok(v.clone());
        }
        let value = init()?;
        let _ = self.cell.set(value.clone());
        Ok(value)
    }
}

impl<T: Clone> Default for ProcessCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn concurrent_first_access_initializes_once() {
        let cache: Arc<ProcessCache<Arc<String>>> = Arc::new(ProcessCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok::<_, ()>(Arc::new("corpus".to_string()))
                        })
                        .unwrap()
                })
            })
            .collect();
        let values: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn failed_init_can_be_retried() {
        let cache: ProcessCache<u32> = ProcessCache::new();
        assert_eq!(cache.get_or_try_init(|| Err::<u32, _>("boom")), Err("boom"));
        assert_eq!(cache.get(), None);
        assert_eq!(cache.get_or_try_init(|| Ok::<_, &str>(7)), Ok(7));
        assert_eq!(cache.get_or_try_init(|| Ok::<_, &str>(9)), Ok(7));
    }
}
