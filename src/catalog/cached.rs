// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use parking_lot::Mutex;

/// A lazily loaded value shared by all users of its owner.
///
/// The check-then-load sequence runs under one lock, so the value is loaded
/// at most once per cell even when several threads ask for it concurrently.
/// A failed load leaves the cell empty and the next caller retries.
pub struct CachedHandle<T> {
    cell: Mutex<Option<T>>,
}

impl<T: Clone> CachedHandle<T> {
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    /// Returns the cached value, loading it with `load` if the cell is empty.
    pub fn get_or_try_load<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut cell = self.cell.lock();
        if let Some(value) = &*cell {
            return Ok(value.clone());
        }
        let value = load()?;
        *cell = Some(value.clone());
        Ok(value)
    }

    pub fn get(&self) -> Option<T> {
        self.cell.lock().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.lock().is_some()
    }
}

impl<T: Clone> Default for CachedHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_load_once() {
        let handle = Arc::new(CachedHandle::<Arc<String>>::new());
        let loads = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let value = handle
                        .get_or_try_load(|| {
                            loads.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, ()>(Arc::new("table".to_string()))
                        })
                        .unwrap();
                    assert_eq!(value.as_str(), "table");
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(handle.is_loaded());
    }

    #[test]
    fn test_failed_load_retries() {
        let handle = CachedHandle::<u32>::new();
        assert_eq!(handle.get_or_try_load(|| Err("unavailable")), Err("unavailable"));
        assert!(handle.get().is_none());
        assert_eq!(handle.get_or_try_load(|| Ok::<_, &str>(3)), Ok(3));
        assert_eq!(handle.get_or_try_load(|| Ok::<_, &str>(4)), Ok(3));
    }
}
