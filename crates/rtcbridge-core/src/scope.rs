//! Per-thread record of which owners and dispatchers the current thread is
//! running inside.
//!
//! Engines may fire callbacks synchronously from inside a command, and a
//! managed handler may answer with another command or with `destroy`. Those
//! nested calls cannot wait on work their own thread is still doing, so they
//! check here first.

use std::cell::RefCell;

thread_local! {
    static ACTIVE: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn key<T>(value: &T) -> usize {
    value as *const T as usize
}

/// Marks `value` active on this thread until dropped. Scopes nest.
pub(crate) struct ThreadScope {
    key: usize,
}

impl ThreadScope {
    pub(crate) fn enter<T>(value: &T) -> Self {
        let key = key(value);
        ACTIVE.with(|active| active.borrow_mut().push(key));
        Self { key }
    }
}

impl Drop for ThreadScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|&k| k == self.key) {
                active.remove(pos);
            }
        });
    }
}

/// Whether this thread is inside a scope entered for `value`.
pub(crate) fn is_active<T>(value: &T) -> bool {
    let key = key(value);
    ACTIVE.with(|active| active.borrow().contains(&key))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn scopes_nest_and_unwind() {
        let a = 1u8;
        let b = 2u8;
        assert!(!is_active(&a));
        {
            let _outer = ThreadScope::enter(&a);
            {
                let _inner = ThreadScope::enter(&a);
                let _other = ThreadScope::enter(&b);
                assert!(is_active(&a) && is_active(&b));
            }
            assert!(is_active(&a));
            assert!(!is_active(&b));
        }
        assert!(!is_active(&a));
    }

    #[test]
    fn scopes_are_per_thread() {
        let value = Box::new(7u32);
        let _scope = ThreadScope::enter(value.as_ref());
        let addr = value.as_ref() as *const u32 as usize;
        let seen = thread::spawn(move || {
            ACTIVE.with(|active| active.borrow().contains(&addr))
        })
        .join()
        .unwrap();
        assert!(!seen);
    }
}
