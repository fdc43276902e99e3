//! Debug-only detection of re-entrant locking.
//!
//! The table's locks are not recursive: a visitor that calls back into the
//! same table and touches a partition its own thread already holds would
//! spin forever. In debug builds every acquisition made by the table is
//! recorded in a thread-local registry, and a conflicting re-acquisition
//! panics before it can deadlock. In release builds this compiles to a
//! zero-cost no-op.

use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

#[cfg(debug_assertions)]
use std::cell::RefCell;
#[cfg(debug_assertions)]
use std::collections::HashMap;

/// Access mode of a recorded acquisition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Mode {
    Shared,
    Exclusive,
}

/// What the current thread holds on one lock.
#[cfg(debug_assertions)]
#[derive(Default)]
struct Holds {
    shared: usize,
    exclusive: bool,
}

// Keyed by lock address. Sweeps over every partition register tens of
// thousands of locks at once, so lookups must not scan.
#[cfg(debug_assertions)]
thread_local! {
    static HELD: RefCell<HashMap<usize, Holds>> = RefCell::new(HashMap::new());
}

/// Record that the current thread is about to take `lock` in `mode`.
///
/// Shared after shared is allowed (readers never block readers). Anything
/// involving exclusive access to a lock this thread already holds panics.
#[inline]
pub(crate) fn enter<T: ?Sized>(lock: &T, mode: Mode) -> HeldToken {
    #[cfg(debug_assertions)]
    {
        let addr = lock as *const T as *const () as usize;
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            let holds = held.entry(addr).or_default();
            let conflict =
                holds.exclusive || (mode == Mode::Exclusive && holds.shared > 0);
            if conflict {
                // Release the borrow before unwinding through other tokens.
                drop(held);
                panic!("reentrancy detected: lock already held by this thread");
            }
            match mode {
                Mode::Shared => holds.shared += 1,
                Mode::Exclusive => holds.exclusive = true,
            }
        });
        HeldToken {
            addr,
            mode,
            _nosend: PhantomData,
        }
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = (lock, mode);
        HeldToken {
            _nosend: PhantomData,
        }
    }
}

/// Number of acquisitions the current thread has registered.
#[cfg(all(test, debug_assertions))]
pub(crate) fn held_count() -> usize {
    HELD.with(|held| {
        held.borrow()
            .values()
            .map(|h| h.shared + usize::from(h.exclusive))
            .sum()
    })
}

/// Registration of one acquisition; unregisters on drop.
pub(crate) struct HeldToken {
    #[cfg(debug_assertions)]
    addr: usize,
    #[cfg(debug_assertions)]
    mode: Mode,
    // Tied to the registering thread.
    _nosend: PhantomData<*mut ()>,
}

impl Drop for HeldToken {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let (addr, mode) = (self.addr, self.mode);
            // The registry may already be gone during thread teardown.
            let _ = HELD.try_with(|held| {
                let mut held = held.borrow_mut();
                let Some(holds) = held.get_mut(&addr) else {
                    debug_assert!(false, "held-lock registry out of sync");
                    return;
                };
                match mode {
                    Mode::Shared => holds.shared -= 1,
                    Mode::Exclusive => holds.exclusive = false,
                }
                if holds.shared == 0 && !holds.exclusive {
                    held.remove(&addr);
                }
            });
        }
    }
}

/// A lock guard paired with its registration.
///
/// Field order matters: the guard releases the lock before the token
/// unregisters it.
pub(crate) struct Held<G> {
    guard: G,
    _token: HeldToken,
}

impl<G> Held<G> {
    #[inline]
    pub(crate) fn new(token: HeldToken, guard: G) -> Self {
        Self {
            guard,
            _token: token,
        }
    }
}

impl<G: Deref> Deref for Held<G> {
    type Target = G::Target;

    #[inline]
    fn deref(&self) -> &G::Target {
        &self.guard
    }
}

impl<G: DerefMut> DerefMut for Held<G> {
    #[inline]
    fn deref_mut(&mut self) -> &mut G::Target {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::{enter, Mode};

    #[test]
    fn shared_reentry_is_allowed() {
        let lock = 0u8;
        let _a = enter(&lock, Mode::Shared);
        let _b = enter(&lock, Mode::Shared);
    }

    #[test]
    fn distinct_locks_do_not_conflict() {
        let (x, y) = (0u8, 0u8);
        let _a = enter(&x, Mode::Exclusive);
        let _b = enter(&y, Mode::Exclusive);
    }

    #[test]
    fn reentry_after_release_is_ok() {
        let lock = 0u8;
        drop(enter(&lock, Mode::Exclusive));
        let _g = enter(&lock, Mode::Exclusive);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn exclusive_reentry_panics_in_debug() {
        let lock = 0u8;
        let res = std::panic::catch_unwind(|| {
            let _g1 = enter(&lock, Mode::Shared);
            let _g2 = enter(&lock, Mode::Exclusive);
        });
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
        // The registry was unwound cleanly.
        let _g = enter(&lock, Mode::Exclusive);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn shared_under_exclusive_panics_in_debug() {
        let lock = 0u8;
        let res = std::panic::catch_unwind(|| {
            let _g1 = enter(&lock, Mode::Exclusive);
            let _g2 = enter(&lock, Mode::Shared);
        });
        assert!(res.is_err());
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn reentrancy_noop_in_release() {
        let lock = 0u8;
        let _g1 = enter(&lock, Mode::Exclusive);
        let _g2 = enter(&lock, Mode::Exclusive);
    }
}
