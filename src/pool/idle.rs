//! Futex-backed event used for idle parking and join signalling
//!
//! The event is a single `AtomicU32` stepping through
//! `EMPTY -> WAITING -> NOTIFIED`, with `SHUTDOWN` absorbing. A woken waiter
//! re-arms by CASing `NOTIFIED` back to the state it should leave behind:
//! `EMPTY` before it has ever slept, `WAITING` after a futex wake, so that a
//! late `notify`/`shutdown` still wakes any thread that has not yet observed
//! the current round.

use std::sync::atomic::{fence, AtomicU32, Ordering};

const EMPTY: u32 = 0;
const WAITING: u32 = 1;
const NOTIFIED: u32 = 2;
const SHUTDOWN: u32 = 3;

pub(crate) struct IdleEvent {
    state: AtomicU32,
}

impl IdleEvent {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU32::new(EMPTY),
        }
    }

    /// Block until notified or shut down.
    pub(crate) fn wait(&self) {
        let mut acquire_with = EMPTY;
        let mut state = self.state.load(Ordering::Relaxed);

        loop {
            while state == NOTIFIED {
                match self.state.compare_exchange_weak(
                    state,
                    acquire_with,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return,
                    Err(e) => state = e,
                }
            }

            if state == SHUTDOWN {
                fence(Ordering::Acquire);
                return;
            }

            if state == EMPTY {
                if let Err(e) = self.state.compare_exchange_weak(
                    EMPTY,
                    WAITING,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    state = e;
                    continue;
                }
                state = WAITING;
            }

            debug_assert_eq!(state, WAITING);
            futex::wait(&self.state, WAITING);
            state = self.state.load(Ordering::Relaxed);
            acquire_with = WAITING;
        }
    }

    /// Wake one waiter.
    pub(crate) fn notify(&self) {
        self.wake(NOTIFIED, 1);
    }

    /// Wake every waiter, permanently.
    pub(crate) fn shutdown(&self) {
        self.wake(SHUTDOWN, u32::MAX);
    }

    fn wake(&self, release_with: u32, waiters: u32) {
        let state = self.state.swap(release_with, Ordering::Release);
        if state == WAITING {
            // The waiter may exit and invalidate this event right after it
            // observes the new state, so the wake must not read the word.
            futex::wake(&self.state as *const AtomicU32, waiters);
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod futex {
    use std::ptr;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub(super) fn wait(futex: &AtomicU32, expected: u32) {
        loop {
            if futex.load(Ordering::Relaxed) != expected {
                return;
            }
            let rc = unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    futex as *const AtomicU32,
                    libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                    expected,
                    ptr::null::<libc::timespec>(),
                )
            };
            if rc == 0 {
                return;
            }
            match unsafe { *libc::__errno_location() } {
                libc::EINTR => continue,
                libc::EAGAIN => return,
                errno => unreachable!("futex wait failed: errno {}", errno),
            }
        }
    }

    pub(super) fn wake(futex: *const AtomicU32, waiters: u32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                futex,
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                waiters,
            );
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
mod futex {
    //! Portable shim: one process-wide condvar serves every event. Wakes can
    //! be spurious across events; the event loops re-check their own word.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Condvar, Mutex, OnceLock};

    fn shared() -> &'static (Mutex<()>, Condvar) {
        static SHARED: OnceLock<(Mutex<()>, Condvar)> = OnceLock::new();
        SHARED.get_or_init(|| (Mutex::new(()), Condvar::new()))
    }

    pub(super) fn wait(futex: &AtomicU32, expected: u32) {
        let (lock, condvar) = shared();
        let mut guard = lock.lock().unwrap();
        while futex.load(Ordering::Relaxed) == expected {
            guard = condvar.wait(guard).unwrap();
        }
    }

    pub(super) fn wake(_futex: *const AtomicU32, _waiters: u32) {
        let (lock, condvar) = shared();
        drop(lock.lock().unwrap());
        condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_notify_before_wait_returns_immediately() {
        let event = IdleEvent::new();
        event.notify();
        event.wait();
    }

    #[test]
    fn test_wait_wakes_on_notify() {
        let event = Arc::new(IdleEvent::new());
        let waiter = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.wait())
        };
        // Give the waiter a chance to park, then wake it.
        thread::sleep(std::time::Duration::from_millis(50));
        event.notify();
        waiter.join().unwrap();
    }

    #[test]
    fn test_shutdown_is_absorbing() {
        let event = Arc::new(IdleEvent::new());
        event.shutdown();
        // Every subsequent wait returns without blocking.
        event.wait();
        event.wait();
    }

    #[test]
    fn test_shutdown_wakes_all() {
        let event = Arc::new(IdleEvent::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let event = Arc::clone(&event);
                thread::spawn(move || event.wait())
            })
            .collect();
        thread::sleep(std::time::Duration::from_millis(50));
        event.shutdown();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
