//! Work queues: bounded per-worker ring buffer and intrusive overflow queue
//!
//! Two structures cooperate per worker:
//!
//! - [`Buffer`]: a fixed 256-slot ring indexed by wrapping u32 counters.
//!   The owning worker pushes at `tail`; the owner, and stealers, advance
//!   `head` by CAS. On overflow, half the ring migrates to the overflow
//!   queue as one linked chain so older work keeps moving.
//! - [`Injector`]: a multi-producer intrusive stack folded into a single
//!   atomic word. The low bits are `HAS_CACHE` and `IS_CONSUMING` flags; the
//!   upper bits are the push-stack head. The consumer that acquires the
//!   `IS_CONSUMING` bit adopts the whole push stack as its private cache,
//!   which restores FIFO-ish draining over the LIFO push order.
//!
//! The pool's global queue is an `Injector` with identical invariants.

use super::task::{Batch, Task};
use std::cell::UnsafeCell;
use std::hint;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering};

/// A task taken from a queue, plus whether the taking also refilled the
/// taker's ring buffer (a signal to wake a sibling).
pub(crate) struct Stole {
    pub task: NonNull<Task>,
    pub pushed: bool,
}

/// Fixed-capacity ring of task slots.
///
/// `head` and `tail` are free-running; `tail - head` (wrapping) is the size
/// and stays within `0..=CAPACITY` at every observable point.
pub(crate) struct Buffer {
    head: AtomicU32,
    tail: AtomicU32,
    slots: [AtomicPtr<Task>; Self::CAPACITY],
}

impl Buffer {
    pub(crate) const CAPACITY: usize = 256;

    pub(crate) fn new() -> Self {
        const SLOT: AtomicPtr<Task> = AtomicPtr::new(ptr::null_mut());
        Self {
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            slots: [SLOT; Self::CAPACITY],
        }
    }

    #[inline(always)]
    fn read(&self, index: u32) -> NonNull<Task> {
        let slot = &self.slots[(index as usize) % Self::CAPACITY];
        NonNull::new(slot.load(Ordering::Relaxed)).expect("read of an unwritten ring slot")
    }

    #[inline(always)]
    fn write(&self, index: u32, task: NonNull<Task>) {
        let slot = &self.slots[(index as usize) % Self::CAPACITY];
        slot.store(task.as_ptr(), Ordering::Relaxed);
    }

    /// Push a batch at the tail.
    ///
    /// Returns the overflow chain (half the ring, oldest first, followed by
    /// whatever remained of `batch`) when the ring cannot absorb everything.
    ///
    /// # Safety
    ///
    /// Only the owning worker may call this.
    pub(crate) unsafe fn push(&self, batch: impl Into<Batch>) -> Option<Batch> {
        let mut batch = batch.into();
        let mut head = self.head.load(Ordering::Relaxed);
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            let mut size = tail.wrapping_sub(head);
            debug_assert!(size <= Self::CAPACITY as u32);

            if size < Self::CAPACITY as u32 {
                while size < Self::CAPACITY as u32 {
                    let task = match batch.pop() {
                        Some(task) => task,
                        None => break,
                    };
                    self.write(tail, task);
                    tail = tail.wrapping_add(1);
                    size += 1;
                }
                self.tail.store(tail, Ordering::Release);

                if batch.is_empty() {
                    return None;
                }
                hint::spin_loop();
                head = self.head.load(Ordering::Relaxed);
                continue;
            }

            // Ring is full: migrate the older half plus the rest of the
            // batch to the overflow queue as one chain.
            let migrate = size / 2;
            match self.head.compare_exchange_weak(
                head,
                head.wrapping_add(migrate),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Err(e) => {
                    head = e;
                    hint::spin_loop();
                    continue;
                }
                Ok(_) => {
                    let mut overflow = Batch::new();
                    for offset in 0..migrate {
                        overflow.push(self.read(head.wrapping_add(offset)));
                    }
                    overflow.append(batch);
                    return Some(overflow);
                }
            }
        }
    }

    /// Take one task from the head. Contends with stealers via CAS.
    pub(crate) fn pop(&self) -> Option<NonNull<Task>> {
        let mut head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);

        loop {
            if head == tail {
                return None;
            }
            match self.head.compare_exchange_weak(
                head,
                head.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(self.read(head)),
                Err(e) => head = e,
            }
        }
    }

    /// Drain an injector into this ring (up to the free capacity) and return
    /// one task. `pushed` reports whether the ring gained tasks.
    ///
    /// # Safety
    ///
    /// Only the ring's owning worker may call this; the injector may belong
    /// to any worker or to the pool.
    pub(crate) unsafe fn consume(&self, queue: &Injector) -> Option<Stole> {
        let mut consumer = queue.try_consume()?;

        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let size = tail.wrapping_sub(head);
        debug_assert!(size <= Self::CAPACITY as u32);

        let mut pushed: u32 = 0;
        while size.wrapping_add(pushed) < Self::CAPACITY as u32 {
            let task = match consumer.pop() {
                Some(task) => task,
                None => break,
            };
            self.write(tail.wrapping_add(pushed), task);
            pushed += 1;
        }

        let task = consumer.pop().or_else(|| {
            if pushed == 0 {
                return None;
            }
            pushed -= 1;
            Some(self.read(tail.wrapping_add(pushed)))
        })?;

        if pushed > 0 {
            self.tail.store(tail.wrapping_add(pushed), Ordering::Release);
        }
        Some(Stole {
            task,
            pushed: pushed > 0,
        })
    }

    /// Steal roughly half of `target`'s ring into this one and return one of
    /// the stolen tasks.
    ///
    /// Reads head/tail with acquire and retries on torn observations
    /// (`size > CAPACITY`); the theft commits with an acq-rel CAS on the
    /// victim's head.
    ///
    /// # Safety
    ///
    /// Only the (empty) ring's owning worker may call this.
    pub(crate) unsafe fn steal_from(&self, target: &Buffer) -> Option<Stole> {
        let tail = self.tail.load(Ordering::Relaxed);
        debug_assert_eq!(tail, self.head.load(Ordering::Relaxed));

        loop {
            let target_head = target.head.load(Ordering::Acquire);
            let target_tail = target.tail.load(Ordering::Acquire);

            let size = target_tail.wrapping_sub(target_head);
            if size == 0 {
                return None;
            }
            if size > Self::CAPACITY as u32 {
                hint::spin_loop();
                continue;
            }

            // ceil(size / 2)
            let take = size - size / 2;
            for offset in 0..take {
                let task = target.read(target_head.wrapping_add(offset));
                self.write(tail.wrapping_add(offset), task);
            }

            if target
                .head
                .compare_exchange_weak(
                    target_head,
                    target_head.wrapping_add(take),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                hint::spin_loop();
                continue;
            }

            let pushed = take - 1;
            let task = self.read(tail.wrapping_add(pushed));
            if pushed > 0 {
                self.tail.store(tail.wrapping_add(pushed), Ordering::Release);
            }
            return Some(Stole {
                task,
                pushed: pushed > 0,
            });
        }
    }
}

/// Intrusive multi-producer stack with a single-consumer cache, packed into
/// one atomic word.
pub(crate) struct Injector {
    stack: AtomicUsize,
    cache: UnsafeCell<*mut Task>,
}

// The cache cell is only touched while holding the IS_CONSUMING bit.
unsafe impl Send for Injector {}
unsafe impl Sync for Injector {}

const HAS_CACHE: usize = 0b01;
const IS_CONSUMING: usize = 0b10;
const PTR_MASK: usize = !(HAS_CACHE | IS_CONSUMING);

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            stack: AtomicUsize::new(0),
            cache: UnsafeCell::new(ptr::null_mut()),
        }
    }

    /// Push a chain of tasks. Safe from any thread.
    pub(crate) fn push(&self, batch: Batch) {
        let (head, tail) = match (batch.head, batch.tail) {
            (Some(head), Some(tail)) => (head, tail),
            _ => return,
        };
        debug_assert_eq!(head.as_ptr() as usize & !PTR_MASK, 0);

        let mut stack = self.stack.load(Ordering::Relaxed);
        loop {
            unsafe {
                tail.as_ref()
                    .next
                    .store((stack & PTR_MASK) as *mut Task, Ordering::Relaxed);
            }
            let new_stack = (head.as_ptr() as usize) | (stack & !PTR_MASK);
            match self.stack.compare_exchange_weak(
                stack,
                new_stack,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(e) => stack = e,
            }
        }
    }

    /// Try to become the exclusive consumer.
    ///
    /// Fails when another consumer holds the bit or when there is nothing to
    /// take. When the cache flag is clear, the acquiring consumer adopts the
    /// entire push stack as its cache.
    pub(crate) fn try_consume(&self) -> Option<Consumer<'_>> {
        let mut stack = self.stack.load(Ordering::Relaxed);
        loop {
            if stack & IS_CONSUMING != 0 {
                return None;
            }
            if stack & (HAS_CACHE | PTR_MASK) == 0 {
                return None;
            }

            let mut new_stack = stack | HAS_CACHE | IS_CONSUMING;
            if stack & HAS_CACHE == 0 {
                debug_assert_ne!(stack & PTR_MASK, 0);
                new_stack &= !PTR_MASK;
            }

            match self.stack.compare_exchange_weak(
                stack,
                new_stack,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let current = if stack & HAS_CACHE != 0 {
                        unsafe { *self.cache.get() }
                    } else {
                        (stack & PTR_MASK) as *mut Task
                    };
                    return Some(Consumer {
                        queue: self,
                        current,
                    });
                }
                Err(e) => stack = e,
            }
        }
    }
}

/// Exclusive draining handle over an [`Injector`]. Dropping it releases the
/// consumer bit and stores the unconsumed remainder back as the cache.
pub(crate) struct Consumer<'a> {
    queue: &'a Injector,
    current: *mut Task,
}

impl Consumer<'_> {
    pub(crate) fn pop(&mut self) -> Option<NonNull<Task>> {
        if self.current.is_null() {
            // Cache is dry: adopt whatever has been pushed since.
            let stack = self.queue.stack.load(Ordering::Relaxed);
            debug_assert_ne!(stack & IS_CONSUMING, 0);
            if stack & PTR_MASK == 0 {
                return None;
            }
            let taken = self
                .queue
                .stack
                .swap(HAS_CACHE | IS_CONSUMING, Ordering::Acquire);
            self.current = (taken & PTR_MASK) as *mut Task;
            debug_assert!(!self.current.is_null());
        }

        let task = NonNull::new(self.current)?;
        self.current = unsafe { task.as_ref().next.load(Ordering::Relaxed) };
        Some(task)
    }
}

impl Drop for Consumer<'_> {
    fn drop(&mut self) {
        unsafe { *self.queue.cache.get() = self.current };
        let mut clear = IS_CONSUMING;
        if self.current.is_null() {
            clear |= HAS_CACHE;
        }
        self.queue.stack.fetch_sub(clear, Ordering::Release);
    }
}
