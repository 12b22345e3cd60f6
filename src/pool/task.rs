//! Intrusive task and batch types
//!
//! A task carries its own queue linkage, so scheduling never allocates: the
//! submitter embeds a [`Task`] in whatever structure owns the job context and
//! keeps that structure alive until the callback has returned.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Callback signature: receives the opaque context the task was built with.
pub type RunFn = unsafe fn(*mut ());

/// A single unit of work.
///
/// While queued, the task is owned by exactly one queue, which threads it
/// through `next`. Ownership of `context` stays with the submitter.
pub struct Task {
    pub(crate) next: AtomicPtr<Task>,
    run: RunFn,
    context: *mut (),
}

// Queue words flag the low two bits of task pointers.
const _: () = assert!(std::mem::align_of::<Task>() >= 4);

impl Task {
    pub fn new(run: RunFn, context: *mut ()) -> Self {
        Self {
            next: AtomicPtr::new(std::ptr::null_mut()),
            run,
            context,
        }
    }

    /// Invoke the callback.
    ///
    /// # Safety
    ///
    /// `task` must point to a live task that is in no queue. The callback may
    /// free the memory holding the task, so both fields are read out first.
    pub(crate) unsafe fn execute(task: NonNull<Task>) {
        let run = task.as_ref().run;
        let context = task.as_ref().context;
        run(context)
    }
}

/// An ordered chain of tasks submitted as one unit.
///
/// Immutable once handed to the pool; the pool may split it across queues on
/// buffer overflow.
#[derive(Default)]
pub struct Batch {
    pub(crate) head: Option<NonNull<Task>>,
    pub(crate) tail: Option<NonNull<Task>>,
    len: usize,
}

impl Batch {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one task to the chain.
    ///
    /// # Safety
    ///
    /// `task` must stay valid until its callback runs, and must not already
    /// be linked into a batch or queue.
    pub unsafe fn push(&mut self, task: NonNull<Task>) {
        task.as_ref().next.store(std::ptr::null_mut(), Ordering::Relaxed);
        match self.tail {
            Some(tail) => tail.as_ref().next.store(task.as_ptr(), Ordering::Relaxed),
            None => self.head = Some(task),
        }
        self.tail = Some(task);
        self.len += 1;
    }

    /// Append an entire batch, preserving both orders.
    pub fn append(&mut self, other: Batch) {
        let (other_head, other_tail) = match (other.head, other.tail) {
            (Some(h), Some(t)) => (h, t),
            _ => return,
        };
        match self.tail {
            Some(tail) => unsafe {
                tail.as_ref()
                    .next
                    .store(other_head.as_ptr(), Ordering::Relaxed);
            },
            None => self.head = Some(other_head),
        }
        self.tail = Some(other_tail);
        self.len += other.len;
    }

    /// Detach and return the first task.
    pub(crate) fn pop(&mut self) -> Option<NonNull<Task>> {
        let task = self.head?;
        let next = unsafe { task.as_ref().next.load(Ordering::Relaxed) };
        self.head = NonNull::new(next);
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(task)
    }
}

impl From<NonNull<Task>> for Batch {
    fn from(task: NonNull<Task>) -> Self {
        let mut batch = Self::new();
        unsafe { batch.push(task) };
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn noop(_: *mut ()) {}

    fn task() -> Box<Task> {
        Box::new(Task::new(noop, std::ptr::null_mut()))
    }

    #[test]
    fn test_batch_preserves_order() {
        let (a, b, c) = (task(), task(), task());
        let mut batch = Batch::new();
        unsafe {
            batch.push(NonNull::from(a.as_ref()));
            batch.push(NonNull::from(b.as_ref()));
            batch.push(NonNull::from(c.as_ref()));
        }
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.pop(), Some(NonNull::from(a.as_ref())));
        assert_eq!(batch.pop(), Some(NonNull::from(b.as_ref())));
        assert_eq!(batch.pop(), Some(NonNull::from(c.as_ref())));
        assert_eq!(batch.pop(), None);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_batch_append() {
        let (a, b) = (task(), task());
        let mut first = Batch::from(NonNull::from(a.as_ref()));
        let second = Batch::from(NonNull::from(b.as_ref()));
        first.append(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.pop(), Some(NonNull::from(a.as_ref())));
        assert_eq!(first.pop(), Some(NonNull::from(b.as_ref())));
    }

    #[test]
    fn test_append_empty_is_noop() {
        let a = task();
        let mut batch = Batch::from(NonNull::from(a.as_ref()));
        batch.append(Batch::new());
        assert_eq!(batch.len(), 1);
    }
}
