//! Deferred destruction of GPU resources.
//!
//! Vulkan objects must not be destroyed while the GPU may still be using
//! them. Rather than tracking per-object lifetimes, resources that need
//! teardown at shutdown register a destruction closure in a
//! [`DeletionQueue`]. The owner flushes the queue once, after the device
//! is idle, and the closures run in reverse registration order so that
//! dependent objects are destroyed before the objects they depend on.
//!
//! # Example
//!
//! ```
//! use aurora_rhi::deletion::DeletionQueue;
//!
//! let mut queue = DeletionQueue::new();
//! queue.push(|| println!("destroy pipeline"));
//! queue.push(|| println!("destroy pipeline layout"));
//!
//! // Prints "destroy pipeline layout" first, then "destroy pipeline".
//! queue.flush();
//! assert!(queue.is_empty());
//! ```

use tracing::{debug, warn};

/// A LIFO queue of deferred destruction actions.
///
/// Actions pushed first run last, mirroring the creation order of the
/// resources they destroy. Flushing consumes every queued action; a
/// second flush is a no-op until new actions are pushed.
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<Box<dyn FnOnce()>>,
}

impl DeletionQueue {
    /// Creates an empty deletion queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a destruction action.
    ///
    /// The action runs when [`flush`](Self::flush) is called, after every
    /// action registered later than it.
    pub fn push(&mut self, deletor: impl FnOnce() + 'static) {
        self.deletors.push(Box::new(deletor));
    }

    /// Runs all queued actions in reverse registration order and clears
    /// the queue.
    ///
    /// The caller must ensure the GPU is idle before flushing; the queue
    /// itself performs no synchronization.
    pub fn flush(&mut self) {
        if self.deletors.is_empty() {
            return;
        }

        debug!("Flushing deletion queue ({} actions)", self.deletors.len());

        while let Some(deletor) = self.deletors.pop() {
            deletor();
        }
    }

    /// Returns the number of pending actions.
    #[inline]
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    /// Returns true if no actions are pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        if !self.deletors.is_empty() {
            warn!(
                "Deletion queue dropped with {} pending action(s), flushing now",
                self.deletors.len()
            );
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_flush_runs_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DeletionQueue::new();

        for id in [1, 2, 3] {
            let order = Rc::clone(&order);
            queue.push(move || order.borrow_mut().push(id));
        }

        queue.flush();

        assert_eq!(*order.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn test_flush_empties_the_queue() {
        let mut queue = DeletionQueue::new();
        queue.push(|| {});
        queue.push(|| {});
        assert_eq!(queue.len(), 2);

        queue.flush();

        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_second_flush_is_noop() {
        let count = Rc::new(RefCell::new(0u32));
        let mut queue = DeletionQueue::new();

        let counter = Rc::clone(&count);
        queue.push(move || *counter.borrow_mut() += 1);

        queue.flush();
        queue.flush();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_queue_is_reusable_after_flush() {
        let count = Rc::new(RefCell::new(0u32));
        let mut queue = DeletionQueue::new();

        let counter = Rc::clone(&count);
        queue.push(move || *counter.borrow_mut() += 1);
        queue.flush();

        let counter = Rc::clone(&count);
        queue.push(move || *counter.borrow_mut() += 10);
        queue.flush();

        assert_eq!(*count.borrow(), 11);
    }

    #[test]
    fn test_drop_flushes_pending_actions() {
        let count = Rc::new(RefCell::new(0u32));

        {
            let mut queue = DeletionQueue::new();
            let counter = Rc::clone(&count);
            queue.push(move || *counter.borrow_mut() += 1);
        }

        assert_eq!(*count.borrow(), 1);
    }
}
