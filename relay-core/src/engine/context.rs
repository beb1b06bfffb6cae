//! Scoped resource held by the dispatch thread
//!
//! A [`LoopContext`] is entered when the consumer thread starts and exited
//! when it finishes, on every exit path including a panic escaping the loop.
//! Afterwards it goes back to the engine so the next `start()` enters it again.

use anyhow::Result;
use parking_lot::Mutex;

pub trait LoopContext: Send {
    /// Acquire the resource; an error keeps the loop from running
    fn enter(&mut self) -> Result<()>;

    /// Release the resource
    fn exit(&mut self);
}

/// Holds an entered context for the lifetime of the loop
pub(crate) struct ContextGuard<'a> {
    slot: &'a Mutex<Option<Box<dyn LoopContext>>>,
    context: Option<Box<dyn LoopContext>>,
}

impl<'a> ContextGuard<'a> {
    /// Take the context out of `slot` and enter it
    ///
    /// On failure the context is put back untouched.
    pub(crate) fn enter(slot: &'a Mutex<Option<Box<dyn LoopContext>>>) -> Result<Self> {
        let mut context = slot.lock().take();
        if let Some(ctx) = context.as_mut() {
            if let Err(e) = ctx.enter() {
                *slot.lock() = context;
                return Err(e);
            }
        }
        Ok(Self { slot, context })
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut ctx) = self.context.take() {
            ctx.exit();
            let mut slot = self.slot.lock();
            // A context installed while the loop ran takes precedence
            if slot.is_none() {
                *slot = Some(ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        entered: Arc<AtomicUsize>,
        exited: Arc<AtomicUsize>,
        fail: bool,
    }

    impl LoopContext for Counting {
        fn enter(&mut self) -> Result<()> {
            if self.fail {
                anyhow::bail!("resource unavailable");
            }
            self.entered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn exit(&mut self) {
            self.exited.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(fail: bool) -> (Box<dyn LoopContext>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let entered = Arc::new(AtomicUsize::new(0));
        let exited = Arc::new(AtomicUsize::new(0));
        let ctx = Box::new(Counting {
            entered: Arc::clone(&entered),
            exited: Arc::clone(&exited),
            fail,
        });
        (ctx, entered, exited)
    }

    #[test]
    fn test_guard_enters_exits_and_returns_context() {
        let (ctx, entered, exited) = counting(false);
        let slot = Mutex::new(Some(ctx));

        {
            let _guard = ContextGuard::enter(&slot).unwrap();
            assert!(slot.lock().is_none());
            assert_eq!(entered.load(Ordering::SeqCst), 1);
        }

        assert_eq!(exited.load(Ordering::SeqCst), 1);
        assert!(slot.lock().is_some());
    }

    #[test]
    fn test_guard_exits_on_panic() {
        let (ctx, _entered, exited) = counting(false);
        let slot = Mutex::new(Some(ctx));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ContextGuard::enter(&slot).unwrap();
            panic!("loop blew up");
        }));

        assert!(result.is_err());
        assert_eq!(exited.load(Ordering::SeqCst), 1);
        assert!(slot.lock().is_some());
    }

    #[test]
    fn test_failed_enter_restores_context() {
        let (ctx, _entered, exited) = counting(true);
        let slot = Mutex::new(Some(ctx));

        assert!(ContextGuard::enter(&slot).is_err());
        assert!(slot.lock().is_some());
        assert_eq!(exited.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_slot_is_fine() {
        let slot: Mutex<Option<Box<dyn LoopContext>>> = Mutex::new(None);
        let guard = ContextGuard::enter(&slot).unwrap();
        drop(guard);
        assert!(slot.lock().is_none());
    }
}
