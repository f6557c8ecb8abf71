//! Shared recursion-depth tracking for nested sub-queries.
//!
//! Rust has no `defer`, so a Go-shaped "increment on entry,
//! decrement on exit" pattern becomes an RAII guard: [`DepthContext::enter`]
//! returns a [`DepthGuard`] whose `Drop` does the decrement, so every exit
//! path — including an error return or a panic unwind — restores the
//! counter.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepthError {
    #[error("inception recursion depth exceeded the configured maximum of {0}")]
    MaxDepthExceeded(u32),
}

/// Cloneable handle to one request chain's shared depth counter.
#[derive(Clone)]
pub struct DepthContext {
    depth: Arc<AtomicU32>,
    max_depth: u32,
}

impl DepthContext {
    pub fn new(max_depth: u32) -> Self {
        Self { depth: Arc::new(AtomicU32::new(0)), max_depth }
    }

    /// Enter one more level of nesting. Fails without mutating state further
    /// once `max_depth` would be exceeded.
    pub fn enter(&self) -> Result<DepthGuard, DepthError> {
        let next = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if next > self.max_depth {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(DepthError::MaxDepthExceeded(self.max_depth));
        }
        Ok(DepthGuard { depth: self.depth.clone() })
    }

    #[cfg(test)]
    pub fn current(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Holds one level of depth; decrements on drop.
pub struct DepthGuard {
    depth: Arc<AtomicU32>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_succeeds_up_to_max_depth() {
        let ctx = DepthContext::new(2);
        let g1 = ctx.enter().unwrap();
        assert_eq!(ctx.current(), 1);
        let g2 = ctx.enter().unwrap();
        assert_eq!(ctx.current(), 2);
        assert!(ctx.enter().is_err());
        drop(g2);
        assert_eq!(ctx.current(), 1);
        drop(g1);
        assert_eq!(ctx.current(), 0);
    }

    #[test]
    fn dropping_a_guard_restores_the_counter_on_an_error_path() {
        let ctx = DepthContext::new(0);
        assert!(ctx.enter().is_err());
        assert_eq!(ctx.current(), 0, "a failed enter must not leave the counter incremented");
    }

    #[test]
    fn zero_max_depth_forbids_any_nesting() {
        let ctx = DepthContext::new(0);
        assert!(matches!(ctx.enter(), Err(DepthError::MaxDepthExceeded(0))));
    }
}
