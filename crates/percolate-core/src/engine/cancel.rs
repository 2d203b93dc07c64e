//! Cooperative cancellation tokens.
//!
//! Every query execution receives a [`CancelToken`]. Composite queries hand a
//! child token to their sub-queries so that the first failing sibling can
//! stop the rest; cancelling a parent is observed by all descendants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation token backed by an `Arc<AtomicBool>`.
///
/// Cloning shares the underlying flag. Tokens form a chain: a child created
/// with [`CancelToken::child`] reports cancelled when either its own flag or
/// any ancestor's flag is set, while cancelling the child leaves the parent
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    parent: Option<CancelToken>,
}

impl CancelToken {
    /// Creates a fresh, non-cancelled token with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child token linked to this one.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Requests cancellation of this token and its descendants.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true if this token or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.inner.cancelled.load(Ordering::Relaxed) {
                return true;
            }
            current = token.inner.parent.as_ref();
        }
        false
    }
}
