//! Per-request execution context: who is asking, and whether they still are.

use tokio_util::sync::CancellationToken;

/// Identity of an already-authenticated caller.
///
/// Authentication happens upstream; this crate only carries the result so that
/// tools can re-check resource access against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    pub user_id: i64,
}

impl CallerIdentity {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }
}

/// Carried through every streaming call and into every tool execution.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// `None` for unauthenticated contexts; tools that touch user data must
    /// refuse to run without a caller.
    pub caller: Option<CallerIdentity>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(caller: CallerIdentity) -> Self {
        Self {
            caller: Some(caller),
            cancel: CancellationToken::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            caller: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = RequestContext::new(CallerIdentity::new(7));
        let clone = ctx.clone();
        ctx.cancel.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.caller.map(|c| c.user_id), Some(7));
    }

    #[test]
    fn test_anonymous_has_no_caller() {
        assert!(RequestContext::anonymous().caller.is_none());
    }
}
