use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SpcError};

/// Cancellation token plus optional deadline, threaded through every
/// suspending call. Cloning is cheap and clones share the token.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    /// A context that is cancelled with this one but can also be cancelled
    /// on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(SpcError::Cancelled(operation.to_string()));
        }
        if self.remaining() == Some(Duration::ZERO) {
            return Err(SpcError::timeout(operation, Duration::ZERO));
        }
        Ok(())
    }

    /// Run `fut` bounded by `limit` and the context deadline, whichever is
    /// sooner. Cancellation wins over completion.
    pub async fn run<T, F>(&self, operation: &str, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;
        let budget = match self.remaining() {
            Some(rem) => rem.min(limit),
            None => limit,
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SpcError::Cancelled(operation.to_string())),
            res = tokio::time::timeout(budget, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(SpcError::timeout(operation, budget)),
            },
        }
    }

    /// Sleep that wakes early with `Cancelled`.
    pub async fn sleep(&self, operation: &str, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SpcError::Cancelled(operation.to_string())),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_times_out_with_operation_name() {
        let ctx = OperationContext::new();
        let err = ctx
            .run("probe", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .expect_err("should time out");
        match err {
            SpcError::Timeout { operation, after } => {
                assert_eq!(operation, "probe");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_shortens_limit() {
        let ctx = OperationContext::new().with_timeout(Duration::from_millis(20));
        let err = ctx
            .run("navigation", Duration::from_secs(30), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .expect_err("deadline");
        assert!(matches!(err, SpcError::Timeout { after, .. } if after <= Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = OperationContext::new();
        let child = ctx.child();
        ctx.cancel();
        assert!(child.is_cancelled());
        let err = child
            .run("evaluate", Duration::from_secs(1), async { Ok(1) })
            .await
            .expect_err("cancelled");
        assert!(matches!(err, SpcError::Cancelled(op) if op == "evaluate"));
    }

    #[tokio::test]
    async fn sleep_wakes_on_cancel() {
        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let res = ctx.sleep("backoff", Duration::from_secs(30)).await;
        assert!(matches!(res, Err(SpcError::Cancelled(_))));
    }
}
