mod batch;
mod compare;

use std::sync::Arc;

use spc_lib::{BrowserDriver, OperationContext, SpcError};
use tracing::warn;

pub use batch::run_batch_command;
pub use compare::run_compare;

/// Browser backend compiled into this binary.
fn browser_driver() -> Result<Arc<dyn BrowserDriver>, SpcError> {
    #[cfg(feature = "chromium")]
    {
        Ok(Arc::new(spc_lib::ChromiumDriver::new()))
    }
    #[cfg(not(feature = "chromium"))]
    {
        Err(SpcError::Config(
            "spc was built without a browser backend; rebuild with --features chromium".to_string(),
        ))
    }
}

/// Root context for a command; Ctrl-C cancels every operation under it.
fn interruptible_context() -> OperationContext {
    let ctx = OperationContext::new();
    let handle = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            handle.cancel();
        }
    });
    ctx
}
