//! Interruption of suspended operations.
//!
//! Every call in this crate that can suspend takes an [`Interruptor`]. The
//! core never imposes a timeout of its own: callers that want one race the
//! wait against a timer with [`interrupt_after`].

use crate::error::{ClusterError, ClusterResult};
use std::future::Future;
use std::ops::Deref;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Signal that aborts a suspended operation when fired.
pub type Interruptor = CancellationToken;

/// Drives `fut` to completion unless `interruptor` fires first.
///
/// An interruptor that has already fired wins without polling `fut`.
pub async fn interruptible<F: Future>(fut: F, interruptor: &Interruptor) -> ClusterResult<F::Output> {
    tokio::select! {
        biased;
        () = interruptor.cancelled() => Err(ClusterError::Interrupted),
        out = fut => Ok(out),
    }
}

/// An interruptor that fires on its own once a timer runs out.
///
/// Derefs to the [`Interruptor`] it wraps. Dropping the deadline stops the
/// timer; clones of the token taken before that no longer fire on time.
#[derive(Debug)]
pub struct Deadline {
    token: Interruptor,
    _timer: DropGuard,
}

impl Deref for Deadline {
    type Target = Interruptor;

    fn deref(&self) -> &Interruptor {
        &self.token
    }
}

/// Returns a child of `parent` that also fires once `after` has elapsed.
///
/// Must be called from within a tokio runtime.
pub fn interrupt_after(parent: &Interruptor, after: Duration) -> Deadline {
    let token = parent.child_token();
    let timer = CancellationToken::new();
    let fire = token.clone();
    let stopped = timer.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(after) => fire.cancel(),
            () = fire.cancelled() => {}
            () = stopped.cancelled() => {}
        }
    });
    Deadline {
        token,
        _timer: timer.drop_guard(),
    }
}
