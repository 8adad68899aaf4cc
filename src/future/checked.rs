use crate::error::RuntimeError;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future for [`checked`]
    #[must_use = "futures do nothing unless polled"]
    pub struct Checked<F> {
        #[pin]
        future: F,
        finished: bool,
    }
}

/// Guard against polling after completion
///
/// Resolves to `Ok(output)` once; any later poll resolves to
/// `Err(RuntimeError::PolledAfterCompletion)` without touching the inner
/// future.
pub fn checked<F: Future>(future: F) -> Checked<F> {
    Checked {
        future,
        finished: false,
    }
}

impl<F: Future> Future for Checked<F> {
    type Output = Result<F::Output, RuntimeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(Err(RuntimeError::PolledAfterCompletion));
        }
        let output = ready!(this.future.poll(cx));
        *this.finished = true;
        Poll::Ready(Ok(output))
    }
}
