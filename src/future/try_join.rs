//! Joins over fallible futures
//!
//! These never short-circuit: every input runs to completion before the
//! first error (in argument order) is returned.

use super::join::{Join, JoinAll, join, join_all};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future for [`try_join`]
    #[must_use = "futures do nothing unless polled"]
    pub struct TryJoin<A: Future, B: Future> {
        #[pin]
        inner: Join<A, B>,
    }
}

/// Wait for both fallible futures, then return the first error or both values
pub fn try_join<A, B, T1, T2, E>(a: A, b: B) -> TryJoin<A, B>
where
    A: Future<Output = Result<T1, E>>,
    B: Future<Output = Result<T2, E>>,
{
    TryJoin { inner: join(a, b) }
}

impl<A, B, T1, T2, E> Future for TryJoin<A, B>
where
    A: Future<Output = Result<T1, E>>,
    B: Future<Output = Result<T2, E>>,
{
    type Output = Result<(T1, T2), E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outputs = ready!(self.project().inner.poll(cx));
        Poll::Ready(match outputs {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        })
    }
}

/// Future for [`try_join_all`]
#[must_use = "futures do nothing unless polled"]
pub struct TryJoinAll<F: Future> {
    inner: JoinAll<F>,
}

/// Wait for every fallible future, then return the first error in input
/// order or all values
pub fn try_join_all<I, T, E>(futures: I) -> TryJoinAll<I::Item>
where
    I: IntoIterator,
    I::Item: Future<Output = Result<T, E>>,
{
    TryJoinAll {
        inner: join_all(futures),
    }
}

impl<F, T, E> Future for TryJoinAll<F>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = Result<Vec<T>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outputs = ready!(Pin::new(&mut self.get_mut().inner).poll(cx));
        Poll::Ready(outputs.into_iter().collect())
    }
}
