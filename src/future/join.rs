use super::polled_after_completion;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A future that keeps its output once ready
    #[project = MaybeDoneProj]
    #[project_replace = MaybeDoneProjReplace]
    pub enum MaybeDone<F: Future> {
        Running { #[pin] future: F },
        Done { output: F::Output },
        Gone,
    }
}

impl<F: Future> MaybeDone<F> {
    pub fn new(future: F) -> Self {
        MaybeDone::Running { future }
    }

    /// Poll the inner future if it is still running.
    /// Returns true once there is nothing left to poll.
    pub fn poll_done(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> bool {
        match self.as_mut().project() {
            MaybeDoneProj::Running { future } => match future.poll(cx) {
                Poll::Ready(output) => {
                    self.set(MaybeDone::Done { output });
                    true
                }
                Poll::Pending => false,
            },
            MaybeDoneProj::Done { .. } | MaybeDoneProj::Gone => true,
        }
    }

    /// Move the output out, leaving `Gone`
    pub fn take_output(mut self: Pin<&mut Self>) -> Option<F::Output> {
        match self.as_mut().project() {
            MaybeDoneProj::Done { .. } => {}
            _ => return None,
        }
        match self.project_replace(MaybeDone::Gone) {
            MaybeDoneProjReplace::Done { output } => Some(output),
            _ => None,
        }
    }
}

pin_project! {
    /// Future for [`join`]
    #[must_use = "futures do nothing unless polled"]
    pub struct Join<A: Future, B: Future> {
        #[pin]
        a: MaybeDone<A>,
        #[pin]
        b: MaybeDone<B>,
    }
}

/// Wait for both futures, polling them in argument order
///
/// Each poll of the join polls every input that is not yet ready, `a`
/// first. It is ready only when both are.
pub fn join<A: Future, B: Future>(a: A, b: B) -> Join<A, B> {
    Join {
        a: MaybeDone::new(a),
        b: MaybeDone::new(b),
    }
}

impl<A: Future, B: Future> Future for Join<A, B> {
    type Output = (A::Output, B::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        let mut all_done = true;
        all_done &= this.a.as_mut().poll_done(cx);
        all_done &= this.b.as_mut().poll_done(cx);
        if !all_done {
            return Poll::Pending;
        }

        match (this.a.take_output(), this.b.take_output()) {
            (Some(a), Some(b)) => Poll::Ready((a, b)),
            _ => polled_after_completion(),
        }
    }
}

pin_project! {
    /// Future for [`join3`]
    #[must_use = "futures do nothing unless polled"]
    pub struct Join3<A: Future, B: Future, C: Future> {
        #[pin]
        a: MaybeDone<A>,
        #[pin]
        b: MaybeDone<B>,
        #[pin]
        c: MaybeDone<C>,
    }
}

/// Three-way [`join`]
pub fn join3<A: Future, B: Future, C: Future>(a: A, b: B, c: C) -> Join3<A, B, C> {
    Join3 {
        a: MaybeDone::new(a),
        b: MaybeDone::new(b),
        c: MaybeDone::new(c),
    }
}

impl<A: Future, B: Future, C: Future> Future for Join3<A, B, C> {
    type Output = (A::Output, B::Output, C::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        let mut all_done = true;
        all_done &= this.a.as_mut().poll_done(cx);
        all_done &= this.b.as_mut().poll_done(cx);
        all_done &= this.c.as_mut().poll_done(cx);
        if !all_done {
            return Poll::Pending;
        }

        match (
            this.a.take_output(),
            this.b.take_output(),
            this.c.take_output(),
        ) {
            (Some(a), Some(b), Some(c)) => Poll::Ready((a, b, c)),
            _ => polled_after_completion(),
        }
    }
}

/// Future for [`join_all`]
#[must_use = "futures do nothing unless polled"]
pub struct JoinAll<F: Future> {
    elems: Vec<Pin<Box<MaybeDone<F>>>>,
    finished: bool,
}

/// Wait for every future in the collection; outputs keep input order
pub fn join_all<I>(futures: I) -> JoinAll<I::Item>
where
    I: IntoIterator,
    I::Item: Future,
{
    JoinAll {
        elems: futures
            .into_iter()
            .map(|f| Box::pin(MaybeDone::new(f)))
            .collect(),
        finished: false,
    }
}

impl<F: Future> Future for JoinAll<F> {
    type Output = Vec<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.finished {
            polled_after_completion();
        }

        let mut all_done = true;
        for elem in this.elems.iter_mut() {
            all_done &= elem.as_mut().poll_done(cx);
        }
        if !all_done {
            return Poll::Pending;
        }

        this.finished = true;
        let outputs: Option<Vec<F::Output>> = this
            .elems
            .iter_mut()
            .map(|elem| elem.as_mut().take_output())
            .collect();
        match outputs {
            Some(outputs) => Poll::Ready(outputs),
            None => polled_after_completion(),
        }
    }
}
