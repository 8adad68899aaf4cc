use super::polled_after_completion;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future for [`seq`]
    #[project = SeqProj]
    #[project_replace = SeqProjReplace]
    #[must_use = "futures do nothing unless polled"]
    pub enum Seq<A, F, B> {
        First { #[pin] future: A, then: F },
        Second { #[pin] future: B },
        Done,
    }
}

/// Run `first` to completion, then build and run the future `then` makes
/// from its output.
///
/// `first` is dropped before `then` is called, so the second future never
/// exists while the first is still running.
pub fn seq<A, F, B>(first: A, then: F) -> Seq<A, F, B>
where
    A: Future,
    F: FnOnce(A::Output) -> B,
    B: Future,
{
    Seq::First {
        future: first,
        then,
    }
}

impl<A, F, B> Future for Seq<A, F, B>
where
    A: Future,
    F: FnOnce(A::Output) -> B,
    B: Future,
{
    type Output = B::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<B::Output> {
        loop {
            match self.as_mut().project() {
                SeqProj::First { future, .. } => {
                    let value = ready!(future.poll(cx));
                    match self.as_mut().project_replace(Seq::Done) {
                        SeqProjReplace::First { then, .. } => {
                            self.set(Seq::Second {
                                future: then(value),
                            });
                        }
                        _ => unreachable!(),
                    }
                }
                SeqProj::Second { future } => {
                    let output = ready!(future.poll(cx));
                    self.set(Seq::Done);
                    return Poll::Ready(output);
                }
                SeqProj::Done => polled_after_completion(),
            }
        }
    }
}
