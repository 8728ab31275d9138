//! Long-running [`Task`]s living alongside the [`Service`].
//!
//! [`Service`]: crate::Service

use std::{
    error::Error,
    fmt,
    future::{Future, IntoFuture},
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _,
};
use tokio::task::{self, JoinHandle};
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Set of named [`Task`]s driven on the current thread.
///
/// Nothing runs until the [`Background`] itself is awaited, which resolves
/// once every [`Task`] finishes or the first one fails.
#[derive(Debug, Default)]
pub struct Background {
    /// Thread-local executor of the spawned [`Task`]s.
    set: task::LocalSet,

    /// Spawned [`Task`]s along with their names.
    tasks: Vec<(&'static str, JoinHandle<Result<(), Box<dyn Error>>>)>,
}

impl Background {
    /// Spawns the provided `future` as a [`Task`] identified by `name`.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        let handle = self.set.spawn_local(async move {
            future.await.map_err(|e| -> Box<dyn Error> { Box::new(e) })
        });
        self.tasks.push((name, handle));
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Failure>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;
        let all = future::try_join_all(tasks.into_iter().map(|(name, h)| {
            h.map(move |res| {
                let cause: Box<dyn Error> = match res {
                    Ok(Ok(())) => return Ok(()),
                    Ok(Err(e)) => e,
                    Err(e) => Box::new(e),
                };
                log::error!(task = name, "background task failed: {cause}");
                Err(Failure { task: name, cause })
            })
        }));
        async move { set.run_until(all).await.map(drop) }.boxed_local()
    }
}

/// Failure of a [`Background`] [`Task`].
#[derive(Debug)]
pub struct Failure {
    /// Name of the failed [`Task`].
    pub task: &'static str,

    /// Error the [`Task`] failed with.
    pub cause: Box<dyn Error>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` task failed: {}", self.task, self.cause)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.cause)
    }
}

#[cfg(test)]
mod spec {
    use std::io;

    use super::Background;

    #[tokio::test]
    async fn resolves_once_all_tasks_finish() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, io::Error>(()) });
        bg.spawn("second", async { Ok::<_, io::Error>(()) });

        assert!(bg.await.is_ok());
    }

    #[tokio::test]
    async fn reports_failed_task_by_name() {
        let mut bg = Background::default();
        bg.spawn("fine", async { Ok::<_, io::Error>(()) });
        bg.spawn("broken", async {
            Err::<(), _>(io::Error::other("boom"))
        });

        let failure = bg.await.unwrap_err();
        assert_eq!(failure.task, "broken");
        assert_eq!(failure.to_string(), "`broken` task failed: boom");
    }
}
