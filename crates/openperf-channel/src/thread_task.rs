// SPDX-License-Identifier: Apache-2.0

//! Runs a non-`Send` async task on a dedicated OS thread with its own
//! single-threaded Tokio runtime, plus a cooperative shutdown signal.
//!
//! Every module server (spec.md section 4.4) and every TVLP worker (section
//! 4.5) is "one OS thread" in the spec's words; this is the one place that
//! pattern is implemented so both crates spawn and shut down their thread the
//! same way.

use std::future::Future;
use std::thread;

use tokio::runtime::Builder as RtBuilder;
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;

use crate::error::ThreadTaskError;

/// Handle to a task running on a dedicated thread.
pub struct ThreadLocalTaskHandle<T, E> {
    cancel_token: CancellationToken,
    join_handle: Option<thread::JoinHandle<Result<T, E>>>,
    name: String,
}

impl<T, E> ThreadLocalTaskHandle<T, E> {
    /// Requests graceful shutdown by cancelling the token. Idempotent.
    pub fn shutdown(&mut self) {
        self.cancel_token.cancel();
    }

    /// Requests shutdown and waits for the thread to exit.
    pub fn shutdown_and_join(mut self) -> Result<T, ThreadTaskError>
    where
        E: Into<ThreadTaskError>,
    {
        self.shutdown();
        match self.join_handle.take().expect("join handle missing").join() {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e.into()),
            Err(panic) => Err(ThreadTaskError::Panic {
                thread_name: self.name.clone(),
                panic_message: panic_message(&panic),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawns a non-`Send` async task on a dedicated OS thread running a
/// single-threaded Tokio runtime with a [`LocalSet`]. Returns a handle to
/// signal shutdown and join.
///
/// `task_factory` receives the [`CancellationToken`] that is cancelled on
/// shutdown; it must observe the token and exit promptly once cancelled.
pub fn spawn_thread_local_task<T, E, Fut, F>(
    thread_name: impl Into<String>,
    task_factory: F,
) -> Result<ThreadLocalTaskHandle<T, E>, ThreadTaskError>
where
    T: Send + 'static,
    E: Send + 'static,
    Fut: 'static + Future<Output = Result<T, E>>,
    F: 'static + Send + FnOnce(CancellationToken) -> Fut,
{
    let name = thread_name.into();
    let name_for_thread = name.clone();
    let token = CancellationToken::new();
    let token_for_task = token.clone();

    let join_handle = thread::Builder::new()
        .name(name_for_thread)
        .spawn(move || {
            let rt = RtBuilder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to create current-thread runtime");
            let local = LocalSet::new();
            let fut = task_factory(token_for_task);
            rt.block_on(local.run_until(fut))
        })
        .map_err(|source| ThreadTaskError::Spawn {
            thread_name: name.clone(),
            source,
        })?;

    Ok(ThreadLocalTaskHandle {
        cancel_token: token,
        join_handle: Some(join_handle),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_runs_and_returns_value() {
        let handle = spawn_thread_local_task::<_, std::convert::Infallible, _, _>("test-task", |_cancel| async {
            Ok(42)
        })
        .unwrap();
        assert_eq!(handle.shutdown_and_join().unwrap(), 42);
    }

    #[test]
    fn cancellation_unblocks_the_task() {
        let handle = spawn_thread_local_task::<_, std::convert::Infallible, _, _>("test-cancel", |cancel| async move {
            cancel.cancelled().await;
            Ok(())
        })
        .unwrap();
        handle.shutdown_and_join().unwrap();
    }
}
