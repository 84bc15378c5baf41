use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns a recurring background loop and guarantees it stops with its owner.
///
/// The loop receives a [`CancellationToken`] and must select on it. Dropping
/// the handle cancels the token and aborts the task, so no iteration runs
/// after the owning surface is torn down, whichever way it exits.
#[derive(Debug)]
pub struct TimerHandle {
    name: &'static str,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(body(cancel.clone()));
        log::debug!("{name} timer started");
        Self {
            name,
            cancel,
            join: Some(join),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.join
            .as_ref()
            .map(|join| !join.is_finished())
            .unwrap_or(false)
    }

    /// Cancels the loop and waits for it to unwind.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                if !err.is_cancelled() {
                    log::warn!("{} timer ended abnormally: {}", self.name, err);
                }
            }
        }
        log::debug!("{} timer stopped", self.name);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
