use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a periodic background job. Dropping it or calling `stop` ends
/// the loop, abandoning a run that is still waiting on the network.
pub struct PollHandle {
    name: &'static str,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the job and wait for its loop to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            crate::warn_log!("{}: poll task ended abnormally: {}", self.name, e);
        }
    }
}

/// Run `job` immediately, then once per `period`, until the handle is stopped or dropped.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut job: F) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // A slow fetch pushes the schedule back instead of bursting to catch up
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        crate::debug_log!("{}: polling every {:?}", name, period);

        loop {
            // The stop signal also wins over a run in progress
            tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    crate::debug_log!("{}: stopped", name);
                    break;
                }
                _ = async {
                    interval.tick().await;
                    job().await;
                } => {}
            }
        }
    });

    PollHandle {
        name,
        stop: Some(stop_tx),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = spawn_periodic("test", Duration::from_secs(10), counting_job(counter.clone()));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // ticks at 10s and 20s
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = spawn_periodic("test", Duration::from_secs(10), counting_job(counter.clone()));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_while_a_run_hangs() {
        let handle = spawn_periodic("hung", Duration::from_secs(10), || {
            std::future::pending::<()>()
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(300), handle.stop()).await;
        assert!(stopped.is_ok(), "stop() waited on a run that never finishes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_future_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = spawn_periodic("test", Duration::from_secs(10), counting_job(counter.clone()));
        tokio::time::sleep(Duration::from_millis(1)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
