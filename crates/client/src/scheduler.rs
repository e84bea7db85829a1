use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

struct ScheduledTask {
    name: String,
    handle: JoinHandle<()>,
}

/// Shared background scheduler for periodic helper work. Tasks run until
/// `shutdown`; dropping the scheduler aborts whatever is still running.
#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `job` on a fixed cadence. The first run happens one period
    /// after scheduling, not immediately.
    pub fn schedule_repeating<F, Fut>(&self, name: &str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first interval tick resolves immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                job().await;
            }
        });
        debug!(task = name, period_ms = period.as_millis() as u64, "scheduled repeating task");
        self.tasks.lock().unwrap().push(ScheduledTask {
            name: task_name,
            handle,
        });
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .map(|task| task.name.clone())
            .collect()
    }

    pub fn shutdown(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            debug!(task = %task.name, "aborting scheduled task");
            task.handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
