use std::time::Duration;

use shared::domain::SectionId;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tick {
    pub section_id: SectionId,
    pub generation: u64,
}

/// Periodic trigger for one section. Dropping the handle halts it.
pub(crate) struct TimerHandle {
    pub generation: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn spawn(
        section_id: SectionId,
        generation: u64,
        period: Duration,
        ticks: mpsc::Sender<Tick>,
    ) -> Self {
        let task = tokio::spawn(async move {
            // first firing one period after start, not immediately
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let tick = Tick {
                    section_id: section_id.clone(),
                    generation,
                };
                if ticks.send(tick).await.is_err() {
                    break;
                }
            }
        });

        Self { generation, task }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
