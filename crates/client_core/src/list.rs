//! Single-writer owner of a user's section list and its running timers.
//!
//! Every change to the list (load, add, edit, delete, timer ticks and
//! transitions) is a message applied by one task, so no two mutations
//! interleave. Readers get a `watch` snapshot and `ClientEvent`s.

use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::domain::{Section, SectionFields, SectionId, UserId};
use storage::SectionStore;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{
    error::SectionError,
    timers::{Tick, TimerHandle, TICK_PERIOD},
    ClientEvent,
};

const COMMAND_QUEUE_DEPTH: usize = 256;
const EVENT_QUEUE_DEPTH: usize = 1024;

/// Result of a timer request for an existing section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTransition {
    Started,
    AlreadyRunning,
    /// The timer was halted; the counter kept its value.
    Paused { elapsed_seconds: u64 },
    /// Pause requested while no timer was running.
    AlreadyIdle { elapsed_seconds: u64 },
    /// The counter was set back to zero.
    Reset,
}

enum ListCommand {
    Replace {
        sections: Vec<Section>,
        reply: oneshot::Sender<usize>,
    },
    Append {
        section: Section,
        reply: oneshot::Sender<()>,
    },
    UpdateFields {
        section_id: SectionId,
        fields: SectionFields,
        reply: oneshot::Sender<Option<Section>>,
    },
    Remove {
        section_id: SectionId,
        reply: oneshot::Sender<Option<Section>>,
    },
    Start {
        section_id: SectionId,
        reply: oneshot::Sender<Option<TimerTransition>>,
    },
    Stop {
        section_id: SectionId,
        reply: oneshot::Sender<Option<TimerTransition>>,
    },
    Pause {
        section_id: SectionId,
        reply: oneshot::Sender<Option<TimerTransition>>,
    },
    Reset {
        section_id: SectionId,
        reply: oneshot::Sender<Option<TimerTransition>>,
    },
    Running {
        reply: oneshot::Sender<Vec<SectionId>>,
    },
}

/// Handle to the list worker. Cheap to clone; the worker exits once every
/// handle is gone.
#[derive(Clone)]
pub struct SectionList {
    commands: mpsc::Sender<ListCommand>,
    snapshot: watch::Receiver<Vec<Section>>,
    events: broadcast::Sender<ClientEvent>,
}

impl SectionList {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(user_id: UserId, store: Arc<dyn SectionStore>) -> Self {
        Self::spawn_with_period(user_id, store, TICK_PERIOD)
    }

    fn spawn_with_period(
        user_id: UserId,
        store: Arc<dyn SectionStore>,
        tick_period: Duration,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (tick_tx, tick_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (snapshot_tx, snapshot) = watch::channel(Vec::new());
        let (events, _) = broadcast::channel(EVENT_QUEUE_DEPTH);

        let worker = ListWorker {
            user_id,
            store,
            tick_period,
            sections: Vec::new(),
            timers: HashMap::new(),
            next_generation: 0,
            tick_tx,
            snapshot: snapshot_tx,
            events: events.clone(),
        };
        tokio::spawn(worker.run(command_rx, tick_rx));

        Self {
            commands,
            snapshot,
            events,
        }
    }

    pub fn snapshot(&self) -> Vec<Section> {
        self.snapshot.borrow().clone()
    }

    pub fn find(&self, section_id: &SectionId) -> Option<Section> {
        self.snapshot
            .borrow()
            .iter()
            .find(|section| &section.id == section_id)
            .cloned()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Vec<Section>> {
        self.snapshot.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub async fn replace(&self, sections: Vec<Section>) -> Result<usize, SectionError> {
        self.request(|reply| ListCommand::Replace { sections, reply })
            .await
    }

    pub async fn append(&self, section: Section) -> Result<(), SectionError> {
        self.request(|reply| ListCommand::Append { section, reply })
            .await
    }

    pub async fn update_fields(
        &self,
        section_id: &SectionId,
        fields: SectionFields,
    ) -> Result<Option<Section>, SectionError> {
        let section_id = section_id.clone();
        self.request(|reply| ListCommand::UpdateFields {
            section_id,
            fields,
            reply,
        })
        .await
    }

    pub async fn remove(&self, section_id: &SectionId) -> Result<Option<Section>, SectionError> {
        let section_id = section_id.clone();
        self.request(|reply| ListCommand::Remove { section_id, reply })
            .await
    }

    pub async fn start(
        &self,
        section_id: &SectionId,
    ) -> Result<Option<TimerTransition>, SectionError> {
        let section_id = section_id.clone();
        self.request(|reply| ListCommand::Start { section_id, reply })
            .await
    }

    pub async fn stop(
        &self,
        section_id: &SectionId,
    ) -> Result<Option<TimerTransition>, SectionError> {
        let section_id = section_id.clone();
        self.request(|reply| ListCommand::Stop { section_id, reply })
            .await
    }

    pub async fn pause(
        &self,
        section_id: &SectionId,
    ) -> Result<Option<TimerTransition>, SectionError> {
        let section_id = section_id.clone();
        self.request(|reply| ListCommand::Pause { section_id, reply })
            .await
    }

    pub async fn reset(
        &self,
        section_id: &SectionId,
    ) -> Result<Option<TimerTransition>, SectionError> {
        let section_id = section_id.clone();
        self.request(|reply| ListCommand::Reset { section_id, reply })
            .await
    }

    pub async fn running(&self) -> Result<Vec<SectionId>, SectionError> {
        self.request(|reply| ListCommand::Running { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ListCommand,
    ) -> Result<T, SectionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SectionError::Closed)?;
        response.await.map_err(|_| SectionError::Closed)
    }
}

struct ListWorker {
    user_id: UserId,
    store: Arc<dyn SectionStore>,
    tick_period: Duration,
    sections: Vec<Section>,
    timers: HashMap<SectionId, TimerHandle>,
    next_generation: u64,
    tick_tx: mpsc::Sender<Tick>,
    snapshot: watch::Sender<Vec<Section>>,
    events: broadcast::Sender<ClientEvent>,
}

impl ListWorker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ListCommand>,
        mut ticks: mpsc::Receiver<Tick>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(tick) = ticks.recv() => self.on_tick(tick),
            }
        }

        if !self.timers.is_empty() {
            info!(running = self.timers.len(), "section list closed; halting timers");
        }
        self.timers.clear();
    }

    fn handle(&mut self, command: ListCommand) {
        match command {
            ListCommand::Replace { sections, reply } => {
                let _ = reply.send(self.replace(sections));
            }
            ListCommand::Append { section, reply } => {
                self.append(section);
                let _ = reply.send(());
            }
            ListCommand::UpdateFields {
                section_id,
                fields,
                reply,
            } => {
                let _ = reply.send(self.update_fields(&section_id, fields));
            }
            ListCommand::Remove { section_id, reply } => {
                let _ = reply.send(self.remove(&section_id));
            }
            ListCommand::Start { section_id, reply } => {
                let _ = reply.send(self.start(&section_id));
            }
            ListCommand::Stop { section_id, reply } => {
                let _ = reply.send(self.stop(&section_id));
            }
            ListCommand::Pause { section_id, reply } => {
                let _ = reply.send(self.pause(&section_id));
            }
            ListCommand::Reset { section_id, reply } => {
                let _ = reply.send(self.reset(&section_id));
            }
            ListCommand::Running { reply } => {
                let mut running: Vec<_> = self.timers.keys().cloned().collect();
                running.sort();
                let _ = reply.send(running);
            }
        }
    }

    fn position(&self, section_id: &SectionId) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| &section.id == section_id)
    }

    fn replace(&mut self, sections: Vec<Section>) -> usize {
        self.sections = sections;
        let sections = &self.sections;
        self.timers
            .retain(|section_id, _| sections.iter().any(|section| &section.id == section_id));
        let count = self.sections.len();
        self.publish(ClientEvent::Loaded { count });
        count
    }

    fn append(&mut self, section: Section) {
        self.sections.push(section.clone());
        self.publish(ClientEvent::SectionAdded(section));
    }

    fn update_fields(&mut self, section_id: &SectionId, fields: SectionFields) -> Option<Section> {
        let index = self.position(section_id)?;
        let mut updated = self.sections[index].clone();
        updated.apply_fields(fields);
        self.republish(index, updated.clone());
        Some(updated)
    }

    fn remove(&mut self, section_id: &SectionId) -> Option<Section> {
        let index = self.position(section_id)?;
        if self.timers.remove(section_id).is_some() {
            info!(section_id = %section_id, "halted timer of removed section");
        }
        let removed = self.sections.remove(index);
        self.publish(ClientEvent::SectionRemoved {
            section_id: section_id.clone(),
        });
        Some(removed)
    }

    fn start(&mut self, section_id: &SectionId) -> Option<TimerTransition> {
        if self.timers.contains_key(section_id) {
            return Some(TimerTransition::AlreadyRunning);
        }
        self.position(section_id)?;

        self.next_generation += 1;
        let timer = TimerHandle::spawn(
            section_id.clone(),
            self.next_generation,
            self.tick_period,
            self.tick_tx.clone(),
        );
        self.timers.insert(section_id.clone(), timer);
        info!(section_id = %section_id, "timer started");
        self.publish(ClientEvent::TimerStarted {
            section_id: section_id.clone(),
        });
        Some(TimerTransition::Started)
    }

    /// Pauses a running timer; zeroes the counter when none is tracked.
    fn stop(&mut self, section_id: &SectionId) -> Option<TimerTransition> {
        let index = self.position(section_id)?;
        if self.timers.contains_key(section_id) {
            return Some(self.halt(section_id, index));
        }
        self.zero(index);
        Some(TimerTransition::Reset)
    }

    fn pause(&mut self, section_id: &SectionId) -> Option<TimerTransition> {
        let index = self.position(section_id)?;
        if self.timers.contains_key(section_id) {
            return Some(self.halt(section_id, index));
        }
        Some(TimerTransition::AlreadyIdle {
            elapsed_seconds: self.sections[index].elapsed_seconds,
        })
    }

    fn reset(&mut self, section_id: &SectionId) -> Option<TimerTransition> {
        let index = self.position(section_id)?;
        if self.timers.contains_key(section_id) {
            self.halt(section_id, index);
        }
        self.zero(index);
        Some(TimerTransition::Reset)
    }

    fn halt(&mut self, section_id: &SectionId, index: usize) -> TimerTransition {
        self.timers.remove(section_id);
        let elapsed_seconds = self.sections[index].elapsed_seconds;
        info!(section_id = %section_id, elapsed_seconds, "timer stopped");
        self.publish(ClientEvent::TimerStopped {
            section_id: section_id.clone(),
            elapsed_seconds,
        });
        TimerTransition::Paused { elapsed_seconds }
    }

    fn zero(&mut self, index: usize) {
        let mut updated = self.sections[index].clone();
        updated.elapsed_seconds = 0;
        info!(section_id = %updated.id, "elapsed time reset");
        self.republish(index, updated);
    }

    fn on_tick(&mut self, tick: Tick) {
        let current = self
            .timers
            .get(&tick.section_id)
            .is_some_and(|timer| timer.generation == tick.generation);
        if !current {
            debug!(section_id = %tick.section_id, "dropping tick of a halted timer");
            return;
        }
        let Some(index) = self.position(&tick.section_id) else {
            self.timers.remove(&tick.section_id);
            return;
        };

        let mut updated = self.sections[index].clone();
        updated.elapsed_seconds += 1;
        debug!(section_id = %updated.id, elapsed_seconds = updated.elapsed_seconds, "tick");
        self.spawn_persist(updated.id.clone(), updated.elapsed_seconds);
        self.republish(index, updated);
    }

    /// Swaps in a new value at `index` so observers see a replaced entry.
    fn republish(&mut self, index: usize, section: Section) {
        self.sections[index] = section.clone();
        self.publish(ClientEvent::SectionReplaced { index, section });
    }

    fn publish(&self, event: ClientEvent) {
        self.snapshot.send_replace(self.sections.clone());
        let _ = self.events.send(event);
    }

    fn spawn_persist(&self, section_id: SectionId, elapsed_seconds: u64) {
        let store = Arc::clone(&self.store);
        let user_id = self.user_id.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(err) = store
                .update_elapsed_time(&user_id, &section_id, elapsed_seconds)
                .await
            {
                warn!(section_id = %section_id, elapsed_seconds, error = %format!("{err:#}"), "failed to persist elapsed time");
                let _ = events.send(ClientEvent::PersistFailed {
                    section_id,
                    message: format!("{err:#}"),
                });
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
