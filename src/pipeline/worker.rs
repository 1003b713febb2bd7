//! One worker thread per component.
//!
//! Each worker owns its component slot and an event channel. Input ports are
//! re-attached to the owning worker's channel, so a write crossing threads
//! lands in the consumer's port buffer and its notification in the
//! consumer's queue. Lifecycle requests travel on the same channel and are
//! served between handler invocations, so a stop waits for an in-flight
//! handler to return.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::executor::Pipeline;
use crate::pipeline::handler::JoinMode;
use crate::pipeline::lifecycle::{LifecycleState, Transition};
use crate::pipeline::signal::Signal;
use crate::pipeline::slot::ComponentSlot;
use crate::pipeline::snapshot::ConnectionSnapshot;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::JoinHandle;

struct Worker {
    name: String,
    events: Sender<Signal>,
    handle: Option<JoinHandle<ComponentSlot>>,
}

/// A pipeline whose components each run on a dedicated thread.
pub struct ThreadedPipeline {
    workers: Vec<Worker>,
    connections: Vec<ConnectionSnapshot>,
    default_join: JoinMode,
}

impl std::fmt::Debug for ThreadedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedPipeline")
            .field("workers", &self.component_names().collect::<Vec<_>>())
            .finish()
    }
}

impl ThreadedPipeline {
    pub(crate) fn spawn(pipeline: Pipeline) -> PipelineResult<Self> {
        let Pipeline {
            slots,
            connections,
            events_rx,
            default_join,
            ..
        } = pipeline;

        let channels: Vec<(Sender<Signal>, Receiver<Signal>)> =
            slots.iter().map(|_| unbounded()).collect();

        // Every port must report to its worker before any worker runs, or
        // a running producer could notify a consumer through the old queue.
        for (slot, (tx, _)) in slots.iter().zip(&channels) {
            slot.attach(tx);
        }

        // Notifications raised before the move still belong to their owners.
        for signal in events_rx.try_iter() {
            match signal {
                Signal::Data(port) => {
                    if let Some((tx, _)) = channels.get(port.component().index()) {
                        let _ = tx.send(Signal::Data(port));
                    }
                }
                _ => tracing::debug!("Dropping queued control signal while spawning workers"),
            }
        }

        let mut workers = Vec::with_capacity(slots.len());
        for (slot, (tx, rx)) in slots.into_iter().zip(channels) {
            let name = slot.name.clone();
            let handle = std::thread::Builder::new()
                .name(format!("visflow-{}", name))
                .spawn(move || run_worker(slot, rx))
                .map_err(|e| {
                    tracing::error!("Failed to spawn worker for '{}': {}", name, e);
                    PipelineError::WorkerPanicked(name.clone())
                })?;
            workers.push(Worker {
                name,
                events: tx,
                handle: Some(handle),
            });
        }

        tracing::info!("Spawned {} component workers", workers.len());
        Ok(Self {
            workers,
            connections,
            default_join,
        })
    }

    fn worker(&self, component: &str) -> PipelineResult<&Worker> {
        self.workers
            .iter()
            .find(|w| w.name == component)
            .ok_or_else(|| PipelineError::UnknownComponent(component.to_string()))
    }

    /// Ask a worker to apply `transition` and wait for the outcome.
    pub fn transition(
        &self,
        component: &str,
        transition: Transition,
    ) -> PipelineResult<LifecycleState> {
        let worker = self.worker(component)?;
        let (reply_tx, reply_rx) = bounded(1);
        worker
            .events
            .send(Signal::Control {
                component: component.to_string(),
                transition,
                reply: Some(reply_tx),
            })
            .map_err(|_| PipelineError::ChannelSend)?;
        reply_rx.recv().map_err(|_| PipelineError::ChannelRecv)?
    }

    pub fn init(&self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Init)
    }

    pub fn start(&self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Start)
    }

    pub fn stop(&self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Stop)
    }

    pub fn finish(&self, component: &str) -> PipelineResult<LifecycleState> {
        self.transition(component, Transition::Finish)
    }

    /// Apply `transition` to every component; the first error is returned
    /// after all have been attempted.
    pub fn transition_all(&self, transition: Transition) -> PipelineResult<()> {
        let mut first_err = None;
        for worker in &self.workers {
            if let Err(e) = self.transition(&worker.name, transition) {
                tracing::warn!("Component '{}': {}", worker.name, e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Queue a direct handler invocation. Failures are logged by the worker.
    pub fn trigger(&self, component: &str, handler: &str) -> PipelineResult<()> {
        self.worker(component)?
            .events
            .send(Signal::Trigger {
                component: component.to_string(),
                handler: handler.to_string(),
            })
            .map_err(|_| PipelineError::ChannelSend)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|w| w.name.as_str())
    }

    /// Stop every worker and reassemble the single-threaded pipeline.
    ///
    /// Each worker moves its ports onto the returned pipeline's channel
    /// before it exits, so notifications that are still queued, or raised
    /// by workers that have not stopped yet, are served by the returned
    /// pipeline.
    pub fn shutdown(mut self) -> PipelineResult<Pipeline> {
        let (events_tx, events_rx) = unbounded();
        let workers = std::mem::take(&mut self.workers);
        for worker in &workers {
            let _ = worker.events.send(Signal::Handover(events_tx.clone()));
        }

        let mut slots = Vec::with_capacity(workers.len());
        let mut first_err = None;
        for mut worker in workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            match handle.join() {
                Ok(slot) => slots.push(slot),
                Err(_) => {
                    tracing::error!("Worker for '{}' panicked", worker.name);
                    if first_err.is_none() {
                        first_err = Some(PipelineError::WorkerPanicked(worker.name.clone()));
                    }
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        let pipeline = Pipeline::from_parts(
            slots,
            std::mem::take(&mut self.connections),
            self.default_join,
            (events_tx, events_rx),
        );
        tracing::info!(
            "Component workers joined, {} events carried over",
            pipeline.pending()
        );
        Ok(pipeline)
    }
}

impl Drop for ThreadedPipeline {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.events.send(Signal::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_worker(mut slot: ComponentSlot, events: Receiver<Signal>) -> ComponentSlot {
    tracing::debug!("Worker '{}' started", slot.name);
    while let Ok(signal) = events.recv() {
        match signal {
            Signal::Data(port) => {
                slot.on_data(port);
            }
            Signal::Control {
                transition, reply, ..
            } => {
                let result = slot.transition(transition);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            tracing::error!("{}", e);
                        }
                    }
                }
            }
            Signal::Trigger { handler, .. } => {
                if let Err(e) = slot.trigger(&handler) {
                    tracing::warn!("Trigger '{}.{}': {}", slot.name, handler, e);
                }
            }
            Signal::Handover(target) => {
                // Re-attaching takes each port's notifier lock, so every
                // notification is either already queued here or goes to
                // `target`.
                slot.attach(&target);
                let mut moved = 0usize;
                for signal in events.try_iter() {
                    if let Signal::Data(port) = signal {
                        let _ = target.send(Signal::Data(port));
                        moved += 1;
                    }
                }
                tracing::debug!("Worker '{}' handed over {} events", slot.name, moved);
                break;
            }
            Signal::Shutdown => break,
        }
    }
    tracing::debug!("Worker '{}' stopped", slot.name);
    slot
}
