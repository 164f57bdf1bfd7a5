// perilgrid-worker/src/pool.rs
// ============================================================================
// Module: Worker Pool
// Description: Parallel task claim loop with at-least-once semantics.
// Purpose: Dispatch queued tasks to registered handlers.
// Dependencies: perilgrid-core, perilgrid-config
// ============================================================================

//! ## Overview
//! The pool spawns worker threads that claim tasks FIFO, load the run, and
//! dispatch to the handler registered for its run type. Redelivered tasks
//! whose run is already terminal complete immediately; stale claims from
//! dead workers are periodically released back to the queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use perilgrid_config::WorkerConfig;
use perilgrid_core::AuditEvent;
use perilgrid_core::AuditEventId;
use perilgrid_core::QueuedTask;
use perilgrid_core::RunStatus;
use perilgrid_core::StoreError;
use serde_json::json;

use crate::context::HandlerError;
use crate::context::RunHandler;
use crate::context::WorkerContext;

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Parallel worker pool over the durable queue.
pub struct WorkerPool {
    /// Shared handler registry keyed by run type.
    handlers: Arc<BTreeMap<&'static str, Box<dyn RunHandler>>>,
    /// Shared context.
    context: WorkerContext,
    /// Pool configuration.
    config: WorkerConfig,
    /// Cooperative stop flag.
    stop: Arc<AtomicBool>,
    /// Running worker threads.
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool with the given handlers.
    #[must_use]
    pub fn new(
        handlers: Vec<Box<dyn RunHandler>>,
        context: WorkerContext,
        config: WorkerConfig,
    ) -> Self {
        let mut registry: BTreeMap<&'static str, Box<dyn RunHandler>> = BTreeMap::new();
        for handler in handlers {
            registry.insert(handler.run_type().as_str(), handler);
        }
        Self {
            handlers: Arc::new(registry),
            context,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    /// Spawns the worker threads.
    pub fn start(&mut self) {
        for index in 0..self.config.workers {
            let handlers = Arc::clone(&self.handlers);
            let context = self.context.clone();
            let config = self.config;
            let stop = Arc::clone(&self.stop);
            let name = format!("perilgrid-worker-{index}");
            let handle = std::thread::spawn(move || {
                worker_loop(&name, &handlers, &context, config, &stop);
            });
            self.threads.push(handle);
        }
    }

    /// Requests shutdown and joins the worker threads.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        while let Some(handle) = self.threads.pop() {
            // A panicked worker thread already surfaced its failure.
            drop(handle.join());
        }
    }

    /// Processes at most one queued task on the calling thread.
    ///
    /// Drives tests and single-threaded deployments without the pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the queue claim fails.
    pub fn run_one(&self, worker: &str) -> Result<bool, StoreError> {
        let now = self.context.clock.now();
        match self.context.store.claim_next(worker, now)? {
            None => Ok(false),
            Some(task) => {
                process_task(&task, &self.handlers, &self.context);
                Ok(true)
            }
        }
    }
}

// ============================================================================
// SECTION: Worker Loop
// ============================================================================

/// Claim-dispatch loop for one worker thread.
fn worker_loop(
    name: &str,
    handlers: &BTreeMap<&'static str, Box<dyn RunHandler>>,
    context: &WorkerContext,
    config: WorkerConfig,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        let now = context.clock.now();
        let stale_cutoff = now.plus_millis(-config.stale_claim_ms);
        // Dead-worker claims are released so delivery stays at-least-once.
        drop(context.store.release_stale(stale_cutoff));
        match context.store.claim_next(name, now) {
            Ok(Some(task)) => process_task(&task, handlers, context),
            Ok(None) => {
                std::thread::sleep(Duration::from_millis(config.poll_interval_ms));
            }
            Err(_) => {
                std::thread::sleep(Duration::from_millis(config.poll_interval_ms));
            }
        }
    }
}

/// Executes one claimed task through its handler.
fn process_task(
    task: &QueuedTask,
    handlers: &BTreeMap<&'static str, Box<dyn RunHandler>>,
    context: &WorkerContext,
) {
    let registry = context.registry();
    let Ok(Some(mut run)) = context.store.run(&task.tenant_id, task.run_id) else {
        drop(context.store.complete(task.id));
        return;
    };
    // At-least-once redelivery: terminal runs complete without re-execution.
    if !matches!(run.status, RunStatus::Queued | RunStatus::Running) {
        drop(context.store.complete(task.id));
        return;
    }
    if registry.begin(&mut run, task.request_id.as_ref()).is_err() {
        drop(context.store.complete(task.id));
        return;
    }

    let handler = handlers.get(run.run_type.as_str());
    let outcome = match handler {
        Some(handler) => handler.execute(&mut run, context),
        None => Err(HandlerError::Invalid(format!(
            "no handler registered for {}",
            run.run_type.as_str()
        ))),
    };

    match outcome {
        Ok(outcome) => {
            drop(
                registry
                    .complete_success(&mut run, outcome.output_refs, outcome.artifact_checksums),
            );
        }
        Err(HandlerError::Cancelled) => {
            // The control plane already flipped the run to CANCELLED.
        }
        Err(err) => {
            record_failure(context, task, &err);
            drop(registry.complete_failure(&mut run));
        }
    }
    drop(context.store.complete(task.id));
}

/// Appends an audit event describing a task failure.
fn record_failure(context: &WorkerContext, task: &QueuedTask, err: &HandlerError) {
    let event = AuditEvent {
        id: AuditEventId::new(0),
        tenant_id: task.tenant_id.clone(),
        user_id: None,
        action: "run_failed".to_string(),
        metadata: json!({
            "run_id": task.run_id,
            "run_type": task.run_type.as_str(),
            "error": err.to_string(),
        }),
        request_id: task.request_id.clone(),
        created_at: context.clock.now(),
    };
    drop(context.store.append_audit_event(&event));
}
