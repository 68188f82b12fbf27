/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Dedicated thread hosting the shared scheduled-task tokio runtime.

use crate::observability::{events, fields};
use std::io;
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub(crate) const DEFAULT_SCHEDULER_THREAD_NAME: &str = "msg-scheduler";
const SCHEDULER_THREAD_NAME_MAX_LEN: usize = 15;
const SCHEDULER_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);
const COMPONENT: &str = "scheduler_runtime";

/// Owns a multi-thread runtime living on its own named OS thread.
///
/// Dropping or calling [`SchedulerRuntime::shutdown`] stops the runtime; tasks still
/// pending at that point are cancelled.
pub struct SchedulerRuntime {
    handle: Handle,
    thread_name: String,
    shutdown_signal: Mutex<Option<oneshot::Sender<()>>>,
}

impl SchedulerRuntime {
    /// Spawns the runtime thread and waits until the runtime is ready.
    pub fn spawn(thread_name: &str, worker_threads: usize) -> io::Result<Self> {
        let thread_name = Self::sanitize_thread_name(thread_name);
        let worker_threads = worker_threads.max(1);
        let (handle_tx, handle_rx) = mpsc::channel::<io::Result<Handle>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        debug!(
            event = events::RUNTIME_SPAWN_START,
            component = COMPONENT,
            thread_name = thread_name.as_str(),
            worker_threads,
            "spawning scheduler runtime"
        );

        let runtime_thread_name = thread_name.clone();
        let spawn_result = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let runtime = match Builder::new_multi_thread()
                    .worker_threads(worker_threads)
                    .thread_name(runtime_thread_name.clone())
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = handle_tx.send(Err(err));
                        return;
                    }
                };

                if handle_tx.send(Ok(runtime.handle().clone())).is_err() {
                    return;
                }

                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                runtime.shutdown_timeout(SCHEDULER_SHUTDOWN_TIMEOUT);

                info!(
                    event = events::RUNTIME_STOPPED,
                    component = COMPONENT,
                    thread_name = runtime_thread_name.as_str(),
                    "scheduler runtime stopped"
                );
            });

        if let Err(err) = spawn_result {
            warn!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                thread_name = thread_name.as_str(),
                err = %err,
                "unable to spawn scheduler thread"
            );
            return Err(err);
        }

        let handle = match handle_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(err)) => {
                warn!(
                    event = events::RUNTIME_SPAWN_FAILED,
                    component = COMPONENT,
                    thread_name = thread_name.as_str(),
                    err = %err,
                    "unable to build scheduler runtime"
                );
                return Err(err);
            }
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "scheduler thread exited before the runtime was ready",
                ))
            }
        };

        debug!(
            event = events::RUNTIME_SPAWN_OK,
            component = COMPONENT,
            thread_name = thread_name.as_str(),
            "scheduler runtime ready"
        );

        Ok(Self {
            handle,
            thread_name,
            shutdown_signal: Mutex::new(Some(shutdown_tx)),
        })
    }

    /// Handle used to spawn and schedule tasks onto the runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Signals the runtime thread to stop. Idempotent.
    pub fn shutdown(&self) {
        let signal = match self.shutdown_signal.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(signal) = signal {
            let _ = signal.send(());
        }
    }

    pub fn is_shut_down(&self) -> bool {
        match self.shutdown_signal.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    fn sanitize_thread_name(thread_name: &str) -> String {
        let candidate: String = thread_name
            .chars()
            .filter(|ch| ch.is_ascii_graphic())
            .take(SCHEDULER_THREAD_NAME_MAX_LEN)
            .collect();

        if candidate.is_empty() {
            warn!(
                event = events::RUNTIME_THREAD_NAME_FALLBACK,
                component = COMPONENT,
                reason = fields::REASON_INVALID_THREAD_NAME,
                fallback = DEFAULT_SCHEDULER_THREAD_NAME,
                "invalid scheduler thread name, using fallback"
            );
            DEFAULT_SCHEDULER_THREAD_NAME.to_string()
        } else {
            candidate
        }
    }
}

impl Drop for SchedulerRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::{SchedulerRuntime, DEFAULT_SCHEDULER_THREAD_NAME, SCHEDULER_THREAD_NAME_MAX_LEN};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn spawned_runtime_executes_tasks() {
        let runtime = SchedulerRuntime::spawn("sched-test", 1).expect("runtime should spawn");
        let (tx, rx) = mpsc::channel();

        runtime.handle().spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = tx.send(42);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(42));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let runtime = SchedulerRuntime::spawn("sched-stop", 1).expect("runtime should spawn");

        assert!(!runtime.is_shut_down());
        runtime.shutdown();
        runtime.shutdown();
        assert!(runtime.is_shut_down());
    }

    #[test]
    fn thread_name_is_truncated_to_linux_limit() {
        let name = SchedulerRuntime::sanitize_thread_name("a-very-long-scheduler-thread-name");

        assert_eq!(name.len(), SCHEDULER_THREAD_NAME_MAX_LEN);
        assert!(name.starts_with("a-very-long"));
    }

    #[test]
    fn blank_thread_name_uses_fallback() {
        assert_eq!(
            SchedulerRuntime::sanitize_thread_name("   "),
            DEFAULT_SCHEDULER_THREAD_NAME
        );
    }
}
