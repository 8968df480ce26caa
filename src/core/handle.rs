//! # SupervisorHandle: async front door to the supervisor loop.
//!
//! Every call becomes a [`Command`] carrying a `oneshot` reply channel. The loop
//! applies commands to the [`Engine`] one at a time, so callers never share state
//! with the message path.
//!
//! ```text
//! handle.add("welder", true) ──► mpsc<Command> ──► loop: cmd.apply(&mut engine)
//!          ▲                                                   │
//!          └──────────────── oneshot reply ◄───────────────────┘
//! ```
//!
//! Every method fails with [`SupervisorError::Closed`] once the loop is gone.

use std::collections::BTreeSet;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::alerts::Alert;
use crate::core::active::{SupervisedUnit, Telemetry};
use crate::core::engine::Engine;
use crate::error::SupervisorError;
use crate::units::{RunState, UnitDescriptor};

type Reply<T> = oneshot::Sender<T>;

/// Request for the supervisor loop.
pub(crate) enum Command {
    Register {
        raw: Value,
        reply: Reply<Result<UnitDescriptor, SupervisorError>>,
    },
    RegisterDescriptor {
        desc: UnitDescriptor,
        reply: Reply<UnitDescriptor>,
    },
    Unregister {
        unit: String,
        reply: Reply<bool>,
    },
    Add {
        unit: String,
        start_running: bool,
        reply: Reply<Result<SupervisedUnit, SupervisorError>>,
    },
    Remove {
        unit: String,
        reply: Reply<bool>,
    },
    SetRunState {
        unit: String,
        target: RunState,
        reply: Reply<Result<(), SupervisorError>>,
    },
    Unplug {
        unit: String,
        reply: Reply<Result<(), SupervisorError>>,
    },
    Acknowledge {
        id: String,
        reply: Reply<usize>,
    },
    ClearAlerts {
        reply: Reply<usize>,
    },
    Names {
        reply: Reply<Vec<String>>,
    },
    Units {
        reply: Reply<Vec<SupervisedUnit>>,
    },
    Unit {
        unit: String,
        reply: Reply<Option<SupervisedUnit>>,
    },
    Alerts {
        reply: Reply<Vec<Alert>>,
    },
    Telemetry {
        unit: String,
        reply: Reply<Option<Telemetry>>,
    },
    Overview {
        reply: Reply<Vec<String>>,
    },
    Subscribed {
        reply: Reply<BTreeSet<String>>,
    },
}

impl Command {
    /// Runs the command and answers the caller. A caller that stopped waiting is ignored.
    pub(crate) fn apply(self, engine: &mut Engine) {
        match self {
            Command::Register { raw, reply } => {
                let _ = reply.send(engine.register(&raw));
            }
            Command::RegisterDescriptor { desc, reply } => {
                let _ = reply.send(engine.register_descriptor(desc));
            }
            Command::Unregister { unit, reply } => {
                let _ = reply.send(engine.unregister(&unit));
            }
            Command::Add {
                unit,
                start_running,
                reply,
            } => {
                let _ = reply.send(engine.add(&unit, start_running));
            }
            Command::Remove { unit, reply } => {
                let _ = reply.send(engine.remove(&unit));
            }
            Command::SetRunState {
                unit,
                target,
                reply,
            } => {
                let _ = reply.send(engine.set_run_state(&unit, target));
            }
            Command::Unplug { unit, reply } => {
                let _ = reply.send(engine.unplug(&unit));
            }
            Command::Acknowledge { id, reply } => {
                let _ = reply.send(engine.acknowledge(&id));
            }
            Command::ClearAlerts { reply } => {
                let _ = reply.send(engine.clear_alerts());
            }
            Command::Names { reply } => {
                let _ = reply.send(engine.names());
            }
            Command::Units { reply } => {
                let _ = reply.send(engine.units());
            }
            Command::Unit { unit, reply } => {
                let _ = reply.send(engine.unit(&unit));
            }
            Command::Alerts { reply } => {
                let _ = reply.send(engine.alerts());
            }
            Command::Telemetry { unit, reply } => {
                let _ = reply.send(engine.telemetry(&unit));
            }
            Command::Overview { reply } => {
                let _ = reply.send(engine.overview());
            }
            Command::Subscribed { reply } => {
                let _ = reply.send(engine.subscribed().clone());
            }
        }
    }
}

/// Cloneable handle for lifecycle calls and snapshots.
#[derive(Clone, Debug)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SupervisorError::Closed)?;
        rx.await.map_err(|_| SupervisorError::Closed)
    }

    /// Parses and registers a raw unit definition.
    pub async fn register(&self, raw: Value) -> Result<UnitDescriptor, SupervisorError> {
        self.call(|reply| Command::Register { raw, reply }).await?
    }

    /// Registers an already-built descriptor.
    pub async fn register_descriptor(
        &self,
        desc: UnitDescriptor,
    ) -> Result<UnitDescriptor, SupervisorError> {
        self.call(|reply| Command::RegisterDescriptor { desc, reply })
            .await
    }

    /// Forgets a definition. Returns whether one was known.
    pub async fn unregister(&self, unit: &str) -> Result<bool, SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::Unregister { unit, reply }).await
    }

    /// Starts supervising a registered unit.
    pub async fn add(
        &self,
        unit: &str,
        start_running: bool,
    ) -> Result<SupervisedUnit, SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::Add {
            unit,
            start_running,
            reply,
        })
        .await?
    }

    /// Stops supervising a unit. Returns whether one was active.
    pub async fn remove(&self, unit: &str) -> Result<bool, SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::Remove { unit, reply }).await
    }

    pub async fn set_run_state(&self, unit: &str, target: RunState) -> Result<(), SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::SetRunState {
            unit,
            target,
            reply,
        })
        .await?
    }

    /// Removes an active unit and forgets its definition.
    pub async fn unplug(&self, unit: &str) -> Result<(), SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::Unplug { unit, reply }).await?
    }

    /// Removes every alert with `id`; returns how many went away.
    pub async fn acknowledge(&self, id: &str) -> Result<usize, SupervisorError> {
        let id = id.to_string();
        self.call(|reply| Command::Acknowledge { id, reply }).await
    }

    pub async fn clear_alerts(&self) -> Result<usize, SupervisorError> {
        self.call(|reply| Command::ClearAlerts { reply }).await
    }

    pub async fn names(&self) -> Result<Vec<String>, SupervisorError> {
        self.call(|reply| Command::Names { reply }).await
    }

    pub async fn units(&self) -> Result<Vec<SupervisedUnit>, SupervisorError> {
        self.call(|reply| Command::Units { reply }).await
    }

    pub async fn unit(&self, unit: &str) -> Result<Option<SupervisedUnit>, SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::Unit { unit, reply }).await
    }

    /// Alerts, newest first.
    pub async fn alerts(&self) -> Result<Vec<Alert>, SupervisorError> {
        self.call(|reply| Command::Alerts { reply }).await
    }

    pub async fn telemetry(&self, unit: &str) -> Result<Option<Telemetry>, SupervisorError> {
        let unit = unit.to_string();
        self.call(|reply| Command::Telemetry { unit, reply }).await
    }

    /// One text line per active unit.
    pub async fn overview(&self) -> Result<Vec<String>, SupervisorError> {
        self.call(|reply| Command::Overview { reply }).await
    }

    /// Topics the supervisor believes are subscribed.
    pub async fn subscribed(&self) -> Result<BTreeSet<String>, SupervisorError> {
        self.call(|reply| Command::Subscribed { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_loop_reports_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = SupervisorHandle::new(tx);
        assert_eq!(handle.names().await.unwrap_err(), SupervisorError::Closed);
    }

    #[tokio::test]
    async fn test_dropped_reply_reports_closed() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = SupervisorHandle::new(tx);
        tokio::spawn(async move {
            // Swallow the command without answering.
            let _ = rx.recv().await;
        });
        assert_eq!(handle.clear_alerts().await.unwrap_err(), SupervisorError::Closed);
    }
}
