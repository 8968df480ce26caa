//! # Supervisor: owns the supervision loop, the bus writer and graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the bus connection and
//! global runtime configuration. [`Supervisor::start`] spawns three workers:
//!
//! ## High-level architecture
//! ```text
//! SupervisorHandle ── Command ──┐
//!                               ▼
//! BusConnection.events() ──► supervision loop ── owns ──► Engine
//!                               │   select! { token, commands, bus events }
//!                               │
//!                               ├─► BusOp ──► bus writer ──► connection.subscribe/unsubscribe
//!                               │               (in order, results only logged)
//!                               └─► Bus.publish(Event)
//!                                        │
//!                                        ▼
//!                     subscriber listener ──► SubscriberSet::emit(&Event)
//!                                          ┌─────────┬─────────┐
//!                                          ▼         ▼         ▼
//!                                   [queue S1] [queue S2] ... [queue SN]
//!
//! Shutdown path:
//!   shutdown() / run_until_signal()
//!     └─► Bus.publish(ShutdownRequested)
//!     └─► runtime_token.cancel()       → loop exits, Engine dropped, op queue closes
//!     └─► wait for workers up to cfg.grace (writer drains pending ops)
//!     └─► connection.disconnect()
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use unitvisor::{Config, LogWriter, MemoryBus, Subscribe, SupervisorBuilder, UnitDescriptor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Arc::new(MemoryBus::new());
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = SupervisorBuilder::new(Config::default())
//!         .with_subscribers(subs)
//!         .build(bus.clone());
//!
//!     let handle = sup.start()?;
//!     handle
//!         .register_descriptor(UnitDescriptor::new("CPS-001", "Welder", "/cps/x/u1"))
//!         .await?;
//!     handle.add("welder", true).await?;
//!     assert_eq!(handle.units().await?.len(), 1);
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{BusConnection, BusEvent};
use crate::core::{
    Config,
    engine::{BusOp, Engine},
    handle::{Command, SupervisorHandle},
    shutdown,
};
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;

/// Coordinates the supervision loop, event delivery (via [`SubscriberSet`]) and shutdown.
pub struct Supervisor {
    /// Global runtime configuration.
    pub cfg: Config,
    /// Internal event bus.
    pub bus: Bus,
    /// Fan-out set for subscribers.
    pub subs: Arc<SubscriberSet>,
    connection: Arc<dyn BusConnection>,
    runtime_token: CancellationToken,
    commands: mpsc::Sender<Command>,
    pending: Mutex<Option<mpsc::Receiver<Command>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        connection: Arc<dyn BusConnection>,
    ) -> Self {
        let (commands, pending) = mpsc::channel(cfg.command_capacity_clamped());
        Self {
            cfg,
            bus,
            subs,
            connection,
            runtime_token: CancellationToken::new(),
            commands,
            pending: Mutex::new(Some(pending)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Returns a handle. Calls made before [`start`](Self::start) wait in the queue.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::new(self.commands.clone())
    }

    /// Spawns the subscriber listener, the bus writer and the supervision loop.
    ///
    /// Fails with [`SupervisorError::AlreadyStarted`] on the second call, or
    /// [`SupervisorError::Connection`] when the connection's event stream is gone.
    pub fn start(&self) -> Result<SupervisorHandle, SupervisorError> {
        let commands = self
            .pending
            .lock()
            .take()
            .ok_or(SupervisorError::AlreadyStarted)?;
        let events = match self.connection.events() {
            Ok(events) => events,
            Err(err) => {
                *self.pending.lock() = Some(commands);
                return Err(err.into());
            }
        };

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let engine = Engine::new(&self.cfg, self.bus.clone(), ops_tx);

        let mut workers = self.workers.lock();
        workers.push(self.subscriber_listener());
        workers.push(tokio::spawn(bus_writer(
            Arc::clone(&self.connection),
            ops_rx,
        )));
        workers.push(tokio::spawn(supervision_loop(
            engine,
            commands,
            events,
            self.runtime_token.clone(),
        )));

        info!(connection = self.connection.name(), "supervisor started");
        Ok(self.handle())
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => {
                        // Forward what is already queued, then stop.
                        while let Ok(ev) = rx.try_recv() {
                            set.emit(&ev);
                        }
                        break;
                    }
                }
            }
        })
    }

    /// Stops the loop, lets the writer drain within [`Config::grace`] and disconnects.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let joined = async {
            for worker in workers {
                let _ = worker.await;
            }
        };
        match self.cfg.shutdown_grace() {
            Some(grace) => {
                if tokio::time::timeout(grace, joined).await.is_err() {
                    warn!(?grace, "workers still busy after grace, disconnecting anyway");
                }
            }
            None => drop(joined),
        }

        self.connection.disconnect().await?;
        info!("supervisor stopped");
        Ok(())
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), SupervisorError> {
        match shutdown::wait_for_shutdown_signal().await {
            Ok(signal) => info!(signal, "shutdown signal received"),
            Err(err) => warn!(error = %err, "signal handlers unavailable, shutting down"),
        }
        self.shutdown().await
    }
}

/// Serializes every subscribe/unsubscribe call in queue order.
///
/// Exits once the engine (the only sender) is dropped and the queue is drained.
async fn bus_writer(connection: Arc<dyn BusConnection>, mut ops: mpsc::UnboundedReceiver<BusOp>) {
    while let Some(op) = ops.recv().await {
        let result = match &op {
            BusOp::Subscribe(topics) => connection.subscribe(topics).await,
            BusOp::Unsubscribe(topics) => connection.unsubscribe(topics).await,
        };
        match result {
            Ok(()) => debug!(?op, "bus operation done"),
            Err(err) => warn!(?op, error = %err, label = err.as_label(), "bus operation failed"),
        }
    }
}

/// Single owner of the [`Engine`]: commands and bus events are applied one at a time.
async fn supervision_loop(
    mut engine: Engine,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::UnboundedReceiver<BusEvent>,
    token: CancellationToken,
) {
    let mut events_open = true;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            cmd = commands.recv() => match cmd {
                Some(cmd) => cmd.apply(&mut engine),
                None => break,
            },
            ev = events.recv(), if events_open => match ev {
                Some(ev) => engine.on_bus_event(ev, Utc::now()),
                None => {
                    warn!("bus event stream ended");
                    events_open = false;
                }
            },
        }
    }
    debug!("supervision loop finished");
}
