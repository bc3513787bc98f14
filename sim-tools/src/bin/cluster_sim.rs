/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-process cluster simulator.
//!
//! Plays the resource provider for a [`Framework`]:
//!
//! * every tick, offers each agent's free capacity;
//! * runs accepted tasks on that agent's [`NodeRuntime`];
//! * delivers stop messages to the runtimes;
//! * releases capacity when a task reaches a terminal state;
//! * stops on shutdown, abort or timeout.
//!
//! Offer ticks and status events share one mpsc queue with a single
//! consumer, so the framework sees one callback at a time.
//!
//! ```text
//! cargo run --bin cluster-sim -- -c demos/scheduler.yaml --agents 3
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use mini_node::{NodeRuntime, WorkloadConfig};
use mini_scheduler::config::ConfigManager;
use mini_scheduler::dispatch::Framework;
use mini_scheduler::driver::SchedulerDriver;
use mini_scheduler::scheduler::NaiveAllocator;
use mini_scheduler::task::{AgentId, Capacity, Offer, OfferId, StatusEvent, TaskId, TaskRequest};
use mini_scheduler::termination::TerminationCoordinator;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "cluster-sim", about = "In-process cluster simulator for the mini scheduler")]
struct Cli {
    /// Scheduler configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Number of simulated agents.
    #[arg(long, default_value_t = 2)]
    agents: usize,

    /// CPUs per agent.
    #[arg(long = "agent-cpus", default_value_t = 4.0)]
    agent_cpus: f64,

    /// Memory per agent.
    #[arg(long = "agent-mem", default_value_t = 512.0)]
    agent_mem: f64,

    /// Milliseconds between offer rounds.
    #[arg(long = "offer-interval-ms", default_value_t = 200)]
    offer_interval_ms: u64,

    /// Milliseconds per unit of simulated work.
    #[arg(long = "unit-ms", default_value_t = 50)]
    unit_ms: u64,

    /// Units before a task finishes on its own (unbounded when absent).
    #[arg(long)]
    units: Option<u64>,

    /// Give up after this many seconds.
    #[arg(long = "timeout-secs", default_value_t = 30)]
    timeout_secs: u64,

    /// Allocator seed.
    #[arg(long)]
    seed: Option<u64>,
}

// ── Simulated agents ──────────────────────────────────────────────────────────

struct Agent {
    capacity: Capacity,
    used: Capacity,
    tasks: HashMap<TaskId, Capacity>,
    runtime: NodeRuntime,
}

impl Agent {
    fn free(&self) -> Capacity {
        Capacity::new(
            (self.capacity.cpus - self.used.cpus).max(0.0),
            (self.capacity.mem - self.used.mem).max(0.0),
        )
    }

    fn claim(&mut self, task: &TaskRequest) {
        let c = task.capacity();
        self.used = Capacity::new(self.used.cpus + c.cpus, self.used.mem + c.mem);
        self.tasks.insert(task.task_id.clone(), c);
    }

    fn release(&mut self, task: &TaskId) -> bool {
        match self.tasks.remove(task) {
            Some(c) => {
                self.used.deduct(c);
                true
            }
            None => false,
        }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Shutdown,
    Aborted,
    TimedOut,
}

struct SimDriver<'a> {
    agents: &'a mut BTreeMap<AgentId, Agent>,
    outcome: &'a mut Option<Outcome>,
}

impl SchedulerDriver for SimDriver<'_> {
    fn accept_offer(&mut self, offer: &OfferId, tasks: Vec<TaskRequest>, refuse_seconds: f64) {
        debug!(offer = %offer, tasks = tasks.len(), refuse_seconds, "offer accepted");
        for task in tasks {
            let Some(agent) = self.agents.get_mut(&task.agent_id) else {
                warn!(task = %task.task_id, agent = %task.agent_id, "launch on unknown agent");
                continue;
            };
            agent.claim(&task);
            let id = task.task_id.clone();
            if let Err(e) = agent.runtime.launch(task) {
                warn!(task = %id, error = %e, "launch failed");
                agent.release(&id);
            }
        }
    }

    fn send_framework_message(&mut self, executor_id: &str, agent_id: &AgentId, data: Vec<u8>) {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            warn!(agent = %agent_id, executor = %executor_id, "message for unknown agent");
            return;
        };
        if let Err(e) = agent.runtime.deliver(&data) {
            warn!(agent = %agent_id, executor = %executor_id, error = %e, "message not delivered");
        }
    }

    fn acknowledge(&mut self, event: &StatusEvent) {
        debug!(task = %event.task_id, state = %event.state, "acknowledged");
    }

    fn abort(&mut self) {
        self.outcome.get_or_insert(Outcome::Aborted);
    }

    fn request_shutdown(&mut self) {
        self.outcome.get_or_insert(Outcome::Shutdown);
    }
}

enum SimEvent {
    OfferTick,
    Status(StatusEvent),
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ConfigManager::new();
    if let Some(path) = &cli.config {
        config.load_from_file(path)?;
    }
    let registry = config.build_registry().context("Failed to build registry")?;

    let policy = match cli.seed {
        Some(seed) => NaiveAllocator::with_seed(seed),
        None => NaiveAllocator::new(),
    };
    let mut framework = Framework::new(
        registry,
        config.limits(),
        Box::new(policy),
        TerminationCoordinator::new(config.running_threshold()),
    )
    .with_explicit_acknowledgements(config.explicit_acknowledgements())
    .with_refuse_seconds(config.refuse_seconds());
    framework.registered("sim-framework", "cluster-sim");

    // ── Agents and the shared event queue ─────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SimEvent>();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<StatusEvent>();

    let workload = WorkloadConfig {
        unit_duration: Duration::from_millis(cli.unit_ms),
        max_units: cli.units,
        fail_after: None,
    };
    let mut agents: BTreeMap<AgentId, Agent> = (0..cli.agents)
        .map(|i| {
            let id = AgentId::from(format!("agent-{}", i + 1));
            let agent = Agent {
                capacity: Capacity::new(cli.agent_cpus, cli.agent_mem),
                used: Capacity::default(),
                tasks: HashMap::new(),
                runtime: NodeRuntime::new(id.clone(), workload, status_tx.clone()),
            };
            (id, agent)
        })
        .collect();
    drop(status_tx);

    let forward_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = status_rx.recv().await {
            if forward_tx.send(SimEvent::Status(event)).is_err() {
                break;
            }
        }
    });

    let interval = Duration::from_millis(cli.offer_interval_ms);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if event_tx.send(SimEvent::OfferTick).is_err() {
                break;
            }
        }
    });

    info!(
        agents = cli.agents,
        cpus   = cli.agent_cpus,
        mem    = cli.agent_mem,
        apps   = framework.application_names().len(),
        "simulation started"
    );

    // ── Event loop ────────────────────────────────────────────────────────────
    let deadline = tokio::time::sleep(Duration::from_secs(cli.timeout_secs));
    tokio::pin!(deadline);

    let mut outcome: Option<Outcome> = None;
    let mut offer_seq: u64 = 0;

    while outcome.is_none() {
        let event = tokio::select! {
            _ = &mut deadline => {
                outcome = Some(Outcome::TimedOut);
                break;
            }
            event = event_rx.recv() => event,
        };
        let Some(event) = event else { break };

        let mut driver = SimDriver {
            agents: &mut agents,
            outcome: &mut outcome,
        };

        match event {
            SimEvent::OfferTick => {
                let offers: Vec<Offer> = driver
                    .agents
                    .iter()
                    .filter_map(|(id, agent)| {
                        let free = agent.free();
                        if free.cpus <= 0.0 || free.mem <= 0.0 {
                            return None;
                        }
                        offer_seq += 1;
                        Some(Offer::new(
                            format!("offer-{}", offer_seq),
                            id.clone(),
                            free.cpus,
                            free.mem,
                        ))
                    })
                    .collect();
                framework.resource_offers(&mut driver, &offers)?;
            }
            SimEvent::Status(status) => {
                if status.state.is_terminal() {
                    for agent in driver.agents.values_mut() {
                        if agent.release(&status.task_id) {
                            break;
                        }
                    }
                }
                framework.status_update(&mut driver, status)?;
            }
        }
    }

    // ── Report ────────────────────────────────────────────────────────────────
    for name in framework.application_names() {
        if let Some(view) = framework.snapshot(&name) {
            info!(
                app        = %view.name,
                terminated = view.terminated,
                launched   = view.launched,
                running    = view.running,
                "final application state"
            );
        }
    }
    for agent in agents.values_mut() {
        agent.runtime.shutdown();
    }

    match outcome {
        Some(Outcome::Shutdown) => {
            info!("session shut down cleanly");
            Ok(())
        }
        Some(Outcome::Aborted) => {
            error!("session aborted");
            process::exit(1);
        }
        Some(Outcome::TimedOut) | None => {
            warn!(timeout_secs = cli.timeout_secs, "session did not finish in time");
            process::exit(2);
        }
    }
}
