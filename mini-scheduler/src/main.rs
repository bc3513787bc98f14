/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};

use mini_scheduler::config::ConfigManager;
use mini_scheduler::dispatch::Framework;
use mini_scheduler::driver::RecordingDriver;
use mini_scheduler::registry::view::ApplicationView;
use mini_scheduler::scheduler::NaiveAllocator;
use mini_scheduler::task::{Offer, TaskRequest};
use mini_scheduler::termination::TerminationCoordinator;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Mini framework scheduler.
///
/// Loads the configuration, logs the registered applications and, when an
/// offer size is given, prints the launch plan for that single offer.
///
/// Example:
///   mini-scheduler -c scheduler.yaml --offer-cpus 4 --offer-mem 512
#[derive(Debug, Parser)]
#[command(
    name = "mini-scheduler",
    about = "Mini framework scheduler",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scheduler configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Acknowledge status updates explicitly.
    #[arg(
        long = "explicit-acks",
        env = "MESOS_EXPLICIT_ACKNOWLEDGEMENTS",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    explicit_acks: Option<bool>,

    /// CPUs in the dry-run offer.
    #[arg(long = "offer-cpus", requires = "offer_mem")]
    offer_cpus: Option<f64>,

    /// Memory in the dry-run offer.
    #[arg(long = "offer-mem", requires = "offer_cpus")]
    offer_mem: Option<f64>,

    /// Seed for the allocator's application ordering.
    #[arg(long = "seed")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct LaunchPlan {
    offer_cpus: f64,
    offer_mem: f64,
    tasks: Vec<TaskRequest>,
    applications: Vec<ApplicationView>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(
        config     = ?cli.config,
        explicit   = ?cli.explicit_acks,
        offer_cpus = ?cli.offer_cpus,
        offer_mem  = ?cli.offer_mem,
        seed       = ?cli.seed,
        "mini-scheduler starting up"
    );

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = ConfigManager::new();
    match &cli.config {
        Some(path) => config.load_from_file(path)?,
        None => warn!("No configuration file provided, using default application"),
    }
    if let Some(explicit) = cli.explicit_acks {
        config.set_explicit_acknowledgements(explicit);
    }

    let registry = config
        .build_registry()
        .context("Failed to build application registry")?;

    for app in config.applications() {
        for exec in &app.executors {
            info!(
                app       = %app.name,
                executor  = %exec.name,
                image     = %exec.image,
                cpus      = exec.cpus,
                mem       = exec.mem,
                instances = exec.instances,
                "application executor"
            );
        }
    }

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

    // ── Dry run ───────────────────────────────────────────────────────────────
    let (Some(cpus), Some(mem)) = (cli.offer_cpus, cli.offer_mem) else {
        info!(
            applications = framework.application_names().len(),
            "no offer given, nothing to plan"
        );
        return Ok(());
    };

    let mut driver = RecordingDriver::new();
    let offer = Offer::new("dry-run", "local", cpus, mem);
    framework.resource_offers(&mut driver, &[offer])?;

    let plan = LaunchPlan {
        offer_cpus: cpus,
        offer_mem: mem,
        tasks: driver.launched().into_iter().cloned().collect(),
        applications: framework
            .application_names()
            .iter()
            .filter_map(|name| framework.snapshot(name))
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("Failed to encode launch plan")?
    );
    Ok(())
}
