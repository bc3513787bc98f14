/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduler configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! limits:
//!   instances: 5
//!   cpus: 3.0
//!   mem: 256.0
//! termination:
//!   running_threshold: 3
//! explicit_acknowledgements: false
//! refuse_seconds: 1.0
//! applications:
//!   team_a:
//!     executors:
//!       sleepy:
//!         image: "lmok/mini-executor"
//!         command: "/opt/docker_executor"
//!         force_pull: false
//!         cpus: 0.25
//!         mem: 16
//!         instances: 2
//!         payload: { units: 4 }
//! ```
//!
//! Every section is optional.  With no applications a single `app1` /
//! `exec1` toy application is used.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::registry::{Application, ExecutorSpec, Registry};
use crate::scheduler::{
    AllocationLimits, DEFAULT_CPU_LIMIT, DEFAULT_INSTANCE_LIMIT, DEFAULT_MEM_LIMIT,
};
use crate::termination::DEFAULT_RUNNING_THRESHOLD;

const DEFAULT_APP: &str = "app1";
const DEFAULT_EXECUTOR: &str = "exec1";
const DEFAULT_IMAGE: &str = "lmok/mini-executor";
const DEFAULT_COMMAND: &str = "/opt/docker_executor";

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchedulerConfigFile {
    #[serde(default)]
    limits: LimitsEntry,
    #[serde(default)]
    termination: TerminationEntry,
    #[serde(default)]
    explicit_acknowledgements: bool,
    #[serde(default = "default_refuse_seconds")]
    refuse_seconds: f64,
    #[serde(default)]
    applications: BTreeMap<String, ApplicationEntry>,
}

#[derive(Debug, Deserialize)]
struct LimitsEntry {
    #[serde(default = "default_instances")]
    instances: usize,
    #[serde(default = "default_cpus")]
    cpus: f64,
    #[serde(default = "default_mem")]
    mem: f64,
}

impl Default for LimitsEntry {
    fn default() -> Self {
        Self {
            instances: DEFAULT_INSTANCE_LIMIT,
            cpus: DEFAULT_CPU_LIMIT,
            mem: DEFAULT_MEM_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TerminationEntry {
    #[serde(default = "default_threshold")]
    running_threshold: usize,
}

impl Default for TerminationEntry {
    fn default() -> Self {
        Self {
            running_threshold: DEFAULT_RUNNING_THRESHOLD,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApplicationEntry {
    #[serde(default)]
    executors: BTreeMap<String, ExecutorEntry>,
}

/// Per-executor fields.  `cpus` and `mem` are mandatory.
#[derive(Debug, Deserialize)]
struct ExecutorEntry {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    force_pull: bool,
    cpus: f64,
    mem: f64,
    #[serde(default = "default_executor_instances")]
    instances: u32,
    #[serde(default = "empty_payload")]
    payload: serde_json::Value,
}

fn default_refuse_seconds() -> f64 {
    crate::dispatch::DEFAULT_REFUSE_SECONDS
}

fn default_instances() -> usize {
    DEFAULT_INSTANCE_LIMIT
}

fn default_cpus() -> f64 {
    DEFAULT_CPU_LIMIT
}

fn default_mem() -> f64 {
    DEFAULT_MEM_LIMIT
}

fn default_threshold() -> usize {
    DEFAULT_RUNNING_THRESHOLD
}

fn default_executor_instances() -> u32 {
    1
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

// ── Public data structures ────────────────────────────────────────────────────

/// One executor template as configured.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub name: String,
    pub image: String,
    pub command: String,
    pub force_pull: bool,
    pub cpus: f64,
    pub mem: f64,
    pub instances: u32,
    pub payload: serde_json::Value,
}

impl ExecutorConfig {
    /// The toy executor used when nothing is configured.
    pub fn default_config(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: DEFAULT_IMAGE.to_string(),
            command: DEFAULT_COMMAND.to_string(),
            force_pull: false,
            cpus: 1.0,
            mem: 32.0,
            instances: 1,
            payload: empty_payload(),
        }
    }

    fn to_spec(&self) -> Result<ExecutorSpec> {
        let spec = ExecutorSpec::new(self.name.clone(), self.cpus, self.mem, self.instances)?
            .with_container(self.image.clone(), self.command.clone(), self.force_pull)
            .with_payload(self.payload.clone());
        Ok(spec)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationConfig {
    pub name: String,
    /// Sorted by executor name.
    pub executors: Vec<ExecutorConfig>,
}

// ── ConfigManager ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConfigManager {
    limits: AllocationLimits,
    running_threshold: usize,
    explicit_acknowledgements: bool,
    refuse_seconds: f64,
    applications: BTreeMap<String, ApplicationConfig>,
    loaded: bool,
}

impl Default for ConfigManager {
    fn default() -> Self {
        let mut applications = BTreeMap::new();
        applications.insert(DEFAULT_APP.to_string(), Self::default_application());
        Self {
            limits: AllocationLimits::default(),
            running_threshold: DEFAULT_RUNNING_THRESHOLD,
            explicit_acknowledgements: false,
            refuse_seconds: crate::dispatch::DEFAULT_REFUSE_SECONDS,
            applications,
            loaded: false,
        }
    }
}

impl ConfigManager {
    /// Built-in defaults, including the `app1` fallback application.
    pub fn new() -> Self {
        Self::default()
    }

    fn default_application() -> ApplicationConfig {
        ApplicationConfig {
            name: DEFAULT_APP.to_string(),
            executors: vec![ExecutorConfig::default_config(DEFAULT_EXECUTOR)],
        }
    }

    /// Parse `path` and replace everything previously loaded.
    ///
    /// # Errors
    /// Unreadable file, invalid YAML, a non-positive resource requirement, a
    /// zero termination threshold or a negative refuse duration.  On error
    /// the manager is left with its defaults and `is_loaded() == false`.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "loading scheduler configuration");

        *self = Self::default();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: SchedulerConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let parsed = Self::from_file(file)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        *self = parsed;

        info!(
            applications = self.applications.len(),
            instances    = self.limits.instances,
            cpus         = self.limits.cpus,
            mem          = self.limits.mem,
            threshold    = self.running_threshold,
            "configuration loaded"
        );
        Ok(())
    }

    fn from_file(file: SchedulerConfigFile) -> Result<Self> {
        if file.termination.running_threshold == 0 {
            bail!("termination.running_threshold must be at least 1");
        }
        if !(file.refuse_seconds.is_finite() && file.refuse_seconds >= 0.0) {
            bail!("refuse_seconds must be a non-negative number, got {}", file.refuse_seconds);
        }

        let mut applications = BTreeMap::new();
        for (app_name, entry) in file.applications {
            let mut executors = Vec::with_capacity(entry.executors.len());
            for (exec_name, e) in entry.executors {
                if !(e.cpus > 0.0 && e.mem > 0.0) {
                    bail!(
                        "executor {}/{} needs positive cpus and mem, got cpus={} mem={}",
                        app_name,
                        exec_name,
                        e.cpus,
                        e.mem
                    );
                }
                debug!(
                    app       = %app_name,
                    executor  = %exec_name,
                    cpus      = e.cpus,
                    mem       = e.mem,
                    instances = e.instances,
                    "executor configured"
                );
                executors.push(ExecutorConfig {
                    name: exec_name,
                    image: e.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                    command: e.command.unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
                    force_pull: e.force_pull,
                    cpus: e.cpus,
                    mem: e.mem,
                    instances: e.instances,
                    payload: e.payload,
                });
            }
            if executors.is_empty() {
                warn!(app = %app_name, "application has no executors and will never launch");
            }
            applications.insert(
                app_name.clone(),
                ApplicationConfig {
                    name: app_name,
                    executors,
                },
            );
        }

        if applications.is_empty() {
            warn!("no applications configured, using default application");
            applications.insert(DEFAULT_APP.to_string(), Self::default_application());
        }

        Ok(Self {
            limits: AllocationLimits {
                instances: file.limits.instances,
                cpus: file.limits.cpus,
                mem: file.limits.mem,
            },
            running_threshold: file.termination.running_threshold,
            explicit_acknowledgements: file.explicit_acknowledgements,
            refuse_seconds: file.refuse_seconds,
            applications,
            loaded: true,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn limits(&self) -> AllocationLimits {
        self.limits
    }

    pub fn running_threshold(&self) -> usize {
        self.running_threshold
    }

    pub fn explicit_acknowledgements(&self) -> bool {
        self.explicit_acknowledgements
    }

    /// Command-line / environment override for the acknowledgement mode.
    pub fn set_explicit_acknowledgements(&mut self, enabled: bool) {
        self.explicit_acknowledgements = enabled;
    }

    pub fn refuse_seconds(&self) -> f64 {
        self.refuse_seconds
    }

    pub fn application(&self, name: &str) -> Option<&ApplicationConfig> {
        self.applications.get(name)
    }

    pub fn applications(&self) -> impl Iterator<Item = &ApplicationConfig> {
        self.applications.values()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Build a fresh [`Registry`] holding every configured application.
    pub fn build_registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        for app_cfg in self.applications.values() {
            let mut app = Application::new(app_cfg.name.clone());
            for exec_cfg in &app_cfg.executors {
                app.add_executor(exec_cfg.to_spec()?)
                    .with_context(|| format!("application {}", app_cfg.name))?;
            }
            registry.register(app)?;
        }
        Ok(registry)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
