/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Offer allocator.
//!
//! An [`AllocationPolicy`] turns one [`Offer`] into a list of
//! [`TaskRequest`]s, recording every launch in the [`Registry`] as it goes.
//! Only one policy ships: [`NaiveAllocator`], a shuffled first-fit scan.
//!
//! # Naive policy
//!
//! | Step | Rule |
//! |---|---|
//! | Order | Fresh random permutation of applications per offer |
//! | App skip | terminated, or running cpu/mem usage ≥ ceiling |
//! | Executor skip | running + launched ≥ instance ceiling, launched ≥ target, or requirement > remaining offer |
//! | Launch | one task per executor per offer, deduct from remaining, no backtracking |
//!
//! The sum of everything launched never exceeds the offer, and nothing is
//! reserved that is not returned as a request.
//!
//! # Example
//! ```rust,ignore
//! let mut policy = NaiveAllocator::new();
//! let allocation = policy.allocate(&offer, &mut registry, &limits)?;
//! driver.accept_offer(&offer.id, allocation.tasks, refuse_seconds);
//! ```

pub mod error;

pub use error::{SchedulerError, SkipReason};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::registry::{Application, ExecutorSpec, Registry};
use crate::task::{AgentId, Capacity, Offer, OfferId, Resource, TaskId, TaskRequest};

// ── Limits ────────────────────────────────────────────────────────────────────

/// Default per-application instance ceiling.
pub const DEFAULT_INSTANCE_LIMIT: usize = 5;

/// Default per-application CPU ceiling.
pub const DEFAULT_CPU_LIMIT: f64 = 3.0;

/// Default per-application memory ceiling.
pub const DEFAULT_MEM_LIMIT: f64 = 256.0;

/// Process-wide per-application ceilings.  Read-only for the whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationLimits {
    /// Running instances per executor before it stops receiving tasks.
    pub instances: usize,
    /// Running CPU usage per application before it is skipped.
    pub cpus: f64,
    /// Running memory usage per application before it is skipped.
    pub mem: f64,
}

impl Default for AllocationLimits {
    fn default() -> Self {
        Self {
            instances: DEFAULT_INSTANCE_LIMIT,
            cpus: DEFAULT_CPU_LIMIT,
            mem: DEFAULT_MEM_LIMIT,
        }
    }
}

// ── Allocation result ─────────────────────────────────────────────────────────

/// Outcome of one allocation pass.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub offer_id: OfferId,
    pub agent_id: AgentId,
    /// Launch requests in the order they were decided.
    pub tasks: Vec<TaskRequest>,
    /// Offer capacity left after every launch was deducted.
    pub remaining: Capacity,
}

impl Allocation {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total capacity claimed by [`tasks`](Self::tasks).
    pub fn consumed(&self) -> Capacity {
        self.tasks.iter().fold(Capacity::default(), |acc, t| {
            let c = t.capacity();
            Capacity::new(acc.cpus + c.cpus, acc.mem + c.mem)
        })
    }
}

// ── Policy seam ───────────────────────────────────────────────────────────────

/// Pluggable offer-matching policy.
///
/// Implementations must record every launch in `registry` before returning
/// it, and must never hand out more than the offer advertises.
pub trait AllocationPolicy: Send {
    fn name(&self) -> &'static str;

    fn allocate(
        &mut self,
        offer: &Offer,
        registry: &mut Registry,
        limits: &AllocationLimits,
    ) -> Result<Allocation, SchedulerError>;
}

// ── NaiveAllocator ────────────────────────────────────────────────────────────

/// Shuffled greedy first-fit.  See the module docs for the exact rules.
pub struct NaiveAllocator {
    rng: StdRng,
}

impl NaiveAllocator {
    /// Allocator seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic allocator for tests and reproducible simulations.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Application-level gate, evaluated once per application per offer.
    fn app_skip_reason(app: &Application, limits: &AllocationLimits) -> Option<SkipReason> {
        if app.is_terminated() {
            return Some(SkipReason::AppTerminated);
        }
        let cpu = app.cpu_used();
        if cpu >= limits.cpus {
            return Some(SkipReason::CpuCeiling {
                used: cpu,
                limit: limits.cpus,
            });
        }
        let mem = app.mem_used();
        if mem >= limits.mem {
            return Some(SkipReason::MemCeiling {
                used: mem,
                limit: limits.mem,
            });
        }
        None
    }

    /// Executor-level gate, evaluated against what is left of the offer.
    fn executor_skip_reason(
        spec: &ExecutorSpec,
        limits: &AllocationLimits,
        remaining: Capacity,
    ) -> Option<SkipReason> {
        // Launches still in flight will become running instances.
        let active = spec.num_running() + spec.num_launched();
        if active >= limits.instances {
            return Some(SkipReason::InstanceCeiling {
                active,
                limit: limits.instances,
            });
        }
        if spec.num_launched() >= spec.instances() as usize {
            return Some(SkipReason::TargetReached {
                launched: spec.num_launched(),
                target: spec.instances(),
            });
        }
        if spec.required_cpu() > remaining.cpus {
            return Some(SkipReason::InsufficientCpu {
                required: spec.required_cpu(),
                remaining: remaining.cpus,
            });
        }
        if spec.required_mem() > remaining.mem {
            return Some(SkipReason::InsufficientMem {
                required: spec.required_mem(),
                remaining: remaining.mem,
            });
        }
        None
    }

    fn build_request(app: &str, spec: &ExecutorSpec, offer: &Offer) -> TaskRequest {
        let task_id = TaskId::generate(app);
        TaskRequest {
            name: format!("task {}", task_id),
            task_id,
            agent_id: offer.agent_id.clone(),
            executor: spec.info().clone(),
            resources: vec![
                Resource::cpus(spec.required_cpu()),
                Resource::mem(spec.required_mem()),
            ],
            payload: spec.payload().clone(),
        }
    }

    /// Record `request` in the registry.  A launch that cannot be recorded
    /// is logged and left out of the allocation, so every recorded launch
    /// is also handed to the driver.
    fn record(registry: &mut Registry, app: &str, executor: &str, request: &TaskRequest) -> bool {
        match registry.record_launch(
            app,
            executor,
            request.task_id.clone(),
            request.agent_id.clone(),
        ) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    task     = %request.task_id,
                    app      = %app,
                    executor = %executor,
                    error    = %e,
                    "could not record launch, skipping executor"
                );
                false
            }
        }
    }
}

impl Default for NaiveAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for NaiveAllocator {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn allocate(
        &mut self,
        offer: &Offer,
        registry: &mut Registry,
        limits: &AllocationLimits,
    ) -> Result<Allocation, SchedulerError> {
        let advertised = offer.capacity();
        let mut remaining = advertised;
        let mut tasks = Vec::new();

        info!(
            offer = %offer.id,
            agent = %offer.agent_id,
            cpus  = advertised.cpus,
            mem   = advertised.mem,
            "received offer"
        );

        let mut order = registry.app_names();
        order.shuffle(&mut self.rng);

        for app_name in &order {
            let Some(app) = registry.app(app_name) else {
                continue;
            };
            if let Some(reason) = Self::app_skip_reason(app, limits) {
                debug!(app = %app_name, %reason, "skipping application");
                continue;
            }

            // Decide per executor with a shared borrow, then record with a
            // mutable one.
            let executor_names: Vec<String> =
                app.executors().map(|e| e.name().to_string()).collect();

            for exec_name in &executor_names {
                let Some(spec) = registry.app(app_name).and_then(|a| a.executor(exec_name))
                else {
                    continue;
                };
                if let Some(reason) = Self::executor_skip_reason(spec, limits, remaining) {
                    debug!(app = %app_name, executor = %exec_name, %reason, "skipping executor");
                    continue;
                }

                let request = Self::build_request(app_name, spec, offer);
                let required = spec.required();

                if !Self::record(registry, app_name, exec_name, &request) {
                    continue;
                }
                remaining.deduct(required);

                info!(
                    task     = %request.task_id,
                    app      = %app_name,
                    executor = %exec_name,
                    offer    = %offer.id,
                    "launching task"
                );
                tasks.push(request);
            }
        }

        info!(
            offer     = %offer.id,
            launched  = tasks.len(),
            cpus_left = remaining.cpus,
            mem_left  = remaining.mem,
            "allocation pass complete"
        );

        Ok(Allocation {
            offer_id: offer.id.clone(),
            agent_id: offer.agent_id.clone(),
            tasks,
            remaining,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Application, ExecutorSpec};

    // ── Test helpers ──────────────────────────────────────────────────────────

    fn app(name: &str, execs: &[(&str, f64, f64, u32)]) -> Application {
        let mut a = Application::new(name);
        for (exec, cpus, mem, instances) in execs {
            a.add_executor(ExecutorSpec::new(*exec, *cpus, *mem, *instances).unwrap())
                .unwrap();
        }
        a
    }

    fn limits(instances: usize, cpus: f64, mem: f64) -> AllocationLimits {
        AllocationLimits {
            instances,
            cpus,
            mem,
        }
    }

    fn offer(cpus: f64, mem: f64) -> Offer {
        Offer::new("offer-1", "agent-1", cpus, mem)
    }

    // ── Basic matching ────────────────────────────────────────────────────────

    #[test]
    fn single_executor_launches_once_and_leaves_remainder() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 1.0, 16.0, 1)])).unwrap();
        let mut policy = NaiveAllocator::with_seed(1);

        let alloc = policy
            .allocate(&offer(2.0, 64.0), &mut reg, &limits(5, 3.0, 256.0))
            .unwrap();

        assert_eq!(alloc.tasks.len(), 1);
        assert_eq!(alloc.remaining, Capacity::new(1.0, 48.0));
        assert_eq!(alloc.tasks[0].agent_id.as_str(), "agent-1");
        assert!(alloc.tasks[0].task_id.as_str().starts_with("app-"));
        assert_eq!(reg.app("app").unwrap().num_launched(), 1);
        assert!(reg.resolve(&alloc.tasks[0].task_id).is_some());
    }

    #[test]
    fn target_reached_stops_further_launches() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 1.0, 16.0, 1)])).unwrap();
        let mut policy = NaiveAllocator::with_seed(1);
        let l = limits(5, 3.0, 256.0);

        policy.allocate(&offer(4.0, 64.0), &mut reg, &l).unwrap();
        let second = policy.allocate(&offer(4.0, 64.0), &mut reg, &l).unwrap();
        assert!(second.is_empty());
        assert_eq!(second.remaining, Capacity::new(4.0, 64.0));
    }

    #[test]
    fn one_task_per_executor_per_offer() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 0.5, 8.0, 10)])).unwrap();
        let mut policy = NaiveAllocator::with_seed(3);

        let alloc = policy
            .allocate(&offer(8.0, 512.0), &mut reg, &limits(5, 3.0, 256.0))
            .unwrap();
        assert_eq!(alloc.tasks.len(), 1);
    }

    #[test]
    fn executor_that_does_not_fit_is_skipped_but_others_continue() {
        let mut reg = Registry::new();
        reg.register(app(
            "app",
            &[("big", 4.0, 16.0, 1), ("small", 1.0, 16.0, 1)],
        ))
        .unwrap();
        let mut policy = NaiveAllocator::with_seed(9);

        let alloc = policy
            .allocate(&offer(2.0, 64.0), &mut reg, &limits(5, 3.0, 256.0))
            .unwrap();
        assert_eq!(alloc.tasks.len(), 1);
        assert_eq!(alloc.tasks[0].executor.executor_id, "small");
    }

    #[test]
    fn memory_shortfall_is_a_skip() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 1.0, 128.0, 1)])).unwrap();
        let mut policy = NaiveAllocator::with_seed(0);

        let alloc = policy
            .allocate(&offer(4.0, 64.0), &mut reg, &limits(5, 3.0, 256.0))
            .unwrap();
        assert!(alloc.is_empty());
        assert_eq!(reg.app("app").unwrap().num_launched(), 0);
    }

    // ── Application and executor gates ────────────────────────────────────────

    #[test]
    fn terminated_application_is_skipped() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 1.0, 16.0, 1)])).unwrap();
        reg.app_mut("app").unwrap().mark_terminated();
        let mut policy = NaiveAllocator::with_seed(0);

        let alloc = policy
            .allocate(&offer(4.0, 64.0), &mut reg, &limits(5, 3.0, 256.0))
            .unwrap();
        assert!(alloc.is_empty());
    }

    #[test]
    fn cpu_ceiling_uses_running_usage() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("a", 1.0, 1.0, 3), ("b", 1.0, 1.0, 3)]))
            .unwrap();
        // Two running tasks of 1.0 cpu each → usage 2.0 == ceiling.
        for t in ["r1", "r2"] {
            reg.record_launch("app", "a", t.into(), "ag".into()).unwrap();
            reg.mark_running(&t.into()).unwrap();
        }
        let mut policy = NaiveAllocator::with_seed(0);

        let alloc = policy
            .allocate(&offer(8.0, 64.0), &mut reg, &limits(5, 2.0, 256.0))
            .unwrap();
        assert!(alloc.is_empty(), "app at cpu ceiling must be skipped");
    }

    #[test]
    fn launched_tasks_do_not_count_against_ceilings() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("a", 1.0, 1.0, 5), ("b", 1.0, 1.0, 5)]))
            .unwrap();
        for t in ["l1", "l2", "l3"] {
            reg.record_launch("app", "a", t.into(), "ag".into()).unwrap();
        }
        let mut policy = NaiveAllocator::with_seed(0);

        let alloc = policy
            .allocate(&offer(8.0, 64.0), &mut reg, &limits(5, 2.0, 256.0))
            .unwrap();
        assert_eq!(alloc.tasks.len(), 2);
    }

    #[test]
    fn instance_ceiling_applies_to_running_count() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 0.1, 1.0, 10)])).unwrap();
        for t in ["r1", "r2"] {
            reg.record_launch("app", "exec", t.into(), "ag".into())
                .unwrap();
            reg.mark_running(&t.into()).unwrap();
        }
        let mut policy = NaiveAllocator::with_seed(0);

        let alloc = policy
            .allocate(&offer(8.0, 64.0), &mut reg, &limits(2, 100.0, 1000.0))
            .unwrap();
        assert!(alloc.is_empty());
    }

    #[test]
    fn in_flight_launches_count_against_instance_ceiling() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 0.1, 1.0, 10)])).unwrap();
        let mut policy = NaiveAllocator::with_seed(0);
        let l = limits(2, 100.0, 1000.0);

        // No status arrives between offers.
        let mut launched = Vec::new();
        for _ in 0..4 {
            let alloc = policy.allocate(&offer(8.0, 64.0), &mut reg, &l).unwrap();
            launched.extend(alloc.tasks.into_iter().map(|t| t.task_id));
        }
        assert_eq!(launched.len(), 2);

        for id in &launched {
            reg.mark_running(id).unwrap();
        }
        assert_eq!(reg.app("app").unwrap().num_running(), 2);
    }

    #[test]
    fn mem_ceiling_uses_running_usage() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("a", 0.1, 64.0, 3), ("b", 0.1, 1.0, 3)]))
            .unwrap();
        // Two running tasks of 64 mem each → usage 128 == ceiling.
        for t in ["r1", "r2"] {
            reg.record_launch("app", "a", t.into(), "ag".into()).unwrap();
            reg.mark_running(&t.into()).unwrap();
        }
        let mut policy = NaiveAllocator::with_seed(0);

        let alloc = policy
            .allocate(&offer(8.0, 512.0), &mut reg, &limits(5, 100.0, 128.0))
            .unwrap();
        assert!(alloc.is_empty(), "app at mem ceiling must be skipped");

        let below = policy
            .allocate(&offer(8.0, 512.0), &mut reg, &limits(5, 100.0, 129.0))
            .unwrap();
        assert_eq!(below.tasks.len(), 2);
    }

    #[test]
    fn unrecordable_launch_is_left_out_without_side_effects() {
        let mut reg = Registry::new();
        reg.register(app("app", &[("exec", 1.0, 16.0, 3)])).unwrap();
        reg.record_launch("app", "exec", "taken".into(), "ag".into())
            .unwrap();

        let mut request = NaiveAllocator::build_request(
            "app",
            reg.app("app").unwrap().executor("exec").unwrap(),
            &offer(1.0, 16.0),
        );
        request.task_id = "taken".into();

        assert!(!NaiveAllocator::record(&mut reg, "app", "exec", &request));
        assert_eq!(reg.tracked_tasks(), 1);
        assert_eq!(reg.app("app").unwrap().num_launched(), 1);

        let fresh = NaiveAllocator::build_request(
            "app",
            reg.app("app").unwrap().executor("exec").unwrap(),
            &offer(1.0, 16.0),
        );
        assert!(NaiveAllocator::record(&mut reg, "app", "exec", &fresh));
        assert_eq!(reg.resolve(&fresh.task_id).unwrap().agent_id.as_str(), "agent-1");
    }

    // ── Capacity guarantee ────────────────────────────────────────────────────

    #[test]
    fn launches_never_exceed_offer_capacity() {
        for seed in 0..50 {
            let mut reg = Registry::new();
            reg.register(app("a", &[("x", 0.75, 20.0, 3), ("y", 0.5, 40.0, 3)]))
                .unwrap();
            reg.register(app("b", &[("x", 1.25, 10.0, 3)])).unwrap();
            reg.register(app("c", &[("x", 0.3, 30.0, 3), ("z", 2.0, 5.0, 3)]))
                .unwrap();
            let mut policy = NaiveAllocator::with_seed(seed);
            let o = offer(2.0, 64.0);

            let alloc = policy
                .allocate(&o, &mut reg, &limits(5, 3.0, 256.0))
                .unwrap();
            let used = alloc.consumed();
            assert!(used.cpus <= 2.0 + 1e-9, "seed {seed}: cpus {}", used.cpus);
            assert!(used.mem <= 64.0 + 1e-9, "seed {seed}: mem {}", used.mem);
            assert!((alloc.remaining.cpus - (2.0 - used.cpus)).abs() < 1e-9);
            assert_eq!(reg.tracked_tasks(), alloc.tasks.len());
        }
    }

    #[test]
    fn application_order_varies_between_offers() {
        // With many one-slot apps and an offer that fits exactly one task, the
        // winner should not always be the same application.
        let mut winners = std::collections::BTreeSet::new();
        let mut policy = NaiveAllocator::with_seed(42);
        for _ in 0..40 {
            let mut reg = Registry::new();
            for name in ["a", "b", "c", "d"] {
                reg.register(app(name, &[("x", 1.0, 1.0, 1)])).unwrap();
            }
            let alloc = policy
                .allocate(&offer(1.0, 1.0), &mut reg, &limits(5, 3.0, 256.0))
                .unwrap();
            assert_eq!(alloc.tasks.len(), 1);
            let owner = reg.resolve(&alloc.tasks[0].task_id).unwrap().app.clone();
            winners.insert(owner);
        }
        assert!(winners.len() > 1, "shuffle never changed the winner");
    }

    #[test]
    fn empty_registry_yields_empty_allocation() {
        let mut reg = Registry::new();
        let mut policy = NaiveAllocator::new();
        let alloc = policy
            .allocate(&offer(1.0, 1.0), &mut reg, &AllocationLimits::default())
            .unwrap();
        assert!(alloc.is_empty());
        assert_eq!(policy.name(), "naive");
    }

    #[test]
    fn skip_reason_messages_carry_values() {
        let r = SkipReason::InsufficientCpu {
            required: 1.5,
            remaining: 0.5,
        };
        assert_eq!(r.to_string(), "needs 1.50 cpus but offer only has 0.50 left");
    }
}
