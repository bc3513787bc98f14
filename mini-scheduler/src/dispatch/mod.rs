/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Provider callback surface.
//!
//! [`Framework`] owns the [`Registry`] and wires the allocator, the lifecycle
//! bookkeeping and the [`TerminationCoordinator`] together.  Every entry
//! point takes `&mut self` plus the driver, so callbacks are processed one at
//! a time.
//!
//! ```text
//! resource_offers ─▶ AllocationPolicy ─▶ Registry ─▶ driver.accept_offer
//!
//! status_update ─▶ resolve app ─▶ mark_running / mark_stopped
//!               ─▶ check_application ─▶ driver.send_framework_message (stops)
//!               ─▶ check_session     ─▶ driver.request_shutdown
//!               ─▶ driver.acknowledge (explicit mode)
//! ```
//!
//! LOST, KILLED and FAILED abort the session.  Once aborted, offers and
//! status events are ignored.

use tracing::{debug, error, info, warn};

use crate::control::ControlMessage;
use crate::driver::SchedulerDriver;
use crate::registry::view::{self, ApplicationView};
use crate::registry::{Application, Registry, RegistryError};
use crate::scheduler::{AllocationLimits, AllocationPolicy, SchedulerError};
use crate::task::{AgentId, Offer, OfferId, StatusEvent, TaskState};
use crate::termination::{StopSignal, TerminationCoordinator};

/// Default refuse hint sent with every accept.
pub const DEFAULT_REFUSE_SECONDS: f64 = 1.0;

pub struct Framework {
    registry: Registry,
    limits: AllocationLimits,
    policy: Box<dyn AllocationPolicy>,
    coordinator: TerminationCoordinator,
    explicit_acknowledgements: bool,
    refuse_seconds: f64,
    aborted: bool,
}

impl Framework {
    pub fn new(
        registry: Registry,
        limits: AllocationLimits,
        policy: Box<dyn AllocationPolicy>,
        coordinator: TerminationCoordinator,
    ) -> Self {
        Self {
            registry,
            limits,
            policy,
            coordinator,
            explicit_acknowledgements: false,
            refuse_seconds: DEFAULT_REFUSE_SECONDS,
            aborted: false,
        }
    }

    pub fn with_explicit_acknowledgements(mut self, enabled: bool) -> Self {
        self.explicit_acknowledgements = enabled;
        self
    }

    pub fn with_refuse_seconds(mut self, seconds: f64) -> Self {
        self.refuse_seconds = seconds;
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn limits(&self) -> &AllocationLimits {
        &self.limits
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn shutdown_requested(&self) -> bool {
        self.coordinator.shutdown_requested()
    }

    pub fn application_names(&self) -> Vec<String> {
        view::application_names(&self.registry)
    }

    pub fn snapshot(&self, app: &str) -> Option<ApplicationView> {
        view::snapshot(&self.registry, app)
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Register `app` while the session runs.  It takes part in the next
    /// offer and holds back shutdown until it is terminated and drained.
    pub fn register_application(&mut self, app: Application) -> Result<(), RegistryError> {
        self.registry.register(app)
    }

    // ── Offers ────────────────────────────────────────────────────────────────

    /// Run one allocation pass per offer and accept each, even when nothing
    /// was launched, so the remainder is returned with the refuse hint.
    pub fn resource_offers(
        &mut self,
        driver: &mut dyn SchedulerDriver,
        offers: &[Offer],
    ) -> Result<(), SchedulerError> {
        if self.aborted {
            debug!(offers = offers.len(), "session aborted, ignoring offers");
            return Ok(());
        }

        for offer in offers {
            let allocation = self
                .policy
                .allocate(offer, &mut self.registry, &self.limits)?;
            driver.accept_offer(&allocation.offer_id, allocation.tasks, self.refuse_seconds);
        }
        Ok(())
    }

    // ── Status updates ────────────────────────────────────────────────────────

    pub fn status_update(
        &mut self,
        driver: &mut dyn SchedulerDriver,
        event: StatusEvent,
    ) -> Result<(), SchedulerError> {
        if self.aborted {
            debug!(task = %event.task_id, state = %event.state, "session aborted, ignoring status");
            return Ok(());
        }

        match event.payload() {
            Some(payload) => debug!(
                task  = %event.task_id,
                phase = payload.phase.as_deref().unwrap_or("-"),
                units = payload.units.unwrap_or(0),
                "status payload"
            ),
            None if !event.message.is_empty() => debug!(
                task  = %event.task_id,
                bytes = event.message.len(),
                "status message is not a JSON payload, ignoring"
            ),
            None => {}
        }

        info!(
            task     = %event.task_id,
            executor = %event.executor_id,
            state    = %event.state,
            "status update"
        );

        let result = self.apply_status(driver, &event);

        if self.explicit_acknowledgements {
            driver.acknowledge(&event);
        }
        result
    }

    fn apply_status(
        &mut self,
        driver: &mut dyn SchedulerDriver,
        event: &StatusEvent,
    ) -> Result<(), SchedulerError> {
        let Some(app) = self
            .registry
            .resolve(&event.task_id)
            .map(|r| r.app.clone())
        else {
            warn!(
                task  = %event.task_id,
                state = %event.state,
                "status for unknown task, dropping"
            );
            return Ok(());
        };

        match event.state {
            TaskState::Staging => return Ok(()),
            TaskState::Running => {
                self.registry.mark_running(&event.task_id)?;
            }
            TaskState::Finished => {
                self.registry.mark_stopped(&event.task_id)?;
            }
            TaskState::Lost | TaskState::Killed | TaskState::Failed => {
                error!(
                    task    = %event.task_id,
                    app     = %app,
                    state   = %event.state,
                    message = %String::from_utf8_lossy(&event.message),
                    "task in unexpected state, aborting"
                );
                self.abort(driver);
                return Ok(());
            }
        }

        let stops = self.coordinator.check_application(&mut self.registry, &app);
        self.send_stops(driver, stops);

        if self.coordinator.check_session(&self.registry) {
            driver.request_shutdown();
        }
        Ok(())
    }

    /// Send one stop per signal.  The application is already terminated, so
    /// a signal that fails to encode is logged and the rest still go out.
    fn send_stops(&self, driver: &mut dyn SchedulerDriver, stops: Vec<StopSignal>) {
        for stop in stops {
            match ControlMessage::stop(stop.task_id.clone()).encode() {
                Ok(bytes) => {
                    debug!(task = %stop.task_id, executor = %stop.executor_id, "sending stop");
                    driver.send_framework_message(&stop.executor_id, &stop.agent_id, bytes);
                }
                Err(e) => error!(
                    task     = %stop.task_id,
                    executor = %stop.executor_id,
                    error    = %e,
                    "could not encode stop message"
                ),
            }
        }
    }

    fn abort(&mut self, driver: &mut dyn SchedulerDriver) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        driver.abort();
    }

    // ── Informational callbacks ───────────────────────────────────────────────

    pub fn registered(&mut self, framework_id: &str, master: &str) {
        info!(framework = %framework_id, master = %master, "registered");
    }

    pub fn reregistered(&mut self, master: &str) {
        info!(master = %master, "re-registered");
    }

    pub fn disconnected(&mut self) {
        warn!("disconnected from provider");
    }

    pub fn offer_rescinded(&mut self, offer: &OfferId) {
        info!(offer = %offer, "offer rescinded");
    }

    pub fn framework_message(&mut self, executor_id: &str, agent_id: &AgentId, data: &[u8]) {
        debug!(
            executor = %executor_id,
            agent    = %agent_id,
            bytes    = data.len(),
            "framework message received"
        );
    }

    pub fn agent_lost(&mut self, agent_id: &AgentId) {
        warn!(agent = %agent_id, "agent lost");
    }

    pub fn executor_lost(&mut self, executor_id: &str, agent_id: &AgentId, status: i32) {
        warn!(executor = %executor_id, agent = %agent_id, status, "executor lost");
    }

    pub fn error(&mut self, message: &str) {
        error!(message = %message, "provider error");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, RecordingDriver};
    use crate::registry::{Application, ExecutorSpec};
    use crate::scheduler::NaiveAllocator;
    use crate::task::{StatusPayload, TaskId};

    fn framework(threshold: usize, instances: u32) -> Framework {
        let mut reg = Registry::new();
        reg.register(
            Application::new("app")
                .with_executor(ExecutorSpec::new("exec", 1.0, 16.0, instances).unwrap())
                .unwrap(),
        )
        .unwrap();
        Framework::new(
            reg,
            AllocationLimits::default(),
            Box::new(NaiveAllocator::with_seed(7)),
            TerminationCoordinator::new(threshold),
        )
    }

    fn launch_one(fw: &mut Framework, driver: &mut RecordingDriver) -> TaskId {
        fw.resource_offers(driver, &[Offer::new("o", "agent-1", 4.0, 64.0)])
            .unwrap();
        driver.launched().last().unwrap().task_id.clone()
    }

    #[test]
    fn offer_is_always_accepted_with_refuse_hint() {
        let mut fw = framework(3, 0).with_refuse_seconds(5.0);
        let mut driver = RecordingDriver::new();
        fw.resource_offers(&mut driver, &[Offer::new("o", "a", 1.0, 1.0)])
            .unwrap();
        match &driver.calls[0] {
            DriverCall::Accept {
                tasks,
                refuse_seconds,
                ..
            } => {
                assert!(tasks.is_empty());
                assert_eq!(*refuse_seconds, 5.0);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn running_then_finished_updates_bookkeeping() {
        let mut fw = framework(3, 1);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);

        fw.status_update(&mut driver, StatusEvent::new(id.clone(), "exec", TaskState::Running))
            .unwrap();
        assert_eq!(fw.snapshot("app").unwrap().running, 1);

        fw.status_update(&mut driver, StatusEvent::new(id.clone(), "exec", TaskState::Finished))
            .unwrap();
        let snap = fw.snapshot("app").unwrap();
        assert_eq!((snap.launched, snap.running), (0, 0));
        assert!(fw.registry().resolve(&id).is_none());
    }

    #[test]
    fn staging_changes_nothing() {
        let mut fw = framework(3, 1);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);

        fw.status_update(&mut driver, StatusEvent::new(id, "exec", TaskState::Staging))
            .unwrap();
        assert_eq!(fw.snapshot("app").unwrap().launched, 1);
    }

    #[test]
    fn unknown_task_is_dropped_but_acknowledged() {
        let mut fw = framework(3, 1).with_explicit_acknowledgements(true);
        let mut driver = RecordingDriver::new();
        fw.status_update(&mut driver, StatusEvent::new("ghost", "exec", TaskState::Running))
            .unwrap();
        assert_eq!(fw.snapshot("app").unwrap().running, 0);
        assert_eq!(driver.calls.len(), 1);
        assert_eq!(driver.acks(), 1);
    }

    #[test]
    fn implicit_mode_never_acknowledges() {
        let mut fw = framework(3, 1);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);
        fw.status_update(&mut driver, StatusEvent::new(id, "exec", TaskState::Running))
            .unwrap();
        assert_eq!(driver.acks(), 0);
    }

    #[test]
    fn malformed_payload_does_not_change_outcome() {
        let mut fw = framework(3, 1);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);

        let event = StatusEvent::new(id, "exec", TaskState::Running)
            .with_message(b"{not json".to_vec());
        fw.status_update(&mut driver, event).unwrap();
        assert_eq!(fw.snapshot("app").unwrap().running, 1);
    }

    #[test]
    fn well_formed_payload_is_accepted() {
        let mut fw = framework(3, 1);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);

        let payload = StatusPayload {
            phase: Some("started".into()),
            ..Default::default()
        };
        let event =
            StatusEvent::new(id, "exec", TaskState::Running).with_message(payload.to_bytes());
        fw.status_update(&mut driver, event).unwrap();
        assert_eq!(fw.snapshot("app").unwrap().running, 1);
    }

    #[test]
    fn unexpected_terminal_state_aborts_once_and_freezes() {
        let mut fw = framework(3, 2).with_explicit_acknowledgements(true);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);

        fw.status_update(&mut driver, StatusEvent::new(id.clone(), "exec", TaskState::Lost))
            .unwrap();
        assert!(fw.is_aborted());
        assert_eq!(driver.aborts(), 1);
        assert_eq!(driver.acks(), 1);

        driver.clear();
        fw.status_update(&mut driver, StatusEvent::new(id, "exec", TaskState::Failed))
            .unwrap();
        fw.resource_offers(&mut driver, &[Offer::new("o2", "agent-1", 4.0, 64.0)])
            .unwrap();
        assert!(driver.calls.is_empty());
    }

    #[test]
    fn threshold_sends_stops_and_drain_requests_shutdown() {
        let mut fw = framework(1, 1);
        let mut driver = RecordingDriver::new();
        let id = launch_one(&mut fw, &mut driver);

        fw.status_update(&mut driver, StatusEvent::new(id.clone(), "exec", TaskState::Running))
            .unwrap();
        let msgs = driver.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].0, "exec");
        assert_eq!(
            ControlMessage::decode(msgs[0].1).unwrap(),
            ControlMessage::stop(id.clone())
        );
        assert!(fw.snapshot("app").unwrap().terminated);
        assert_eq!(driver.shutdowns(), 0);

        fw.status_update(&mut driver, StatusEvent::new(id, "exec", TaskState::Finished))
            .unwrap();
        assert_eq!(driver.shutdowns(), 1);
        assert!(fw.shutdown_requested());
    }

    #[test]
    fn fatal_state_for_unknown_task_is_dropped_without_abort() {
        let mut fw = framework(3, 1);
        let mut driver = RecordingDriver::new();
        for state in [TaskState::Lost, TaskState::Killed, TaskState::Failed] {
            fw.status_update(&mut driver, StatusEvent::new("ghost", "exec", state))
                .unwrap();
        }
        assert!(!fw.is_aborted());
        assert_eq!(driver.aborts(), 0);
        assert!(driver.calls.is_empty());

        // The session still accepts offers afterwards.
        launch_one(&mut fw, &mut driver);
        assert_eq!(driver.launched().len(), 1);
    }

    #[test]
    fn every_running_task_gets_a_stop_on_termination() {
        let mut fw = framework(3, 3);
        let mut driver = RecordingDriver::new();
        let ids: Vec<TaskId> = (0..3).map(|_| launch_one(&mut fw, &mut driver)).collect();
        for id in &ids {
            fw.status_update(&mut driver, StatusEvent::new(id.clone(), "exec", TaskState::Running))
                .unwrap();
        }

        let mut stopped: Vec<TaskId> = driver
            .messages()
            .iter()
            .map(|(_, data)| ControlMessage::decode(data).unwrap().task_id().clone())
            .collect();
        stopped.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(stopped, expected);
    }

    #[test]
    fn application_registered_mid_session_is_offered() {
        let mut fw = framework(3, 0);
        let mut driver = RecordingDriver::new();
        fw.resource_offers(&mut driver, &[Offer::new("o1", "agent-1", 4.0, 64.0)])
            .unwrap();
        assert!(driver.launched().is_empty());

        fw.register_application(
            Application::new("late")
                .with_executor(ExecutorSpec::new("exec", 1.0, 16.0, 1).unwrap())
                .unwrap(),
        )
        .unwrap();
        assert!(matches!(
            fw.register_application(Application::new("late")),
            Err(RegistryError::DuplicateApplication(_))
        ));

        fw.resource_offers(&mut driver, &[Offer::new("o2", "agent-1", 4.0, 64.0)])
            .unwrap();
        let launched = driver.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(fw.registry().resolve(&launched[0].task_id).unwrap().app, "late");
    }

    #[test]
    fn informational_callbacks_do_not_touch_state() {
        let mut fw = framework(3, 1);
        fw.registered("fw-1", "master:5050");
        fw.reregistered("master:5050");
        fw.disconnected();
        fw.offer_rescinded(&"o".into());
        fw.framework_message("exec", &"a".into(), b"hi");
        fw.agent_lost(&"a".into());
        fw.executor_lost("exec", &"a".into(), 1);
        fw.error("boom");
        assert!(!fw.is_aborted());
        assert_eq!(fw.application_names(), vec!["app"]);
    }
}
