// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::Harness;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

/// Work unit that replays scripted results and records every call
struct FakeWork {
    name: String,
    timeout: u64,
    run_result: TaskResult,
    timeout_result: TaskResult,
    log: Log,
}

impl FakeWork {
    fn new(name: &str, timeout: u64, run_result: TaskResult, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            timeout,
            run_result,
            timeout_result: TaskResult::TimedOut,
            log: Rc::clone(log),
        }
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().push(format!("{}:{}", call, self.name));
    }
}

impl TaskWork for FakeWork {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn run(&mut self, _ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.record("run");
        (self.run_result, format!("{} result", self.name))
    }

    fn on_timeout(&mut self, _ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.record("timeout");
        (self.timeout_result, "unit timeout".to_string())
    }

    fn abort(&mut self, _ctx: &mut Context<'_>) {
        self.record("abort");
    }

    fn handle_event(&mut self, event: &StrategyEvent, _ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostAudit => EventOutcome::Handled,
            StrategyEvent::HostStateChanged { .. } => {
                EventOutcome::Complete(TaskResult::Success, String::new())
            }
            _ => EventOutcome::Ignored,
        }
    }
}

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn calls(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn task_timeout_is_sum_plus_one() {
    let log = log();
    let task = StateTask::new(
        "task",
        vec![
            FakeWork::new("a", 5, TaskResult::Success, &log),
            FakeWork::new("b", 10, TaskResult::Success, &log),
            FakeWork::new("c", 0, TaskResult::Success, &log),
        ],
    );
    assert_eq!(task.timeout_secs(), 16);

    let empty: StateTask<FakeWork> = StateTask::new("empty", vec![]);
    assert_eq!(empty.timeout_secs(), 0);
}

#[test]
fn zero_timeout_unit_arms_no_timer() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new("task", vec![FakeWork::new("a", 0, TaskResult::Wait, &log)]);

    assert_eq!(task.start(&mut h.ctx()), Progress::Waiting);

    // Task timer is also zero, so nothing is armed at all
    assert!(h.timers.is_empty());
}

#[test]
fn units_run_in_order_and_accumulate_result() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new(
        "task",
        vec![
            FakeWork::new("a", 5, TaskResult::Success, &log),
            FakeWork::new("b", 5, TaskResult::Degraded, &log),
            FakeWork::new("c", 5, TaskResult::Success, &log),
        ],
    );

    let progress = task.start(&mut h.ctx());

    assert_eq!(progress, Progress::done(TaskResult::Degraded, "b result"));
    assert_eq!(calls(&log), vec!["run:a", "run:b", "run:c"]);
    assert!(!task.inprogress());
    assert!(h.timers.is_empty());
}

#[test]
fn waiting_unit_suspends_and_resumes_at_same_index() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new(
        "task",
        vec![
            FakeWork::new("a", 5, TaskResult::Wait, &log),
            FakeWork::new("b", 5, TaskResult::Success, &log),
        ],
    );

    assert_eq!(task.start(&mut h.ctx()), Progress::Waiting);
    assert_eq!(calls(&log), vec!["run:a"]);
    // Task timer plus unit timer
    assert_eq!(h.timers.len(), 2);

    let progress = task.task_work_complete(TaskResult::Success, String::new(), &mut h.ctx());

    assert_eq!(progress, Progress::done(TaskResult::Success, ""));
    assert_eq!(calls(&log), vec!["run:a", "run:b"]);
    assert!(h.timers.is_empty());
}

#[test]
fn failure_unwinds_in_reverse_order() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new(
        "task",
        vec![
            FakeWork::new("0", 5, TaskResult::Success, &log),
            FakeWork::new("1", 5, TaskResult::Success, &log),
            FakeWork::new("2", 5, TaskResult::Wait, &log),
            FakeWork::new("3", 5, TaskResult::Success, &log),
        ],
    );

    task.start(&mut h.ctx());
    let progress = task.task_work_complete(TaskResult::Failed, "lock failed".to_string(), &mut h.ctx());

    assert_eq!(progress, Progress::done(TaskResult::Failed, "lock failed"));
    assert_eq!(
        calls(&log),
        vec!["run:0", "run:1", "run:2", "abort:2", "abort:1", "abort:0"]
    );
}

#[test]
fn external_abort_unwinds_from_current_unit() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new(
        "task",
        vec![
            FakeWork::new("0", 5, TaskResult::Success, &log),
            FakeWork::new("1", 5, TaskResult::Success, &log),
            FakeWork::new("2", 5, TaskResult::Wait, &log),
        ],
    );

    task.start(&mut h.ctx());
    task.abort(&mut h.ctx());

    assert_eq!(task.result(), TaskResult::Aborted);
    assert_eq!(
        calls(&log),
        vec!["run:0", "run:1", "run:2", "abort:2", "abort:1", "abort:0"]
    );
    assert!(h.timers.is_empty());
}

#[test]
fn unit_timeout_reporting_timed_out_completes_task() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new("task", vec![FakeWork::new("a", 10, TaskResult::Wait, &log)]);

    task.start(&mut h.ctx());
    let fired = h.advance(10);
    assert_eq!(fired.len(), 1);

    let progress = task.handle_timer(fired[0], &mut h.ctx());

    assert_eq!(
        progress,
        Some(Progress::done(TaskResult::TimedOut, "unit timeout"))
    );
    assert_eq!(calls(&log), vec!["run:a", "timeout:a", "abort:a"]);
    assert!(h.timers.is_empty());
}

#[test]
fn unit_timeout_with_success_continues() {
    let mut h = Harness::new();
    let log = log();
    let mut stabilize = FakeWork::new("a", 10, TaskResult::Wait, &log);
    stabilize.timeout_result = TaskResult::Success;
    let mut task = StateTask::new(
        "task",
        vec![stabilize, FakeWork::new("b", 5, TaskResult::Success, &log)],
    );

    task.start(&mut h.ctx());
    let fired = h.advance(10);
    let progress = task.handle_timer(fired[0], &mut h.ctx());

    assert_eq!(progress, Some(Progress::done(TaskResult::Success, "")));
    assert_eq!(calls(&log), vec!["run:a", "timeout:a", "run:b"]);
}

#[test]
fn whole_task_timer_reports_timeout() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new(
        "task",
        vec![
            FakeWork::new("a", 0, TaskResult::Success, &log),
            FakeWork::new("b", 0, TaskResult::Wait, &log),
            FakeWork::new("c", 4, TaskResult::Success, &log),
        ],
    );
    assert_eq!(task.timeout_secs(), 5);

    task.start(&mut h.ctx());
    let fired = h.advance(5);
    assert_eq!(fired.len(), 1);

    let progress = task.handle_timer(fired[0], &mut h.ctx());

    assert_eq!(progress, Some(Progress::done(TaskResult::TimedOut, "timeout")));
    assert_eq!(calls(&log), vec!["run:a", "run:b", "abort:b", "abort:a"]);
}

#[test]
fn foreign_timer_is_not_claimed() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new("task", vec![FakeWork::new("a", 10, TaskResult::Wait, &log)]);
    task.start(&mut h.ctx());

    assert_eq!(task.handle_timer(TimerId(999), &mut h.ctx()), None);
}

#[test]
fn events_reach_only_the_waiting_unit() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new(
        "task",
        vec![
            FakeWork::new("a", 5, TaskResult::Wait, &log),
            FakeWork::new("b", 5, TaskResult::Success, &log),
        ],
    );

    // Not started: nothing is handled
    assert_eq!(task.handle_event(&StrategyEvent::HostAudit, &mut h.ctx()), None);

    task.start(&mut h.ctx());
    assert_eq!(
        task.handle_event(&StrategyEvent::InstanceAudit, &mut h.ctx()),
        None
    );
    assert_eq!(
        task.handle_event(&StrategyEvent::HostAudit, &mut h.ctx()),
        Some(Progress::Waiting)
    );

    let changed = StrategyEvent::HostStateChanged {
        host_name: "compute-0".to_string(),
    };
    assert_eq!(
        task.handle_event(&changed, &mut h.ctx()),
        Some(Progress::done(TaskResult::Success, ""))
    );
}

#[test]
fn late_completion_after_abort_is_ignored() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new("task", vec![FakeWork::new("a", 5, TaskResult::Wait, &log)]);

    task.start(&mut h.ctx());
    task.abort(&mut h.ctx());

    let progress = task.task_work_complete(TaskResult::Success, String::new(), &mut h.ctx());
    assert_eq!(progress, Progress::Waiting);
    assert_eq!(task.result(), TaskResult::Aborted);
}

#[test]
fn refresh_timeouts_rearms_running_timers() {
    let mut h = Harness::new();
    let log = log();
    let mut task = StateTask::new("task", vec![FakeWork::new("a", 10, TaskResult::Wait, &log)]);

    // Not started: refresh is a no-op
    task.refresh_timeouts(&mut h.ctx());
    assert!(h.timers.is_empty());

    task.start(&mut h.ctx());
    task.work_mut()[0].timeout = 20;
    task.refresh_timeouts(&mut h.ctx());

    assert_eq!(task.timeout_secs(), 21);
    assert_eq!(h.timers.len(), 2);
    // The old 10s unit timer is gone
    assert!(h.advance(10).is_empty());
}
