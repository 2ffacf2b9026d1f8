// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy display
//!
//! Every line is `field:` padded so that values line up at column 43,
//! indented by nesting level.

use serde_json::Value;
use std::fmt::Write;

const VALUE_COLUMN: usize = 42;

/// Render a strategy in wire form for `show`, `create`, `apply` and `abort`
pub fn format_strategy(strategy: &Value, details: bool) -> String {
    let mut out = String::new();

    let title = match text(strategy, "name").as_str() {
        "sw-patch" => "Patch Strategy",
        "sw-upgrade" => "Upgrade Strategy",
        _ => "Unknown Strategy",
    };
    line(&mut out, &format!("Strategy {}:", title));

    field(&mut out, 2, "strategy-uuid", &text(strategy, "uuid"));
    field(&mut out, 2, "controller-apply-type", &text(strategy, "controller_apply_type"));
    field(&mut out, 2, "storage-apply-type", &text(strategy, "storage_apply_type"));
    let compute_apply_type = text(strategy, "worker_apply_type");
    field(&mut out, 2, "compute-apply-type", &compute_apply_type);
    if compute_apply_type == "parallel" {
        field(
            &mut out,
            2,
            "max-parallel-compute-hosts",
            &text(strategy, "max_parallel_worker_hosts"),
        );
    }
    field(&mut out, 2, "default-instance-action", &text(strategy, "default_instance_action"));
    field(&mut out, 2, "alarm-restrictions", &text(strategy, "alarm_restrictions"));
    let current_phase = text(strategy, "current_phase");
    field(&mut out, 2, "current-phase", &current_phase);
    field(
        &mut out,
        2,
        "current-phase-completion",
        &format!("{}%", text(strategy, "current_phase_completion_percentage")),
    );
    field(&mut out, 2, "state", &text(strategy, "state"));

    let build = &strategy["build_phase"];
    let apply = &strategy["apply_phase"];
    let abort = &strategy["abort_phase"];

    if details {
        for phase in [build, apply, abort] {
            if phase["total-stages"].as_u64().unwrap_or(0) > 0 {
                format_phase(&mut out, phase);
            }
        }
        return out;
    }

    match current_phase.as_str() {
        "build" => phase_result(&mut out, build, "build"),
        "apply" => phase_result(&mut out, apply, "apply"),
        "abort" => {
            let inprogress = in_progress(abort);
            if inprogress {
                field(&mut out, 2, "inprogress", "true");
            }
            field(&mut out, 2, "apply-result", &text(apply, "result"));
            field(&mut out, 2, "apply-reason", &text(apply, "reason"));
            if inprogress {
                field(&mut out, 2, "abort-result", "");
                field(&mut out, 2, "abort-reason", "");
            } else {
                field(&mut out, 2, "abort-result", &text(abort, "result"));
                field(&mut out, 2, "abort-reason", &text(abort, "reason"));
            }
        }
        _ => {}
    }
    out
}

fn phase_result(out: &mut String, phase: &Value, prefix: &str) {
    if in_progress(phase) {
        field(out, 2, "inprogress", "true");
    } else {
        field(out, 2, &format!("{}-result", prefix), &text(phase, "result"));
        field(out, 2, &format!("{}-reason", prefix), &text(phase, "reason"));
    }
}

fn format_phase(out: &mut String, phase: &Value) {
    line(out, &format!("  {}-phase:", text(phase, "phase-name")));
    field(out, 4, "total-stages", &text(phase, "total-stages"));
    field(out, 4, "current-stage", &text(phase, "current-stage"));
    field(out, 4, "stop-at-stage", &text(phase, "stop-at-stage"));
    field_with(out, 4, "timeout", &text(phase, "timeout"), "seconds");
    field(
        out,
        4,
        "completion-percentage",
        &format!("{}%", text(phase, "completion-percentage")),
    );
    field(out, 4, "start-date-time", &text(phase, "start-date-time"));
    if in_progress(phase) {
        field(out, 4, "inprogress", "true");
    } else {
        field(out, 4, "end-date-time", &text(phase, "end-date-time"));
        field(out, 4, "result", &text(phase, "result"));
        field(out, 4, "reason", &text(phase, "reason"));
    }

    line(out, "    stages:");
    for stage in items(phase, "stages") {
        format_stage(out, stage);
        line(out, "");
    }
}

fn format_stage(out: &mut String, stage: &Value) {
    field(out, 8, "stage-id", &text(stage, "stage-id"));
    field(out, 8, "stage-name", &text(stage, "stage-name"));
    field(out, 8, "total-steps", &text(stage, "total-steps"));
    field(out, 8, "current-step", &text(stage, "current-step"));
    field_with(out, 8, "timeout", &text(stage, "timeout"), "seconds");
    field(out, 8, "start-date-time", &text(stage, "start-date-time"));
    if in_progress(stage) {
        field(out, 8, "inprogress", "true");
    } else {
        field(out, 8, "end-date-time", &text(stage, "end-date-time"));
        field(out, 8, "result", &text(stage, "result"));
        field(out, 8, "reason", &text(stage, "reason"));
    }

    line(out, "        steps:");
    for step in items(stage, "steps") {
        format_step(out, step);
        line(out, "");
    }
}

fn format_step(out: &mut String, step: &Value) {
    field(out, 12, "step-id", &text(step, "step-id"));
    field(out, 12, "step-name", &text(step, "step-name"));
    // Entity fields only when the step names something
    for key in ["entity-type", "entity-names", "entity-uuids"] {
        let value = text(step, key);
        if !value.is_empty() {
            field(out, 12, key, &value);
        }
    }
    field_with(out, 12, "timeout", &text(step, "timeout"), "seconds");
    for key in ["start-date-time", "end-date-time"] {
        let value = text(step, key);
        if !value.is_empty() {
            field(out, 12, key, &value);
        }
    }
    field(out, 12, "result", &text(step, "result"));
    field(out, 12, "reason", &text(step, "reason"));
}

fn in_progress(value: &Value) -> bool {
    value["inprogress"].as_bool().unwrap_or(false)
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value[key].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Display text for a wire value; lists are comma separated
fn text(value: &Value, key: &str) -> String {
    match &value[key] {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(values) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn field(out: &mut String, indent: usize, name: &str, value: &str) {
    field_with(out, indent, name, value, "");
}

fn field_with(out: &mut String, indent: usize, name: &str, value: &str, suffix: &str) {
    let pad = VALUE_COLUMN.saturating_sub(indent + name.len() + 1);
    let formatted = format!(
        "{:indent$}{}:{:pad$}{} {}",
        "",
        name,
        "",
        value,
        suffix,
        indent = indent,
        pad = pad
    );
    line(out, formatted.trim_end());
}

fn line(out: &mut String, text: &str) {
    let _ = writeln!(out, "{}", text);
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
