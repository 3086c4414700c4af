//! Pod-level readings shared by the trace rules: endpoint addresses and per-Pod health.

use kspy_core::style::Style;
use kspy_core::{pluck, pluck_array, pluck_object, pluck_str};
use serde_json::Value;

use crate::line::{Line, Status};

const PULL_ERROR_NOISE: &str = "rpc error: code = Unknown desc = Error response from daemon: ";

/// Condition types checked in priority order; the first not-true one is the Pod's problem.
const CONDITION_ORDER: [&str; 3] = ["PodScheduled", "Initialized", "Ready"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address {
    pub pod: String,
    pub ip: String,
}

impl Address {
    fn label(&self) -> String { format!("{} @ {}", self.pod, self.ip) }
}

/// Ready addresses (`subsets[].addresses`), sorted.
pub fn ready_addresses(endpoints: &Value) -> Vec<Address> { addresses(endpoints, "addresses") }

/// Not-ready addresses (`subsets[].notReadyAddresses`), sorted.
pub fn unready_addresses(endpoints: &Value) -> Vec<Address> { addresses(endpoints, "notReadyAddresses") }

fn addresses(endpoints: &Value, field: &str) -> Vec<Address> {
    let mut out: Vec<Address> = pluck_array(endpoints, &["subsets"])
        .into_iter()
        .flatten()
        .filter_map(|subset| pluck_array(subset, &[field]))
        .flatten()
        .filter_map(|addr| {
            let pod = pluck_str(addr, &["targetRef", "name"])?;
            let ip = pluck_str(addr, &["ip"])?;
            Some(Address { pod: pod.to_string(), ip: ip.to_string() })
        })
        .collect();
    out.sort_by_key(Address::label);
    out
}

pub fn ready_item(addr: &Address) -> Line { address_item(Status::Success, Style::Green, "Ready", addr) }

pub fn unready_item(addr: &Address) -> Line { address_item(Status::Failure, Style::RedBold, "Not live", addr) }

fn address_item(status: Status, tag_style: Style, tag: &str, addr: &Address) -> Line {
    Line::item(status)
        .push(Style::Plain, "[")
        .push(tag_style, tag)
        .push(Style::Plain, "] ")
        .push(Style::Cyan, addr.pod.as_str())
        .push(Style::Plain, " @ ")
        .push(Style::Yellow, addr.ip.as_str())
}

/// Health bullets for one Pod: at most one from its conditions, plus one per failing container.
pub fn pod_status_lines(pod: &Value) -> Vec<Line> {
    let name = pluck_str(pod, &["metadata", "name"]).unwrap_or("");
    let mut out = Vec::new();

    let conditions = pluck_array(pod, &["status", "conditions"]).map(Vec::as_slice).unwrap_or(&[]);
    let find = |ty: &str| conditions.iter().find(|c| pluck_str(c, &["type"]) == Some(ty));
    let mut healthy = true;
    for ty in CONDITION_ORDER {
        let Some(cond) = find(ty) else { continue };
        if pluck_str(cond, &["status"]) != Some("True") {
            healthy = false;
            if let (Some(reason), Some(message)) = (pluck_str(cond, &["reason"]), pluck_str(cond, &["message"])) {
                push_error(&mut out, name, reason, message);
            }
            break;
        }
    }
    if healthy && find("Ready").is_some() {
        out.push(
            Line::item(Status::Success)
                .push(Style::Plain, "[")
                .push(Style::Green, "Ready")
                .push(Style::Plain, "] ")
                .push(Style::Cyan, name),
        );
    }

    for cs in pluck_array(pod, &["status", "containerStatuses"]).into_iter().flatten() {
        if !cs.is_object() || pluck(cs, &["ready"]) == Some(&Value::Bool(true)) {
            continue;
        }
        if let Some(waiting) = pluck_object(cs, &["state", "waiting"]) {
            let reason = waiting.get("reason").and_then(Value::as_str).unwrap_or("");
            if reason != "ContainerCreating" {
                if let Some(message) = waiting.get("message").and_then(Value::as_str) {
                    push_error(&mut out, name, reason, strip_pull_noise(message));
                }
            }
        }
        if let Some(terminated) = pluck_object(cs, &["state", "terminated"]) {
            let reason = terminated.get("reason").and_then(Value::as_str).unwrap_or("");
            let message = match terminated.get("message").and_then(Value::as_str) {
                Some(m) => m.to_string(),
                None => {
                    let code = terminated.get("exitCode").map_or_else(|| "unknown".to_string(), Value::to_string);
                    format!("Container completed with exit code {code}")
                }
            };
            push_error(&mut out, name, reason, &message);
        }
    }
    out
}

fn push_error(out: &mut Vec<Line>, pod: &str, reason: &str, message: &str) {
    if reason.is_empty() || message.is_empty() {
        return;
    }
    out.push(
        Line::item(Status::Failure)
            .push(Style::Plain, "[")
            .push(Style::RedBold, reason)
            .push(Style::Plain, "] ")
            .push(Style::Cyan, pod)
            .push(Style::Plain, format!(" {message}")),
    );
}

/// Image pull failures carry a fixed daemon preamble before the useful part.
pub fn strip_pull_noise(message: &str) -> &str { message.strip_prefix(PULL_ERROR_NOISE).unwrap_or(message) }
