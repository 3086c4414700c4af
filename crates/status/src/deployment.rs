//! Deployment rollout judgement: Deployment conditions, the current and previous
//! ReplicaSets, and the health of the Pods behind each.

use std::cmp::Reverse;

use kspy_core::style::Style;
use kspy_core::{owned_by, parse_revision, pluck_array, pluck_i64, pluck_str, WatchEvent};
use kspy_store::{ResourceStateTable, TrackedKind};
use serde_json::Value;
use tracing::trace;

use crate::line::{event_style, Line, Status};
use crate::pods::pod_status_lines;

pub fn deployment_lines(table: &ResourceStateTable) -> Vec<Line> {
    let mut out = Vec::new();
    let mut current_revision = None;

    if let Some(deploy) = table.singleton(TrackedKind::Deployment) {
        out.push(Line::header(deploy.kind, &deploy.object));
        match parse_revision(&deploy.object) {
            Ok(rev) => {
                current_revision = Some(rev);
                out.extend(rollout_body(&deploy.object, rev));
            }
            Err(e) => {
                trace!(error = %e, "deployment revision unavailable");
                out.push(Line::failure("Waiting for controller to create Deployment"));
            }
        }
    }

    out.push(Line::blank());

    let (current, previous) = pick_replica_sets(table, current_revision);
    match (current, current_revision) {
        (Some(rs), Some(rev)) => {
            out.push(Line::heading(Style::CyanBold, "ROLLOUT STATUS:"));
            out.push(identity_line(Style::YellowBold, "Current rollout", rev, rs));
            let spec = pluck_i64(&rs.object, &["spec", "replicas"]).unwrap_or(1);
            let available = pluck_i64(&rs.object, &["status", "availableReplicas"]).unwrap_or(0);
            out.push(if available >= spec {
                Line::success(format!("ReplicaSet is available [{available} Pods available of a {spec} minimum]"))
            } else {
                Line::pending(format!(
                    "Waiting for ReplicaSet to attain minimum available Pods ({available} available of a {spec} minimum)"
                ))
            });
            out.extend(owned_pod_lines(table, &rs.object));
        }
        _ => out.push(Line::note(Status::Pending, "Waiting for Deployment controller to create ReplicaSet")),
    }

    if let Some(prev) = previous {
        out.push(Line::blank());
        out.push(identity_line(Style::Bold, "Previous ReplicaSet", prev.revision, prev.event).faint());
        out.push(
            Line::pending(format!("Waiting for ReplicaSet to scale to 0 Pods ({} currently exist)", prev.replicas)).faint(),
        );
        out.extend(owned_pod_lines(table, &prev.event.object).into_iter().map(Line::faint));
    }
    out
}

fn rollout_body(deploy: &Value, revision: i64) -> Vec<Line> {
    let spec = pluck_i64(deploy, &["spec", "replicas"]).unwrap_or(1);
    let available = pluck_i64(deploy, &["status", "availableReplicas"]).unwrap_or(0);
    let Some(conditions) = pluck_array(deploy, &["status", "conditions"]) else {
        return vec![
            Line::failure(format!("Deployment does not have minimum replicas (0 out of {spec})")),
            Line::failure("Deployment has not begun to roll out the change"),
        ];
    };

    let find = |ty: &str| conditions.iter().find(|c| pluck_str(c, &["type"]) == Some(ty));
    let is_true = |c: Option<&Value>| c.and_then(|c| pluck_str(c, &["status"])) == Some("True");
    let available_cond = find("Available");
    let progressing = find("Progressing");

    let mut out = vec![Line::heading(Style::Bold, format!("    Rolling out Deployment revision {revision}"))];
    out.push(if is_true(available_cond) {
        Line::success("Deployment is currently available")
    } else {
        Line::failure(format!(
            "Deployment is failing; {available} out of {spec} Pods are available: {}",
            condition_reason(available_cond)
        ))
    });
    out.push(if !is_true(progressing) {
        Line::failure(format!(
            "Rollout has failed; controller is no longer rolling forward: {}",
            condition_reason(progressing)
        ))
    } else if progressing.and_then(|c| pluck_str(c, &["reason"])) == Some("NewReplicaSetAvailable") {
        Line::success("Rollout successful: new ReplicaSet marked 'available'")
    } else {
        Line::pending(format!("Rollout proceeding: {}", condition_reason(progressing)))
    });
    out
}

/// `[reason] message` when both are strings, else empty.
fn condition_reason(cond: Option<&Value>) -> String {
    let Some(cond) = cond else { return String::new() };
    match (pluck_str(cond, &["reason"]), pluck_str(cond, &["message"])) {
        (Some(reason), Some(message)) => format!("[{reason}] {message}"),
        _ => String::new(),
    }
}

fn identity_line(label_style: Style, label: &str, revision: i64, rs: &WatchEvent) -> Line {
    Line::heading(Style::Plain, "- [")
        .push(label_style, label)
        .push(Style::Plain, format!(" | Revision {revision}] ["))
        .push(event_style(rs.kind), rs.kind.as_str())
        .push(Style::Plain, format!("]  {}", rs.identity()))
}

fn owned_pod_lines(table: &ResourceStateTable, rs: &Value) -> Vec<Line> {
    let api_version = pluck_str(rs, &["apiVersion"]).unwrap_or("");
    let kind = pluck_str(rs, &["kind"]).unwrap_or("");
    let name = pluck_str(rs, &["metadata", "name"]).unwrap_or("");
    table
        .collection(TrackedKind::Pod)
        .filter(|pod| owned_by(&pod.object, api_version, kind, name))
        .flat_map(|pod| pod_status_lines(&pod.object))
        .collect()
}

#[derive(Debug)]
struct PreviousReplicaSet<'a> {
    event: &'a WatchEvent,
    revision: i64,
    replicas: i64,
}

/// Current: the ReplicaSet at `current_revision`. Previous: among the other ReplicaSets
/// that still run Pods, the one with the most replicas, then the higher revision, then the
/// smaller name.
fn pick_replica_sets(
    table: &ResourceStateTable,
    current_revision: Option<i64>,
) -> (Option<&WatchEvent>, Option<PreviousReplicaSet<'_>>) {
    let mut current = None;
    let mut previous: Option<PreviousReplicaSet<'_>> = None;
    for rs in table.collection(TrackedKind::ReplicaSet) {
        let Ok(revision) = parse_revision(&rs.object) else { continue };
        if Some(revision) == current_revision {
            current = Some(rs);
            continue;
        }
        let replicas = pluck_i64(&rs.object, &["status", "replicas"]).unwrap_or(0);
        if replicas <= 0 {
            continue;
        }
        let candidate = PreviousReplicaSet { event: rs, revision, replicas };
        let key = |p: &PreviousReplicaSet<'_>| (p.replicas, p.revision, Reverse(p.event.name().to_string()));
        if previous.as_ref().map_or(true, |p| key(&candidate) > key(p)) {
            previous = Some(candidate);
        }
    }
    (current, previous)
}
