//! Service judgement: is the Service wired to an address and to live Pods?

use kspy_core::style::Style;
use kspy_core::{pluck_array, pluck_str, WatchEvent};
use kspy_store::{ResourceStateTable, TrackedKind};
use serde_json::Value;

use crate::line::{Line, Status};
use crate::pods::{ready_addresses, ready_item, unready_addresses, unready_item};

pub fn service_lines(table: &ResourceStateTable) -> Vec<Line> {
    let endpoints = table.singleton(TrackedKind::Endpoints);
    let mut out = Vec::new();
    let mut svc_type = String::from("ClusterIP");

    if let Some(svc) = table.singleton(TrackedKind::Service) {
        out.push(Line::header(svc.kind, &svc.object));
        if let Some(t) = pluck_str(&svc.object, &["spec", "type"]) {
            svc_type = t.to_string();
        }
        match svc_type.as_str() {
            "ClusterIP" | "NodePort" => {
                out.push(endpoints_created(svc, endpoints));
                out.push(match pluck_str(&svc.object, &["spec", "clusterIP"]) {
                    Some(ip) if !ip.is_empty() => {
                        Line::success("Successfully allocated a cluster-internal IP: ").push(Style::Cyan, ip)
                    }
                    _ => Line::failure("Waiting for cluster-internal IP to be allocated"),
                });
            }
            "LoadBalancer" => {
                out.push(endpoints_created(svc, endpoints));
                let ingress = ingress_points(&svc.object);
                if ingress.is_empty() {
                    out.push(Line::failure("Waiting for public IP/host to be allocated"));
                } else {
                    out.push(Line::success("Service allocated the following IPs/hostnames:"));
                    out.extend(ingress.into_iter().map(|i| Line::item(Status::Success).push(Style::Cyan, i)));
                }
            }
            "ExternalName" => out.push(match pluck_str(&svc.object, &["spec", "externalName"]) {
                Some(name) if !name.is_empty() => Line::success("Service proxying to '")
                    .push(Style::Cyan, name)
                    .push(Style::Plain, "'"),
                _ => Line::failure("Service not given a URI to proxy to in `.spec.externalName`"),
            }),
            _ => {}
        }
    }

    out.push(Line::blank());

    match endpoints {
        Some(ep) => {
            out.push(Line::header(ep.kind, &ep.object));
            let ready = ready_addresses(&ep.object);
            let unready = unready_addresses(&ep.object);
            let items = ready.iter().map(ready_item).chain(unready.iter().map(unready_item));
            if !unready.is_empty() {
                out.push(Line::failure("Directs traffic to the following live Pods:"));
                out.extend(items);
            } else if !ready.is_empty() {
                out.push(Line::success("Directs traffic to the following live Pods:"));
                out.extend(items);
            } else {
                out.push(Line::failure("Does not direct traffic to any Pods"));
            }
        }
        None if svc_type != "ExternalName" => {
            out.push(Line::note(Status::Failure, "Waiting for live Pods to be targeted by service"));
        }
        None => {}
    }
    out
}

fn endpoints_created(svc: &WatchEvent, endpoints: Option<&WatchEvent>) -> Line {
    match endpoints {
        Some(ep) if !ep.is_deleted() => Line::success("Successfully created Endpoints object '")
            .push(Style::Cyan, svc.name())
            .push(Style::Plain, "' to direct traffic to Pods"),
        _ => Line::failure("Waiting for Endpoints object to be created, to direct traffic to Pods"),
    }
}

/// `status.loadBalancer.ingress` as sorted `ip/hostname` labels.
fn ingress_points(svc: &Value) -> Vec<String> {
    let mut points: Vec<String> = pluck_array(svc, &["status", "loadBalancer", "ingress"])
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let parts: Vec<&str> =
                [pluck_str(entry, &["ip"]), pluck_str(entry, &["hostname"])].into_iter().flatten().collect();
            (!parts.is_empty()).then(|| parts.join("/"))
        })
        .collect();
    points.sort();
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use kspy_core::EventKind;
    use serde_json::json;

    fn svc(spec: Value, status: Value) -> WatchEvent {
        WatchEvent::new(
            EventKind::Added,
            json!({"apiVersion": "v1", "kind": "Service", "metadata": {"namespace": "prod", "name": "web"}, "spec": spec, "status": status}),
        )
    }

    fn endpoints(kind: EventKind, subsets: Value) -> WatchEvent {
        WatchEvent::new(
            kind,
            json!({"apiVersion": "v1", "kind": "Endpoints", "metadata": {"namespace": "prod", "name": "web"}, "subsets": subsets}),
        )
    }

    fn table(events: Vec<(TrackedKind, WatchEvent)>) -> ResourceStateTable {
        let mut t = ResourceStateTable::new();
        for (k, e) in events {
            t.record(k, e);
        }
        t
    }

    fn count(lines: &[Line], status: Status) -> usize {
        lines.iter().filter(|l| l.kind() == crate::line::LineKind::Status(status)).count()
    }

    #[test]
    fn healthy_cluster_ip_service_is_all_green() {
        let t = table(vec![
            (TrackedKind::Service, svc(json!({"type": "ClusterIP", "clusterIP": "10.0.0.1"}), json!({}))),
            (
                TrackedKind::Endpoints,
                endpoints(EventKind::Added, json!([{"addresses": [{"ip": "10.1.0.3", "targetRef": {"name": "web-a"}}]}])),
            ),
        ]);
        let lines = service_lines(&t);
        assert_eq!(count(&lines, Status::Success), 3);
        assert_eq!(count(&lines, Status::Failure), 0);
        let text: Vec<_> = lines.iter().map(Line::plain_text).collect();
        assert!(text.contains(&"    ✅ Successfully allocated a cluster-internal IP: 10.0.0.1".to_string()));
        assert!(text.contains(&"       - [Ready] web-a @ 10.1.0.3".to_string()));
    }

    #[test]
    fn missing_type_means_cluster_ip_and_waits_for_endpoints() {
        let t = table(vec![(TrackedKind::Service, svc(json!({}), json!({})))]);
        let text: Vec<_> = service_lines(&t).iter().map(Line::plain_text).collect();
        assert_eq!(
            text,
            vec![
                "[ADDED v1/Service]  prod/web",
                "    ❌ Waiting for Endpoints object to be created, to direct traffic to Pods",
                "    ❌ Waiting for cluster-internal IP to be allocated",
                "",
                "❌ Waiting for live Pods to be targeted by service",
            ]
        );
    }

    #[test]
    fn deleted_endpoints_do_not_count_as_created() {
        let t = table(vec![
            (TrackedKind::Service, svc(json!({"type": "ClusterIP", "clusterIP": "10.0.0.1"}), json!({}))),
            (TrackedKind::Endpoints, endpoints(EventKind::Deleted, json!([{"addresses": [{"ip": "1.1.1.1", "targetRef": {"name": "x"}}]}]))),
        ]);
        let lines = service_lines(&t);
        assert_eq!(lines[1].plain_text(), "    ❌ Waiting for Endpoints object to be created, to direct traffic to Pods");
        assert!(lines.iter().any(|l| l.plain_text() == "    ❌ Does not direct traffic to any Pods"));
    }

    #[test]
    fn load_balancer_ingress_is_sorted() {
        let t = table(vec![(
            TrackedKind::Service,
            svc(json!({"type": "LoadBalancer"}), json!({"loadBalancer": {"ingress": [{"hostname": "b"}, {"ip": "10.0.0.5"}, {}]}})),
        )]);
        let lines = service_lines(&t);
        let items: Vec<_> = lines.iter().filter(|l| matches!(l.kind(), crate::line::LineKind::Item(_))).map(Line::text).collect();
        assert_eq!(items, vec!["10.0.0.5", "b"]);
        assert!(lines.iter().any(|l| l.text() == "Service allocated the following IPs/hostnames:"));
    }

    #[test]
    fn load_balancer_without_ingress_waits() {
        for status in [json!({}), json!({"loadBalancer": {"ingress": []}}), json!({"loadBalancer": {"ingress": "x"}})] {
            let t = table(vec![(TrackedKind::Service, svc(json!({"type": "LoadBalancer"}), status))]);
            assert!(service_lines(&t).iter().any(|l| l.text() == "Waiting for public IP/host to be allocated"));
        }
    }

    #[test]
    fn external_name_skips_pod_section() {
        let t = table(vec![(TrackedKind::Service, svc(json!({"type": "ExternalName", "externalName": "db.example.com"}), json!({})))]);
        let text: Vec<_> = service_lines(&t).iter().map(Line::plain_text).collect();
        assert_eq!(text, vec!["[ADDED v1/Service]  prod/web", "    ✅ Service proxying to 'db.example.com'", ""]);

        let t = table(vec![(TrackedKind::Service, svc(json!({"type": "ExternalName"}), json!({})))]);
        assert!(service_lines(&t).iter().any(|l| l.text() == "Service not given a URI to proxy to in `.spec.externalName`"));
    }

    #[test]
    fn unready_pods_turn_the_list_red() {
        let t = table(vec![(
            TrackedKind::Endpoints,
            endpoints(
                EventKind::Modified,
                json!([{
                    "addresses": [{"ip": "10.1.0.3", "targetRef": {"name": "web-a"}}],
                    "notReadyAddresses": [{"ip": "10.1.0.4", "targetRef": {"name": "web-b"}}],
                }]),
            ),
        )]);
        let text: Vec<_> = service_lines(&t).iter().map(Line::plain_text).collect();
        assert_eq!(
            text,
            vec![
                "",
                "[MODIFIED v1/Endpoints]  prod/web",
                "    ❌ Directs traffic to the following live Pods:",
                "       - [Ready] web-a @ 10.1.0.3",
                "       - [Not live] web-b @ 10.1.0.4",
            ]
        );
    }
}
