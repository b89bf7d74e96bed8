// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod spec construction for remote workers.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Pod, PodSpec, Probe, ResourceRequirements, TCPSocketAction,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use outpost_core::Caps;

/// Parameters for building a worker pod.
pub(super) struct PodParams {
    pub pod_name: String,
    pub namespace: String,
    /// Container image reference from the task.
    pub image: String,
    /// Port the worker's file service listens on.
    pub service_port: i32,
    /// Resource requests from the task's capabilities.
    pub caps: Caps,
    /// Task id, recorded as a label.
    pub task_id: String,
}

/// Build a Pod spec for a worker. The pod runs to completion exactly
/// once; the orchestrator deletes it on slot removal.
pub(super) fn build_pod(params: &PodParams) -> Pod {
    let main_container = Container {
        name: "worker".to_string(),
        image: Some(params.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: params.service_port,
            ..Default::default()
        }]),
        resources: resource_requests(&params.caps),
        // The worker is up once its file service accepts connections.
        readiness_probe: Some(Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(params.service_port),
                ..Default::default()
            }),
            period_seconds: Some(5),
            ..Default::default()
        }),
        ..Default::default()
    };

    Pod {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(params.pod_name.clone()),
            namespace: Some(params.namespace.clone()),
            labels: Some(
                [
                    ("app".to_string(), "outpost-worker".to_string()),
                    ("outpost.dev/task-id".to_string(), label_safe(&params.task_id)),
                ]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![main_container],
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn resource_requests(caps: &Caps) -> Option<ResourceRequirements> {
    let mut requests = BTreeMap::new();
    if caps.cpu > 0 {
        requests.insert("cpu".to_string(), Quantity(caps.cpu.to_string()));
    }
    if caps.ram > 0 {
        requests.insert("memory".to_string(), Quantity(format!("{}Mi", caps.ram)));
    }
    if caps.gpu > 0 {
        requests.insert("nvidia.com/gpu".to_string(), Quantity(caps.gpu.to_string()));
    }
    if requests.is_empty() {
        return None;
    }
    Some(ResourceRequirements { requests: Some(requests), ..Default::default() })
}

/// RFC 1123-ish names for pods and label values: lowercase
/// alphanumerics and dashes, bounded length.
pub(super) fn label_safe(s: &str) -> String {
    let mut out: String = s
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() { c } else { '-' }
        })
        .collect();
    out.truncate(40);
    out.trim_matches('-').to_string()
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
