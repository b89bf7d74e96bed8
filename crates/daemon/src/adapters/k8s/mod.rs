// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes driver — runs workers as pods.
//!
//! Each task becomes a pod whose container serves its own file tree on
//! a TCP port. The orchestrator creates pods via the Kubernetes API,
//! reads their phase and IP from pod status, and deletes them on kill.
//! Persisted receipts carry the pod name and namespace so a restarted
//! orchestrator can find its containers again.

mod pod;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use outpost_core::{Receipt, Task};
use tracing::{debug, info};
use uuid::Uuid;

use super::{RemotePhase, RemoteStatus, SpawnError, Spawner};
use crate::storage::ReceiptStore;

/// Spawner that drives a Kubernetes cluster.
#[derive(Clone)]
pub struct KubernetesSpawner {
    client: Client,
    namespace: String,
    service_port: i32,
    store: ReceiptStore,
}

impl KubernetesSpawner {
    /// Connect with in-cluster or kubeconfig credentials. The receipt
    /// store backs `list`.
    pub async fn connect(store: ReceiptStore) -> Result<Self, SpawnError> {
        let client = Client::try_default()
            .await
            .map_err(|e| SpawnError::Spawn(format!("failed to create kube client: {e}")))?;
        Ok(Self {
            client,
            namespace: std::env::var("OUTPOST_K8S_NAMESPACE")
                .unwrap_or_else(|_| "default".to_string()),
            service_port: std::env::var("OUTPOST_K8S_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(564),
            store,
        })
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Namespace recorded in a receipt, falling back to the configured
    /// one for receipts written before the field existed.
    fn receipt_namespace(&self, receipt: &Receipt) -> String {
        receipt
            .extra
            .get("namespace")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.namespace)
            .to_string()
    }
}

#[async_trait]
impl Spawner for KubernetesSpawner {
    async fn spawn(&self, task: &Task) -> Result<Receipt, SpawnError> {
        let image = task
            .image
            .as_ref()
            .filter(|i| !i.name.is_empty())
            .ok_or_else(|| SpawnError::Spawn("task has no image".to_string()))?;

        let suffix = Uuid::new_v4().simple().to_string();
        let pod_name = format!("outpost-{}-{}", pod::label_safe(&task.id), &suffix[..8]);
        let params = pod::PodParams {
            pod_name: pod_name.clone(),
            namespace: self.namespace.clone(),
            image: image.name.clone(),
            service_port: self.service_port,
            caps: task.caps.unwrap_or_default(),
            task_id: task.id.clone(),
        };

        info!(task = %task.id, pod = %pod_name, namespace = %self.namespace, "creating pod");
        self.pods(&self.namespace)
            .create(&PostParams::default(), &pod::build_pod(&params))
            .await
            .map_err(|e| SpawnError::Spawn(format!("pod creation failed: {e}")))?;

        let mut extra = serde_json::Map::new();
        extra.insert("namespace".to_string(), self.namespace.clone().into());
        // The address is resolved later, once the pod reports an IP.
        Ok(Receipt { addr: String::new(), name: pod_name, slot: None, extra })
    }

    async fn describe(&self, receipt: &Receipt) -> Result<RemoteStatus, SpawnError> {
        let namespace = self.receipt_namespace(receipt);
        let pod = match self.pods(&namespace).get_opt(&receipt.name).await {
            Ok(Some(pod)) => pod,
            // A pod the cluster no longer knows is gone for good.
            Ok(None) => return Ok(RemoteStatus { phase: RemotePhase::Stopped, addr: None }),
            Err(e) => return Err(SpawnError::Describe(e.to_string())),
        };

        let status = pod.status.unwrap_or_default();
        let phase = match status.phase.as_deref() {
            Some("Running") => RemotePhase::Running,
            Some("Succeeded") | Some("Failed") => RemotePhase::Stopped,
            _ => RemotePhase::Pending,
        };
        let addr = status.pod_ip.map(|ip| format!("{}:{}", ip, self.service_port));
        Ok(RemoteStatus { phase, addr })
    }

    async fn kill(&self, receipt: &Receipt) -> Result<(), SpawnError> {
        let namespace = self.receipt_namespace(receipt);
        match self.pods(&namespace).delete(&receipt.name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Already gone counts as killed.
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(pod = %receipt.name, "kill: pod already gone");
                Ok(())
            }
            Err(e) => Err(SpawnError::Kill(e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Receipt>, SpawnError> {
        self.store.list().map_err(|e| SpawnError::List(e.to_string()))
    }
}
