//! Record store backed by the Kubernetes API server.

use async_trait::async_trait;
use ec2_operator_reconciler::{
    DesiredStateRecord, Error, InstanceStatus, RecordKey, RecordMeta, RecordStore, Result,
};
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource};
use serde_json::json;
use tracing::debug;

use crate::resource::{Ec2Instance, Ec2InstanceStatus};

/// Reads `EC2Instance` objects and writes their status subresource.
#[derive(Clone)]
pub struct KubeRecordStore {
    client: Client,
    field_manager: String,
}

impl KubeRecordStore {
    /// Create a store over an API client.
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, namespace: &str) -> Api<Ec2Instance> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl RecordStore for KubeRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>> {
        let object = self
            .api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| Error::store_failed("get", format!("{key}: {e}")))?;

        object.as_ref().map(Ec2Instance::to_record).transpose()
    }

    async fn update_status(&self, meta: &RecordMeta, status: &InstanceStatus) -> Result<()> {
        let key = meta.key();
        let patch = status_patch(meta, status);
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..PatchParams::default()
        };

        debug!(key = %key, "Patching EC2Instance status");
        self.api(&meta.namespace)
            .patch_status(&meta.name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| status_error(&key, e))?;

        Ok(())
    }
}

/// Merge patch replacing the status subresource.
///
/// Carrying `metadata.resourceVersion` makes the API server reject the write
/// with 409 if the object changed since it was read.
fn status_patch(meta: &RecordMeta, status: &InstanceStatus) -> serde_json::Value {
    let mut metadata = json!({ "name": meta.name });
    if let Some(version) = &meta.resource_version {
        metadata["resourceVersion"] = json!(version);
    }

    json!({
        "apiVersion": Ec2Instance::api_version(&()),
        "kind": Ec2Instance::kind(&()),
        "metadata": metadata,
        "status": Ec2InstanceStatus::from(status),
    })
}

fn status_error(key: &RecordKey, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => {
            Error::status_conflict(key.to_string(), resp.message)
        }
        kube::Error::Api(resp) if resp.code == 404 => Error::record_not_found(key.to_string()),
        other => Error::status_persistence(key.to_string(), other.to_string()),
    }
}
