//! `EC2Instance` custom resource.

use std::collections::BTreeMap;

use ec2_operator_reconciler::{
    DesiredStateRecord, Error, InstanceSpec, InstanceStatus, RecordKey, RecordMeta, Result,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the custom resource.
pub const GROUP: &str = "ec2.my.domain";

/// API version of the custom resource.
pub const VERSION: &str = "v1alpha1";

/// Desired EC2 instance.
#[derive(CustomResource, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ec2.my.domain",
    version = "v1alpha1",
    kind = "EC2Instance",
    root = "Ec2Instance",
    plural = "ec2instances",
    shortname = "ec2",
    namespaced,
    status = "Ec2InstanceStatus",
    printcolumn = r#"{"name":"Instance","type":"string","jsonPath":".status.instanceID"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct Ec2InstanceSpec {
    /// Boot image (AMI) id.
    #[serde(rename = "imageID")]
    pub image_id: String,

    /// Instance type, e.g. `t3.micro`.
    #[serde(rename = "instanceType")]
    pub instance_type: String,

    /// Subnet the instance is placed in.
    #[serde(rename = "subnetID")]
    pub subnet_id: String,

    /// Tags applied to the instance at creation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Observed state of an `EC2Instance`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Ec2InstanceStatus {
    /// Provider-assigned id. Empty until the instance is created.
    #[serde(rename = "instanceID", default)]
    pub instance_id: String,

    /// Coarse lifecycle label.
    #[serde(default)]
    pub state: String,
}

impl From<Ec2InstanceSpec> for InstanceSpec {
    fn from(spec: Ec2InstanceSpec) -> Self {
        Self {
            image_id: spec.image_id,
            instance_type: spec.instance_type,
            subnet_id: spec.subnet_id,
            tags: spec.tags.into_iter().collect(),
        }
    }
}

impl From<Ec2InstanceStatus> for InstanceStatus {
    fn from(status: Ec2InstanceStatus) -> Self {
        Self {
            instance_id: status.instance_id,
            state: status.state,
        }
    }
}

impl From<&InstanceStatus> for Ec2InstanceStatus {
    fn from(status: &InstanceStatus) -> Self {
        Self {
            instance_id: status.instance_id.clone(),
            state: status.state.clone(),
        }
    }
}

impl Ec2Instance {
    /// Key of this object, as delivered to the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRecord` if name or namespace is unset.
    pub fn record_key(&self) -> Result<RecordKey> {
        let name = self
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::invalid_record("EC2Instance has no name"))?;
        let namespace = self
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| Error::invalid_record(format!("EC2Instance '{name}' has no namespace")))?;
        Ok(RecordKey::new(namespace, name))
    }

    /// Snapshot this object as a desired-state record.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRecord` if name or namespace is unset.
    pub fn to_record(&self) -> Result<DesiredStateRecord> {
        let key = self.record_key()?;
        let meta = RecordMeta {
            namespace: key.namespace,
            name: key.name,
            uid: self.metadata.uid.clone(),
            resource_version: self.metadata.resource_version.clone(),
        };
        let status = self.status.clone().map(InstanceStatus::from).unwrap_or_default();

        Ok(DesiredStateRecord::new(meta, self.spec.clone().into()).with_status(status))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use kube::CustomResourceExt;
    use kube::core::Resource;

    fn web_1() -> Ec2Instance {
        let mut object = Ec2Instance::new(
            "web-1",
            Ec2InstanceSpec {
                image_id: "ami-123".to_string(),
                instance_type: "t3.micro".to_string(),
                subnet_id: "subnet-abc".to_string(),
                tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            },
        );
        object.metadata.namespace = Some("default".to_string());
        object.metadata.uid = Some("5b2f6c1e".to_string());
        object.metadata.resource_version = Some("481".to_string());
        object
    }

    #[test]
    fn test_crd_names() {
        let crd = Ec2Instance::crd();
        assert_eq!(crd.spec.group, GROUP);
        assert_eq!(crd.spec.names.kind, "EC2Instance");
        assert_eq!(crd.spec.names.plural, "ec2instances");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.versions[0].name, VERSION);
        assert!(crd.spec.versions[0].subresources.is_some());
    }

    #[test]
    fn test_api_version() {
        assert_eq!(Ec2Instance::api_version(&()), "ec2.my.domain/v1alpha1");
        assert_eq!(Ec2Instance::kind(&()), "EC2Instance");
    }

    #[test]
    fn test_manifest_field_names() {
        let manifest = r"
apiVersion: ec2.my.domain/v1alpha1
kind: EC2Instance
metadata:
  name: web-1
  namespace: default
spec:
  imageID: ami-123
  instanceType: t3.micro
  subnetID: subnet-abc
  tags:
    env: prod
status:
  instanceID: i-0abc
  state: running
";
        let object: Ec2Instance = serde_yaml::from_str(manifest).unwrap();
        assert_eq!(object.spec.image_id, "ami-123");
        assert_eq!(object.spec.subnet_id, "subnet-abc");
        assert_eq!(object.spec.tags.get("env").map(String::as_str), Some("prod"));
        let status = object.status.expect("status present");
        assert_eq!(status.instance_id, "i-0abc");
        assert_eq!(status.state, "running");
    }

    #[test]
    fn test_to_record_without_status() {
        let record = web_1().to_record().unwrap();

        assert_eq!(record.key(), RecordKey::new("default", "web-1"));
        assert_eq!(record.meta.uid.as_deref(), Some("5b2f6c1e"));
        assert_eq!(record.meta.resource_version.as_deref(), Some("481"));
        assert_eq!(record.spec.image_id, "ami-123");
        assert_eq!(record.spec.tags.get("env").map(String::as_str), Some("prod"));
        assert!(!record.status.is_provisioned());
    }

    #[test]
    fn test_to_record_carries_status() {
        let mut object = web_1();
        object.status = Some(Ec2InstanceStatus {
            instance_id: "i-0abc".to_string(),
            state: "running".to_string(),
        });

        let record = object.to_record().unwrap();
        assert!(record.status.is_provisioned());
        assert_eq!(record.status.instance_id, "i-0abc");
    }

    #[test]
    fn test_to_record_requires_namespace() {
        let mut object = web_1();
        object.metadata.namespace = None;
        assert!(matches!(
            object.to_record(),
            Err(Error::InvalidRecord { .. })
        ));
    }
}
