//! Core types for the reconciler.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State label written once an instance has been created.
pub const RUNNING_STATE: &str = "running";

/// Every provisioning request asks for exactly this many instances.
pub const INSTANCE_COUNT: i32 = 1;

/// Prefix mixed into client tokens so they never collide with other tools.
const CLIENT_TOKEN_SCOPE: &str = "ec2.my.domain/v1alpha1/EC2Instance";

/// Identity of one desired-state record (`namespace/name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    /// Create a new record key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Object-store identity of a fetched record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordMeta {
    pub namespace: String,
    pub name: String,
    /// Store-assigned unique id, stable for the record's lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Version the snapshot was read at; status writes are checked against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl RecordMeta {
    /// Create metadata for a record without uid or version.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the uid.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Set the resource version.
    #[must_use]
    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.resource_version = Some(version.into());
        self
    }

    /// Key addressing this record.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.namespace, &self.name)
    }
}

/// Declared intent for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceSpec {
    #[serde(rename = "imageID")]
    pub image_id: String,
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    #[serde(rename = "subnetID")]
    pub subnet_id: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl InstanceSpec {
    /// Create a spec without tags.
    pub fn new(
        image_id: impl Into<String>,
        instance_type: impl Into<String>,
        subnet_id: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            instance_type: instance_type.into(),
            subnet_id: subnet_id.into(),
            tags: HashMap::new(),
        }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Observed result of provisioning.
///
/// An empty `instance_id` means "not yet provisioned". Once set it is never
/// cleared, and it is the only thing preventing a second create.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceStatus {
    #[serde(rename = "instanceID", default)]
    pub instance_id: String,
    #[serde(default)]
    pub state: String,
}

impl InstanceStatus {
    /// Status for a freshly created instance.
    pub fn provisioned(instance_id: &InstanceId) -> Self {
        Self {
            instance_id: instance_id.as_str().to_string(),
            state: RUNNING_STATE.to_string(),
        }
    }

    /// Whether the idempotency guard is set.
    pub fn is_provisioned(&self) -> bool {
        !self.instance_id.is_empty()
    }
}

/// A desired-state record as read from the store, with its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredStateRecord {
    pub meta: RecordMeta,
    pub spec: InstanceSpec,
    #[serde(default)]
    pub status: InstanceStatus,
}

impl DesiredStateRecord {
    /// Create an unprovisioned record.
    pub fn new(meta: RecordMeta, spec: InstanceSpec) -> Self {
        Self {
            meta,
            spec,
            status: InstanceStatus::default(),
        }
    }

    /// Replace the status.
    #[must_use]
    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    /// Key addressing this record.
    pub fn key(&self) -> RecordKey {
        self.meta.key()
    }
}

/// Provider-assigned instance identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap a provider identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the provider handed back an empty identifier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A key/value tag applied to the created instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Request handed to the provisioner, built fresh for each attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub image_id: String,
    pub instance_type: String,
    pub subnet_id: String,
    /// Always `INSTANCE_COUNT`.
    pub count: i32,
    /// One entry per spec tag, sorted by key.
    pub tags: Vec<Tag>,
    /// Deterministic per record identity so a retried create is deduplicated
    /// by the provider.
    pub client_token: String,
}

impl ProvisioningRequest {
    /// Build the request for a record's spec.
    pub fn from_record(record: &DesiredStateRecord) -> Self {
        let spec = &record.spec;
        let tags = spec
            .tags
            .iter()
            .sorted_by_key(|(key, _)| *key)
            .map(|(key, value)| Tag::new(key, value))
            .collect_vec();

        Self {
            image_id: spec.image_id.clone(),
            instance_type: spec.instance_type.clone(),
            subnet_id: spec.subnet_id.clone(),
            count: INSTANCE_COUNT,
            tags,
            client_token: client_token_for(&record.meta),
        }
    }
}

/// Derive the provider idempotency token for a record.
///
/// Namespace, name, and uid all feed the token, so a record deleted and
/// recreated under the same name gets a fresh token.
///
/// The spec does not feed the token. If a status write fails and the spec is
/// edited before the retry, the provider sees the same token with different
/// parameters and rejects the create with `IdempotentParameterMismatch`
/// until the token expires.
pub fn client_token_for(meta: &RecordMeta) -> String {
    let identity = format!(
        "{CLIENT_TOKEN_SCOPE}/{}/{}/{}",
        meta.namespace,
        meta.name,
        meta.uid.as_deref().unwrap_or_default()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, identity.as_bytes()).to_string()
}

/// What a single reconcile pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No record under the key (deleted). Nothing to do.
    RecordMissing,
    /// Guard already set; no provider call was made.
    AlreadyProvisioned { instance_id: InstanceId },
    /// An instance was created and recorded in status.
    Provisioned { instance_id: InstanceId },
}

impl ReconcileOutcome {
    /// Delay before the dispatcher should look at the key again.
    ///
    /// Successful passes never ask for a requeue; the next change event
    /// drives the next pass.
    pub const fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::RecordMissing | Self::AlreadyProvisioned { .. } | Self::Provisioned { .. } => {
                None
            }
        }
    }

    /// Whether this pass created an instance.
    pub const fn created(&self) -> bool {
        matches!(self, Self::Provisioned { .. })
    }

    /// Short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::RecordMissing => "record-missing",
            Self::AlreadyProvisioned { .. } => "already-provisioned",
            Self::Provisioned { .. } => "provisioned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_record() -> DesiredStateRecord {
        DesiredStateRecord::new(
            RecordMeta::new("default", "web-1").with_uid("3f0c"),
            InstanceSpec::new("ami-123", "t3.micro", "subnet-abc")
                .with_tag("env", "prod")
                .with_tag("app", "web")
                .with_tag("team", "infra"),
        )
    }

    #[test]
    fn test_record_key_display() {
        assert_eq!(RecordKey::new("default", "web-1").to_string(), "default/web-1");
    }

    #[test]
    fn test_status_guard() {
        assert!(!InstanceStatus::default().is_provisioned());

        let status = InstanceStatus::provisioned(&InstanceId::new("i-0abc"));
        assert!(status.is_provisioned());
        assert_eq!(status.state, RUNNING_STATE);
    }

    #[test]
    fn test_request_copies_spec_fields() {
        let request = ProvisioningRequest::from_record(&web_record());

        assert_eq!(request.image_id, "ami-123");
        assert_eq!(request.instance_type, "t3.micro");
        assert_eq!(request.subnet_id, "subnet-abc");
        assert_eq!(request.count, 1);
    }

    #[test]
    fn test_request_tags_sorted_by_key() {
        let request = ProvisioningRequest::from_record(&web_record());
        let keys: Vec<&str> = request.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["app", "env", "team"]);
    }

    #[test]
    fn test_request_without_tags() {
        let record = DesiredStateRecord::new(
            RecordMeta::new("default", "bare"),
            InstanceSpec::new("ami-1", "t3.nano", "subnet-1"),
        );
        assert!(ProvisioningRequest::from_record(&record).tags.is_empty());
    }

    #[test]
    fn test_client_token_stable_for_identity() {
        let meta = RecordMeta::new("default", "web-1").with_uid("3f0c");
        let again = meta.clone().with_resource_version("42");
        assert_eq!(client_token_for(&meta), client_token_for(&again));
        assert!(client_token_for(&meta).len() <= 64);
    }

    #[test]
    fn test_client_token_differs_across_identities() {
        let base = RecordMeta::new("default", "web-1").with_uid("3f0c");
        let other_name = RecordMeta::new("default", "web-2").with_uid("3f0c");
        let other_ns = RecordMeta::new("staging", "web-1").with_uid("3f0c");
        let recreated = RecordMeta::new("default", "web-1").with_uid("9a71");

        let token = client_token_for(&base);
        assert_ne!(token, client_token_for(&other_name));
        assert_ne!(token, client_token_for(&other_ns));
        assert_ne!(token, client_token_for(&recreated));
    }

    #[test]
    fn test_client_token_ignores_spec_edits() {
        let meta = RecordMeta::new("default", "web-1").with_uid("3f0c");
        let before = DesiredStateRecord::new(
            meta.clone(),
            InstanceSpec::new("ami-1", "t3.micro", "subnet-1"),
        );
        let after = DesiredStateRecord::new(
            meta,
            InstanceSpec::new("ami-2", "t3.large", "subnet-1").with_tag("env", "prod"),
        );

        assert_eq!(
            ProvisioningRequest::from_record(&before).client_token,
            ProvisioningRequest::from_record(&after).client_token
        );
    }

    #[test]
    fn test_outcomes_never_requeue() {
        let id = InstanceId::new("i-0abc");
        assert_eq!(ReconcileOutcome::RecordMissing.requeue_after(), None);
        assert_eq!(
            ReconcileOutcome::AlreadyProvisioned {
                instance_id: id.clone()
            }
            .requeue_after(),
            None
        );
        assert_eq!(
            ReconcileOutcome::Provisioned { instance_id: id }.requeue_after(),
            None
        );
    }
}
