//! Glue between the kube-runtime controller and the reconciler.
//!
//! The controller watches `EC2Instance` objects, serializes work per object,
//! and requeues failed keys. Each delivered object is reduced to its key and
//! handed to [`Reconciler::reconcile`].

use std::sync::Arc;

use ec2_operator_core::OperatorConfig;
use ec2_operator_crd::Ec2Instance;
use ec2_operator_reconciler::{Error, ReconcileOutcome, Reconciler};
use futures::StreamExt;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, warn};

/// Shared state handed to every reconcile call.
pub struct Context {
    pub reconciler: Reconciler,
    pub config: OperatorConfig,
}

impl Context {
    /// Create a new context.
    pub const fn new(reconciler: Reconciler, config: OperatorConfig) -> Self {
        Self { reconciler, config }
    }
}

/// Reconcile one delivered object.
///
/// # Errors
///
/// Returns the reconciler's error unchanged; `error_policy` decides when the
/// key is retried.
pub async fn reconcile(object: Arc<Ec2Instance>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = object.record_key()?;
    let outcome = ctx.reconciler.reconcile(&key).await?;
    debug!(key = %key, outcome = outcome.label(), "Reconcile finished");
    Ok(action_for(&outcome))
}

/// Controller action for a successful pass.
pub fn action_for(outcome: &ReconcileOutcome) -> Action {
    outcome
        .requeue_after()
        .map_or_else(Action::await_change, Action::requeue)
}

/// Requeue policy for failed passes.
pub fn error_policy(object: Arc<Ec2Instance>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        name = %object.name_any(),
        namespace = ?object.namespace(),
        error = %error,
        requeue_secs = ctx.config.error_requeue.as_secs(),
        "Reconcile failed, requeueing"
    );
    Action::requeue(ctx.config.error_requeue)
}

/// Run the controller until a shutdown signal arrives.
pub async fn run(client: Client, ctx: Arc<Context>) {
    let api: Api<Ec2Instance> = match ctx.config.namespace.as_deref() {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    info!(
        namespace = ctx.config.namespace.as_deref().unwrap_or("*"),
        "Starting EC2Instance controller"
    );

    Controller::new(api, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => debug!(name = %object.name, "Reconciled"),
                Err(e) => warn!(error = %e, "Controller error"),
            }
        })
        .await;

    info!("EC2Instance controller stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::time::Duration;

    use super::*;
    use async_trait::async_trait;
    use ec2_operator_crd::Ec2InstanceSpec;
    use ec2_operator_reconciler::{
        InMemoryRecordStore, InstanceId, InstanceProvisioner, ProvisioningRequest, Result,
    };

    struct FixedProvisioner;

    #[async_trait]
    impl InstanceProvisioner for FixedProvisioner {
        async fn create_instance(&self, _request: &ProvisioningRequest) -> Result<InstanceId> {
            Ok(InstanceId::new("i-0abc"))
        }
    }

    fn web_1() -> Ec2Instance {
        let mut object = Ec2Instance::new(
            "web-1",
            Ec2InstanceSpec {
                image_id: "ami-123".to_string(),
                instance_type: "t3.micro".to_string(),
                subnet_id: "subnet-abc".to_string(),
                tags: [("env".to_string(), "prod".to_string())].into(),
            },
        );
        object.metadata.namespace = Some("default".to_string());
        object
    }

    fn context(store: Arc<InMemoryRecordStore>) -> Arc<Context> {
        let reconciler = Reconciler::new(store, Arc::new(FixedProvisioner));
        Arc::new(Context::new(
            reconciler,
            OperatorConfig::default().error_requeue(Duration::from_secs(7)),
        ))
    }

    #[test]
    fn test_success_awaits_change() {
        let outcome = ReconcileOutcome::Provisioned {
            instance_id: InstanceId::new("i-0abc"),
        };
        assert_eq!(action_for(&outcome), Action::await_change());
        assert_eq!(
            action_for(&ReconcileOutcome::RecordMissing),
            Action::await_change()
        );
    }

    #[test]
    fn test_error_policy_uses_configured_delay() {
        let ctx = context(InMemoryRecordStore::new_arc());
        let action = error_policy(
            Arc::new(web_1()),
            &Error::provisioning_failed("throttled"),
            ctx,
        );
        assert_eq!(action, Action::requeue(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_reconcile_provisions_delivered_object() {
        let store = InMemoryRecordStore::new_arc();
        store.insert(web_1().to_record().unwrap()).await;
        let ctx = context(store.clone());

        let action = reconcile(Arc::new(web_1()), ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        let key = web_1().record_key().unwrap();
        let status = store.status_of(&key).await.unwrap();
        assert_eq!(status.instance_id, "i-0abc");
    }

    #[tokio::test]
    async fn test_reconcile_deleted_object_is_noop() {
        let ctx = context(InMemoryRecordStore::new_arc());
        let action = reconcile(Arc::new(web_1()), ctx).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_reconcile_rejects_object_without_namespace() {
        let mut object = web_1();
        object.metadata.namespace = None;
        let result = reconcile(Arc::new(object), context(InMemoryRecordStore::new_arc())).await;
        assert!(matches!(result, Err(Error::InvalidRecord { .. })));
    }
}
