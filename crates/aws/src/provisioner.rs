//! `RunInstances`-backed provisioner.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::operation::run_instances::RunInstancesOutput;
use aws_sdk_ec2::types::{InstanceType, ResourceType, Tag, TagSpecification};
use ec2_operator_core::OperatorConfig;
use ec2_operator_reconciler::{Error, InstanceId, InstanceProvisioner, ProvisioningRequest, Result};
use tracing::{debug, info};

/// Creates EC2 instances in a single region.
///
/// The SDK session is resolved once in [`Ec2Provisioner::connect`] and
/// reused for every request.
#[derive(Clone, Debug)]
pub struct Ec2Provisioner {
    client: Client,
    region: String,
}

impl Ec2Provisioner {
    /// Resolve credentials and build a client for the configured region.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProviderConfig` if the region is empty or credentials
    /// cannot be resolved.
    pub async fn connect(config: &OperatorConfig) -> Result<Self> {
        let region = config.region.trim();
        if region.is_empty() {
            return Err(Error::provider_config("region must not be empty"));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        verify_credentials(sdk_config.credentials_provider(), region).await?;

        info!(region = %region, "EC2 client ready");
        Ok(Self::from_client(Client::new(&sdk_config), region))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

#[async_trait]
impl InstanceProvisioner for Ec2Provisioner {
    async fn create_instance(&self, request: &ProvisioningRequest) -> Result<InstanceId> {
        debug!(
            region = %self.region,
            image_id = %request.image_id,
            client_token = %request.client_token,
            "Calling RunInstances"
        );

        let output = self
            .client
            .run_instances()
            .image_id(&request.image_id)
            .instance_type(InstanceType::from(request.instance_type.as_str()))
            .subnet_id(&request.subnet_id)
            .min_count(request.count)
            .max_count(request.count)
            .client_token(&request.client_token)
            .set_tag_specifications(tag_specifications(request))
            .send()
            .await
            .map_err(|e| Error::provisioning_failed(DisplayErrorContext(&e).to_string()))?;

        first_instance_id(&output)
    }
}

/// Resolve credentials once, at startup.
async fn verify_credentials(
    provider: Option<SharedCredentialsProvider>,
    region: &str,
) -> Result<()> {
    let provider = provider.ok_or_else(|| {
        Error::provider_config(format!(
            "no AWS credentials provider available for region {region}"
        ))
    })?;

    provider.provide_credentials().await.map_err(|e| {
        Error::provider_config(format!(
            "failed to resolve AWS credentials: {}",
            DisplayErrorContext(&e)
        ))
    })?;

    debug!(region = %region, "AWS credentials resolved");
    Ok(())
}

/// Tags to apply to the created instance. `None` when the request has no
/// tags, since EC2 rejects a tag specification with an empty tag list.
fn tag_specifications(request: &ProvisioningRequest) -> Option<Vec<TagSpecification>> {
    if request.tags.is_empty() {
        return None;
    }

    let tags = request
        .tags
        .iter()
        .map(|tag| Tag::builder().key(&tag.key).value(&tag.value).build())
        .collect();

    Some(vec![
        TagSpecification::builder()
            .resource_type(ResourceType::Instance)
            .set_tags(Some(tags))
            .build(),
    ])
}

/// Id of the single instance a one-instance request created.
fn first_instance_id(output: &RunInstancesOutput) -> Result<InstanceId> {
    output
        .instances()
        .first()
        .and_then(|instance| instance.instance_id())
        .filter(|id| !id.is_empty())
        .map(InstanceId::new)
        .ok_or(Error::EmptyProvisioningResponse)
}
