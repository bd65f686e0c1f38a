//! The remote resource provider contract and its gRPC adapter.
//!
//! The composer only ever talks to a [`ResourceProvider`]. Property bags cross
//! the trait with `snake_case` keys; [`GrpcResourceProvider`] translates them
//! to `camelCase` on the wire and back.

use serde_json::Value;
use tonic::transport::Channel;
use tracing::{debug, error, instrument};

use crate::error::ProviderError;
use crate::generated::resource_provider_client::ResourceProviderClient;
use crate::generated::{CreateRequest, DeleteRequest, ReadRequest, UpdateRequest};
use crate::properties::{from_wire, to_wire};
use crate::types::{Handshake, ResourceKind, ResourceOptions, ResourceOutputs};

/// Create/read/update/delete against the orchestration engine's provider.
///
/// Implementations perform no local retries; errors are returned as-is.
///
/// # Example
///
/// ```ignore
/// use eks_component_sdk::{ResourceProvider, ResourceKind, ResourceOptions};
///
/// let outputs = provider
///     .create(ResourceKind::IamRole, "workers-instanceRole", props, &ResourceOptions::default())
///     .await?;
/// println!("{}", outputs.id);
/// ```
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Create a resource and return its id and outputs.
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        properties: Value,
        options: &ResourceOptions,
    ) -> Result<ResourceOutputs, ProviderError>;

    /// Read the current outputs of a resource.
    async fn read(
        &self,
        kind: ResourceKind,
        id: &str,
        properties: Value,
    ) -> Result<ResourceOutputs, ProviderError>;

    /// Update a resource and return its new outputs.
    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        olds: Value,
        news: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        properties: Value,
    ) -> Result<(), ProviderError>;
}

/// A [`ResourceProvider`] reached over gRPC.
#[derive(Debug, Clone)]
pub struct GrpcResourceProvider {
    client: ResourceProviderClient<Channel>,
}

impl GrpcResourceProvider {
    /// Wrap an existing client.
    pub fn new(client: ResourceProviderClient<Channel>) -> Self {
        Self { client }
    }

    /// Connect to a provider listening at `endpoint` (e.g. `http://127.0.0.1:50051`).
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into();
        debug!(endpoint = %endpoint, "Connecting to resource provider");
        let client = ResourceProviderClient::connect(endpoint).await?;
        Ok(Self::new(client))
    }

    /// Connect using the handshake line a provider printed on startup.
    pub async fn from_handshake(line: &str) -> Result<Self, ProviderError> {
        let handshake = Handshake::parse(line)?;
        Self::connect(handshake.endpoint()).await
    }
}

fn encode(properties: &Value) -> Result<Vec<u8>, ProviderError> {
    Ok(serde_json::to_vec(&to_wire(properties))?)
}

fn decode(bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let wire: Value = serde_json::from_slice(bytes)?;
    Ok(from_wire(&wire))
}

#[async_trait::async_trait]
impl ResourceProvider for GrpcResourceProvider {
    #[instrument(skip(self, properties, options), name = "grpc.create", fields(kind = %kind))]
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        properties: Value,
        options: &ResourceOptions,
    ) -> Result<ResourceOutputs, ProviderError> {
        let request = CreateRequest {
            r#type: kind.type_token().to_string(),
            name: name.to_string(),
            properties: encode(&properties)?,
            options: Some(options.clone().into()),
        };

        let response = self
            .client
            .clone()
            .create(request)
            .await
            .map_err(|status| {
                error!(name = %name, code = ?status.code(), "Create failed");
                ProviderError::from(status)
            })?
            .into_inner();

        debug!(name = %name, id = %response.id, "Create completed");
        Ok(ResourceOutputs::new(response.id, decode(&response.outputs)?))
    }

    #[instrument(skip(self, properties), name = "grpc.read", fields(kind = %kind))]
    async fn read(
        &self,
        kind: ResourceKind,
        id: &str,
        properties: Value,
    ) -> Result<ResourceOutputs, ProviderError> {
        let request = ReadRequest {
            r#type: kind.type_token().to_string(),
            id: id.to_string(),
            properties: encode(&properties)?,
        };

        let response = self.client.clone().read(request).await?.into_inner();
        Ok(ResourceOutputs::new(response.id, decode(&response.outputs)?))
    }

    #[instrument(skip(self, olds, news), name = "grpc.update", fields(kind = %kind))]
    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        olds: Value,
        news: Value,
    ) -> Result<Value, ProviderError> {
        let request = UpdateRequest {
            r#type: kind.type_token().to_string(),
            id: id.to_string(),
            olds: encode(&olds)?,
            news: encode(&news)?,
        };

        let response = self.client.clone().update(request).await?.into_inner();
        decode(&response.outputs)
    }

    #[instrument(skip(self, properties), name = "grpc.delete", fields(kind = %kind))]
    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        properties: Value,
    ) -> Result<(), ProviderError> {
        let request = DeleteRequest {
            r#type: kind.type_token().to_string(),
            id: id.to_string(),
            properties: encode(&properties)?,
        };

        self.client.clone().delete(request).await?;
        Ok(())
    }
}
