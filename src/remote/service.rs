use async_trait::async_trait;

use super::common::{FilterGraphClient, RemoteError};
use super::{effects, nodes};
use crate::models::schema::{EffectName, NodeState, NodeUid, ParameterSchema, ParameterValues};

/// The graph server calls the editor depends on.
///
/// Implemented over HTTP by [`FilterGraphClient`] and in-process by
/// [`super::memory::InMemoryGraph`].
#[async_trait]
pub trait GraphService: Send + Sync {
    async fn get_node(&self, uid: &NodeUid) -> Result<NodeState, RemoteError>;

    async fn get_node_parameter(&self, uid: &NodeUid) -> Result<ParameterSchema, RemoteError>;

    async fn get_all_effects(&self) -> Result<Vec<EffectName>, RemoteError>;

    async fn get_effect_parameters(
        &self,
        effect: &EffectName,
    ) -> Result<ParameterSchema, RemoteError>;

    async fn get_effect_arguments(
        &self,
        effect: &EffectName,
    ) -> Result<ParameterValues, RemoteError>;

    async fn update_node(&self, uid: &NodeUid, patch: &ParameterValues)
        -> Result<(), RemoteError>;

    async fn add_node(
        &self,
        effect: &EffectName,
        values: &ParameterValues,
    ) -> Result<NodeUid, RemoteError>;
}

#[async_trait]
impl GraphService for FilterGraphClient {
    async fn get_node(&self, uid: &NodeUid) -> Result<NodeState, RemoteError> {
        nodes::get_node(self, uid).await
    }

    async fn get_node_parameter(&self, uid: &NodeUid) -> Result<ParameterSchema, RemoteError> {
        nodes::get_node_parameter(self, uid).await
    }

    async fn get_all_effects(&self) -> Result<Vec<EffectName>, RemoteError> {
        effects::get_all_effects(self).await
    }

    async fn get_effect_parameters(
        &self,
        effect: &EffectName,
    ) -> Result<ParameterSchema, RemoteError> {
        effects::get_effect_parameters(self, effect).await
    }

    async fn get_effect_arguments(
        &self,
        effect: &EffectName,
    ) -> Result<ParameterValues, RemoteError> {
        effects::get_effect_arguments(self, effect).await
    }

    async fn update_node(
        &self,
        uid: &NodeUid,
        patch: &ParameterValues,
    ) -> Result<(), RemoteError> {
        nodes::update_node(self, uid, patch).await
    }

    async fn add_node(
        &self,
        effect: &EffectName,
        values: &ParameterValues,
    ) -> Result<NodeUid, RemoteError> {
        nodes::add_node(self, effect, values).await
    }
}
