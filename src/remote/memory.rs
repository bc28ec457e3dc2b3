//! In-process graph service.
//!
//! Holds effect definitions and nodes in memory and records every call it
//! receives. Used for offline sessions and as the fake server in tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::common::RemoteError;
use super::service::GraphService;
use crate::models::schema::{EffectName, NodeState, NodeUid, ParameterSchema, ParameterValues};

#[derive(Clone, Debug, PartialEq)]
pub enum RemoteCall {
    GetNode(NodeUid),
    GetNodeParameter(NodeUid),
    GetAllEffects,
    GetEffectParameters(EffectName),
    GetEffectArguments(EffectName),
    UpdateNode(NodeUid, ParameterValues),
    AddNode(EffectName, ParameterValues),
}

struct EffectEntry {
    parameters: ParameterSchema,
    arguments: ParameterValues,
    latency: Option<Duration>,
}

struct NodeEntry {
    effect: EffectName,
    values: ParameterValues,
}

#[derive(Default)]
struct GraphState {
    effects: BTreeMap<EffectName, EffectEntry>,
    nodes: BTreeMap<NodeUid, NodeEntry>,
    calls: Vec<RemoteCall>,
    rejected_parameters: BTreeSet<String>,
    offline: bool,
}

impl GraphState {
    fn record(&mut self, call: RemoteCall) -> Result<(), RemoteError> {
        self.calls.push(call);
        if self.offline {
            return Err(RemoteError::RequestFailed("graph server offline".to_string()));
        }
        Ok(())
    }

    fn effect(&self, effect: &EffectName) -> Result<&EffectEntry, RemoteError> {
        self.effects.get(effect).ok_or_else(|| RemoteError::ApiError {
            status: 404,
            message: format!("Effect not found: {}", effect),
        })
    }

    fn node(&self, uid: &NodeUid) -> Result<&NodeEntry, RemoteError> {
        self.nodes.get(uid).ok_or_else(not_found)
    }
}

fn not_found() -> RemoteError {
    RemoteError::ApiError {
        status: 404,
        message: "Node not found".to_string(),
    }
}

#[derive(Default)]
pub struct InMemoryGraph {
    state: Mutex<GraphState>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect(
        mut self,
        effect: impl Into<EffectName>,
        parameters: ParameterSchema,
        arguments: ParameterValues,
    ) -> Self {
        self.state.get_mut().effects.insert(
            effect.into(),
            EffectEntry {
                parameters,
                arguments,
                latency: None,
            },
        );
        self
    }

    /// Delay the schema reply for one effect (the argument reply is immediate).
    pub fn with_latency(mut self, effect: impl Into<EffectName>, latency: Duration) -> Self {
        let effect: EffectName = effect.into();
        if let Some(entry) = self.state.get_mut().effects.get_mut(&effect) {
            entry.latency = Some(latency);
        }
        self
    }

    pub fn with_node(
        mut self,
        uid: impl Into<NodeUid>,
        effect: impl Into<EffectName>,
        values: ParameterValues,
    ) -> Self {
        self.state.get_mut().nodes.insert(
            uid.into(),
            NodeEntry {
                effect: effect.into(),
                values,
            },
        );
        self
    }

    /// Make every update touching `parameter` fail with a server error.
    pub fn rejecting_updates_for(mut self, parameter: &str) -> Self {
        self.state
            .get_mut()
            .rejected_parameters
            .insert(parameter.to_string());
        self
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn accept_updates_for(&self, parameter: &str) {
        self.state.lock().await.rejected_parameters.remove(parameter);
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn node_values(&self, uid: &NodeUid) -> Option<ParameterValues> {
        let state = self.state.lock().await;
        state.nodes.get(uid).map(|node| node.values.clone())
    }
}

#[async_trait]
impl GraphService for InMemoryGraph {
    async fn get_node(&self, uid: &NodeUid) -> Result<NodeState, RemoteError> {
        let mut state = self.state.lock().await;
        state.record(RemoteCall::GetNode(uid.clone()))?;
        let node = state.node(uid)?;
        Ok(NodeState {
            effect: node.effect.clone(),
            values: node.values.clone(),
        })
    }

    async fn get_node_parameter(&self, uid: &NodeUid) -> Result<ParameterSchema, RemoteError> {
        let mut state = self.state.lock().await;
        state.record(RemoteCall::GetNodeParameter(uid.clone()))?;
        let effect = state.node(uid)?.effect.clone();
        Ok(state.effect(&effect)?.parameters.clone())
    }

    async fn get_all_effects(&self) -> Result<Vec<EffectName>, RemoteError> {
        let mut state = self.state.lock().await;
        state.record(RemoteCall::GetAllEffects)?;
        // Reverse order so callers cannot rely on the server sorting
        Ok(state.effects.keys().rev().cloned().collect())
    }

    async fn get_effect_parameters(
        &self,
        effect: &EffectName,
    ) -> Result<ParameterSchema, RemoteError> {
        let (parameters, latency) = {
            let mut state = self.state.lock().await;
            state.record(RemoteCall::GetEffectParameters(effect.clone()))?;
            let entry = state.effect(effect)?;
            (entry.parameters.clone(), entry.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(parameters)
    }

    async fn get_effect_arguments(
        &self,
        effect: &EffectName,
    ) -> Result<ParameterValues, RemoteError> {
        let mut state = self.state.lock().await;
        state.record(RemoteCall::GetEffectArguments(effect.clone()))?;
        Ok(state.effect(effect)?.arguments.clone())
    }

    async fn update_node(
        &self,
        uid: &NodeUid,
        patch: &ParameterValues,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.record(RemoteCall::UpdateNode(uid.clone(), patch.clone()))?;
        if let Some(name) = patch
            .keys()
            .find(|name| state.rejected_parameters.contains(name.as_str()))
        {
            return Err(RemoteError::ApiError {
                status: 500,
                message: format!("could not update {}", name),
            });
        }
        let node = state.nodes.get_mut(uid).ok_or_else(not_found)?;
        node.values
            .extend(patch.iter().map(|(name, value)| (name.clone(), value.clone())));
        Ok(())
    }

    async fn add_node(
        &self,
        effect: &EffectName,
        values: &ParameterValues,
    ) -> Result<NodeUid, RemoteError> {
        let mut state = self.state.lock().await;
        state.record(RemoteCall::AddNode(effect.clone(), values.clone()))?;
        state.effect(effect)?;
        let uid = NodeUid::new(Uuid::new_v4().simple().to_string());
        state.nodes.insert(
            uid.clone(),
            NodeEntry {
                effect: effect.clone(),
                values: values.clone(),
            },
        );
        Ok(uid)
    }
}
