// Remote operations on existing graph nodes

use reqwest::Method;
use serde_json::Value;

use super::common::{parameters_envelope, FilterGraphClient, RemoteError};
use crate::models::schema::{EffectName, NodeState, NodeUid, ParameterSchema, ParameterValues};

/// Fetch a node and unpack its bound effect and values
pub async fn get_node(client: &FilterGraphClient, uid: &NodeUid) -> Result<NodeState, RemoteError> {
    let json = client.get_json(&format!("/node/{}", uid)).await?;
    parse_node_state(&json)
}

/// Fetch the parameter definition of the effect bound to a node
pub async fn get_node_parameter(
    client: &FilterGraphClient,
    uid: &NodeUid,
) -> Result<ParameterSchema, RemoteError> {
    let json = client.get_json(&format!("/node/{}/parameter", uid)).await?;
    Ok(parameters_envelope(json)?.into_iter().collect())
}

/// Push a partial value update to a node
///
/// The server replies with the whole node; the reply is dropped.
pub async fn update_node(
    client: &FilterGraphClient,
    uid: &NodeUid,
    patch: &ParameterValues,
) -> Result<(), RemoteError> {
    let method =
        Method::from_bytes(b"UPDATE").map_err(|e| RemoteError::RequestFailed(e.to_string()))?;
    client
        .send_json(method, &format!("/node/{}", uid), patch)
        .await?;
    Ok(())
}

/// Create a node for an effect with the given constructor values
///
/// Returns the uid the server assigned.
pub async fn add_node(
    client: &FilterGraphClient,
    effect: &EffectName,
    values: &ParameterValues,
) -> Result<NodeUid, RemoteError> {
    let payload = (effect.as_str(), values);
    let json = client.send_json(Method::POST, "/node", &payload).await?;
    parse_node_uid(&json)
}

fn node_state(json: &Value) -> Result<&serde_json::Map<String, Value>, RemoteError> {
    json.get("py/state")
        .and_then(Value::as_object)
        .ok_or_else(|| RemoteError::MissingField("py/state".to_string()))
}

/// Unpack `{"py/state": {"effect": {"py/object": .., "py/state": {..}}}}`
pub(crate) fn parse_node_state(json: &Value) -> Result<NodeState, RemoteError> {
    let effect = node_state(json)?
        .get("effect")
        .ok_or_else(|| RemoteError::MissingField("effect".to_string()))?;

    let effect_type = effect
        .get("py/object")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::MissingField("effect.py/object".to_string()))?;

    let values = match effect.get("py/state") {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        Some(other) => {
            return Err(RemoteError::ParseError(format!(
                "effect state is not an object: {}",
                other
            )))
        }
        None => return Err(RemoteError::MissingField("effect.py/state".to_string())),
    };

    Ok(NodeState {
        effect: EffectName::new(effect_type),
        values,
    })
}

pub(crate) fn parse_node_uid(json: &Value) -> Result<NodeUid, RemoteError> {
    node_state(json)?
        .get("uid")
        .and_then(Value::as_str)
        .map(NodeUid::new)
        .ok_or_else(|| RemoteError::MissingField("uid".to_string()))
}
