// Remote operations on effect types

use serde_json::Value;

use super::common::{parameters_envelope, FilterGraphClient, RemoteError};
use crate::models::schema::{EffectName, ParameterSchema, ParameterValues};

/// List every effect type the server can instantiate (unsorted)
pub async fn get_all_effects(client: &FilterGraphClient) -> Result<Vec<EffectName>, RemoteError> {
    let json = client.get_json("/effects").await?;
    parse_effect_list(&json)
}

/// Parameter definition of an effect type
pub async fn get_effect_parameters(
    client: &FilterGraphClient,
    effect: &EffectName,
) -> Result<ParameterSchema, RemoteError> {
    let json = client
        .get_json(&format!("/effect/{}/parameter", effect))
        .await?;
    Ok(parameters_envelope(json)?.into_iter().collect())
}

/// Constructor defaults of an effect type
pub async fn get_effect_arguments(
    client: &FilterGraphClient,
    effect: &EffectName,
) -> Result<ParameterValues, RemoteError> {
    let json = client.get_json(&format!("/effect/{}/args", effect)).await?;
    match json {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(RemoteError::ParseError(format!(
            "effect arguments are not an object: {}",
            other
        ))),
    }
}

/// `[{"py/type": "audioled.effects.Shift"}, ...]`
pub(crate) fn parse_effect_list(json: &Value) -> Result<Vec<EffectName>, RemoteError> {
    let entries = json
        .as_array()
        .ok_or_else(|| RemoteError::ParseError(format!("effect list is not an array: {}", json)))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .get("py/type")
                .and_then(Value::as_str)
                .map(EffectName::new)
                .ok_or_else(|| RemoteError::MissingField("py/type".to_string()))
        })
        .collect()
}
