//! Schema and value retrieval for the node editor.
//!
//! Every load is tagged with a [`FetchTicket`] issued by a
//! [`RequestSequencer`]. Only the most recently issued ticket may be
//! applied; anything older that resolves later is stale.

use std::fmt;
use std::sync::Arc;

use crate::models::schema::{EffectName, EffectSnapshot, NodeUid};
use crate::remote::{GraphService, RemoteError};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Remote {
        operation: &'static str,
        source: RemoteError,
    },
    /// The server offers no effects to add.
    NoEffects,
    /// A schema key came back without a value.
    MissingValue {
        effect: EffectName,
        parameter: String,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Remote { operation, source } => {
                write!(f, "Error fetching {}: {}", operation, source)
            }
            FetchError::NoEffects => write!(f, "The graph server offers no effects"),
            FetchError::MissingValue { effect, parameter } => write!(
                f,
                "{} has no value for parameter {}",
                effect.short_name(),
                parameter
            ),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn remote(operation: &'static str) -> impl FnOnce(RemoteError) -> FetchError {
    move |source| FetchError::Remote { operation, source }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.0
    }
}

/// A value tagged with the ticket of the request it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub ticket: FetchTicket,
    pub value: T,
}

/// Hands out increasing tickets and remembers which one is current.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: u64,
    outstanding: Option<FetchTicket>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding any outstanding one.
    pub fn issue(&mut self) -> FetchTicket {
        self.issued += 1;
        let ticket = FetchTicket(self.issued);
        self.outstanding = Some(ticket);
        ticket
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.outstanding == Some(ticket)
    }

    /// Consume the result for `ticket`. Returns `false` if it is stale.
    pub fn settle(&mut self, ticket: FetchTicket) -> bool {
        if self.is_current(ticket) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Make every issued ticket stale.
    pub fn cancel(&mut self) {
        self.outstanding = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Effect list plus schema and defaults of the first effect.
    Catalog,
    Node(NodeUid),
    Effect(EffectName),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Catalog {
        effects: Vec<EffectName>,
        snapshot: EffectSnapshot,
    },
    Node(EffectSnapshot),
    Effect(EffectSnapshot),
}

impl Loaded {
    pub fn snapshot(&self) -> &EffectSnapshot {
        match self {
            Loaded::Catalog { snapshot, .. } => snapshot,
            Loaded::Node(snapshot) | Loaded::Effect(snapshot) => snapshot,
        }
    }
}

pub struct SchemaFetcher<S: ?Sized> {
    service: Arc<S>,
}

impl<S: ?Sized> Clone for SchemaFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: GraphService + ?Sized> SchemaFetcher<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    /// Sorted effect list, with schema and defaults of the first entry.
    pub async fn load_for_add(&self) -> Result<(Vec<EffectName>, EffectSnapshot), FetchError> {
        let mut effects = self
            .service
            .get_all_effects()
            .await
            .map_err(remote("effects"))?;
        effects.sort();
        effects.dedup();

        let first = effects.first().cloned().ok_or(FetchError::NoEffects)?;
        let snapshot = self.load_for_effect(&first).await?;
        Ok((effects, snapshot))
    }

    /// Bound effect, current values and schema of an existing node.
    pub async fn load_for_edit(&self, uid: &NodeUid) -> Result<EffectSnapshot, FetchError> {
        let (state, schema) = tokio::try_join!(
            async { self.service.get_node(uid).await.map_err(remote("node")) },
            async {
                self.service
                    .get_node_parameter(uid)
                    .await
                    .map_err(remote("node parameters"))
            },
        )?;

        complete(EffectSnapshot {
            effect: state.effect,
            schema,
            values: state.values,
        })
    }

    /// Schema and defaults of an explicitly chosen effect.
    pub async fn load_for_effect(&self, effect: &EffectName) -> Result<EffectSnapshot, FetchError> {
        let (schema, values) = tokio::try_join!(
            async {
                self.service
                    .get_effect_parameters(effect)
                    .await
                    .map_err(remote("effect parameters"))
            },
            async {
                self.service
                    .get_effect_arguments(effect)
                    .await
                    .map_err(remote("effect arguments"))
            },
        )?;

        complete(EffectSnapshot {
            effect: effect.clone(),
            schema,
            values,
        })
    }

    /// Run a tagged request; the result keeps the request's ticket.
    pub async fn fetch(&self, request: Tagged<FetchRequest>) -> Tagged<Result<Loaded, FetchError>> {
        let value = match &request.value {
            FetchRequest::Catalog => self
                .load_for_add()
                .await
                .map(|(effects, snapshot)| Loaded::Catalog { effects, snapshot }),
            FetchRequest::Node(uid) => self.load_for_edit(uid).await.map(Loaded::Node),
            FetchRequest::Effect(effect) => self.load_for_effect(effect).await.map(Loaded::Effect),
        };

        Tagged {
            ticket: request.ticket,
            value,
        }
    }
}

fn complete(snapshot: EffectSnapshot) -> Result<EffectSnapshot, FetchError> {
    if let Some(parameter) = snapshot.first_missing_value() {
        return Err(FetchError::MissingValue {
            effect: snapshot.effect.clone(),
            parameter: parameter.to_string(),
        });
    }
    Ok(snapshot)
}
