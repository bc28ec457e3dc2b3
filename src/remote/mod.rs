// Remote graph-service access
//
// The editor only ever talks to the graph server through the
// `GraphService` trait. `FilterGraphClient` implements it over the
// server's HTTP/JSON API, `InMemoryGraph` in-process.
//
// Endpoints used:
// - GET    /effects                       list effect types
// - GET    /effect/<type>/parameter       parameter definition
// - GET    /effect/<type>/args            constructor defaults
// - GET    /node/<uid>                    node state (jsonpickle)
// - GET    /node/<uid>/parameter          parameter definition of a node
// - UPDATE /node/<uid>                    partial value update
// - POST   /node                          create node from [type, values]

pub mod common;
pub mod effects;
pub mod memory;
pub mod nodes;
pub mod service;

pub use common::{FilterGraphClient, RemoteError};
pub use memory::{InMemoryGraph, RemoteCall};
pub use service::GraphService;
