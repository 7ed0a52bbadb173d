//! Switchyard - Endpoint
//!
//! Endpoint URIs and the contracts between the routing core and components.
//!
//! # Design
//!
//! A [`Component`] is a factory keyed by URI scheme. It turns a parsed
//! [`EndpointUri`] into an [`Endpoint`], which in turn creates producers
//! (send side) and consumers (receive side). Endpoints are resolved once,
//! at route build time, and cached by their normalized URI:
//!
//! ```text
//! "seda:orders?size=10" → EndpointUri → ComponentRegistry["seda"] → Endpoint
//!                                                    ↓
//!                              EndpointRegistry["seda:orders?size=10"]
//! ```
//!
//! Unknown query parameters fail endpoint creation so that typos surface
//! when routes are built, not when the first message arrives.
//!
//! # Example
//!
//! ```
//! use switchyard_endpoint::EndpointUri;
//!
//! let uri = EndpointUri::parse("seda:orders?size=10&blockWhenFull=true").unwrap();
//! assert_eq!(uri.scheme(), "seda");
//! assert_eq!(uri.path(), "orders");
//! assert_eq!(uri.normalized(), "seda:orders?blockWhenFull=true&size=10");
//! ```

mod component;
mod error;
mod parameters;
mod registry;
mod uri;

pub use component::{Component, Consumer, Endpoint, Producer};
pub use error::{EndpointError, Result};
pub use parameters::EndpointParameters;
pub use registry::{ComponentRegistry, EndpointRegistry};
pub use uri::EndpointUri;
