//! Core types for automato
//!
//! This crate provides the state layer every other automato crate builds on:
//!
//! - [`StateSource`] / [`Command`] - the capability traits plugins implement
//! - [`StateCache`] - TTL memoization around one state source
//! - [`Endpoint`] - named state caches and commands for one remote target
//! - [`EndpointRegistry`] - read-only name lookup handed to triggers and actions
//! - [`Clock`] - injectable time source
//!
//! # Lookup paths
//!
//! ```text
//! <endpoint>.<state>.<key>    trigger variables
//! <endpoint>.<command>        action pipeline steps
//! ```

mod cache;
mod clock;
mod endpoint;
mod error;
mod registry;
mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{lookup_key, StateCache, DEFAULT_COLLECT_TIMEOUT, DEFAULT_TTL_SECS};
pub use clock::{secs, Clock, MockClock, SystemClock};
pub use endpoint::{Endpoint, EndpointBuilder};
pub use error::{
    CollectionError, CommandError, ReferenceError, StateError, StateResult, TransportError,
};
pub use registry::EndpointRegistry;
pub use source::{Command, StateMap, StateSource, Transport};

/// Separator between the parts of a dotted reference
pub const PATH_SEPARATOR: char = '.';
