//! # Loadelim IR
//!
//! A small [sea-of-nodes](https://en.wikipedia.org/wiki/Sea_of_nodes) intermediate representation.
//! Operations are nodes in a [`petgraph`] graph and are connected by three kinds of dependencies:
//!
//! * **value** edges carry data,
//! * **effect** edges order memory-visible operations (loads, stores, calls) along a control path,
//! * **control** edges tie operations to the control path they execute on.
//!
//! Inputs of a node are always ordered as values, then effects, then controls. Node identity is
//! the [`NodeIndex`] of the node, which stays stable when other nodes are removed.
//!
//! Static types come from a bitset lattice ([`Type`]), memory accesses are described by
//! [`FieldAccess`] and [`ElementAccess`].

#[macro_use]
extern crate derive_new;

mod access;
mod debug;
mod graph;
mod machine;
mod operator;
mod types;

pub use access::*;
pub use graph::*;
pub use machine::*;
pub use operator::*;
pub use petgraph::graph::NodeIndex;
pub use types::*;
