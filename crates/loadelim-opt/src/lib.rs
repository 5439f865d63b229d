//! # Loadelim Optimizer
//!
//! Redundant load elimination for the [`loadelim_ir`] sea-of-nodes graph.
//!
//! The pass walks the effect chain and keeps an abstract view of memory: which value is known to
//! sit in which field of which object, and in which element at which index. A load of a location
//! that is already known is replaced with the known value, inserting a type guard when the known
//! value has a wider type than the load. Stores forward their value to later loads of the same
//! location and forget everything they may overwrite.
//!
//! [`optimize`] runs the whole pass to a fixed point. For finer control, register a
//! [`LoadElimination`] reducer with a [`GraphReducer`] yourself.

#[macro_use]
extern crate derive_new;

mod alias;
mod cache;
mod config;
mod graph_reducer;
mod load_elimination;
mod reducer;
mod state;
mod type_guard;

pub use alias::*;
pub use cache::*;
pub use config::*;
pub use graph_reducer::*;
pub use load_elimination::*;
pub use reducer::*;
pub use state::*;
pub use type_guard::*;

use loadelim_ir::Graph;

/// Eliminate redundant loads in `graph`.
pub fn optimize(graph: &mut Graph, config: LoadEliminationConfig) -> OptimizationStats {
    let mut reducer = GraphReducer::new();
    reducer.add_reducer(LoadElimination::new(config));
    reducer.reduce_graph(graph)
}
