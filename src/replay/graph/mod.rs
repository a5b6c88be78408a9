// SPDX-License-Identifier: MIT

//! Process graph definitions and the lookup index built from them

mod index;
pub mod types;

pub use index::{pair_key, GraphEdge, GraphIndex, GraphNode, NodeType, DEFAULT_EDGE_TYPE};
pub use types::{EdgeDefinition, NodeDefinition, ProcessDefinition};
