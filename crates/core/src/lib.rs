#![forbid(unsafe_code)]

pub mod chain;
pub mod ids;
pub mod model;
pub mod plan;
pub mod resolve;
pub mod source;
pub mod versions;

pub use chain::{AssembledChain, ChainLink, IntegrityViolation, assemble_chain, order_nodes};
pub use ids::{
    NodeKind, ProjectId, ProjectIdError, PublicIdGenerator, RandomIdGenerator, generate_public_id,
};
pub use model::{Node, NodeMetadata};
pub use plan::{
    NodeInsertRecord, NodeSpec, build_node_insert_records, build_node_insert_records_with,
};
pub use resolve::{
    find_head, find_tail, get_chain, get_ordered_nodes, head_candidates, select_head, tail_of,
    version_history,
};
pub use source::NodeSource;
pub use versions::{Version, get_versions};

#[cfg(test)]
mod tests;
