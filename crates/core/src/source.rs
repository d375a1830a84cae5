#![forbid(unsafe_code)]

use crate::model::Node;

/// Read contract the resolver consumes.
///
/// Every fetch must return rows in a stable order (creation time, then
/// insertion order); "first encountered" tie-breaks rely on it. Errors are
/// passed through untouched.
pub trait NodeSource {
    type Error;

    /// All records of one message chain (`context_id == chain_key`).
    fn find_records_by_chain_key(&self, chain_key: &str) -> Result<Vec<Node>, Self::Error>;

    /// The root context plus every context record whose `parent_id` is the root.
    fn find_branch_records(&self, root_id: &str) -> Result<Vec<Node>, Self::Error>;

    /// Message records that belong to one branch head.
    fn find_message_records(&self, head_id: &str) -> Result<Vec<Node>, Self::Error>;

    /// Branch records of a lineage, oldest first.
    fn find_ordered_branch_heads(&self, root_id: &str) -> Result<Vec<Node>, Self::Error>;
}

impl<S: NodeSource + ?Sized> NodeSource for &S {
    type Error = S::Error;

    fn find_records_by_chain_key(&self, chain_key: &str) -> Result<Vec<Node>, Self::Error> {
        (**self).find_records_by_chain_key(chain_key)
    }

    fn find_branch_records(&self, root_id: &str) -> Result<Vec<Node>, Self::Error> {
        (**self).find_branch_records(root_id)
    }

    fn find_message_records(&self, head_id: &str) -> Result<Vec<Node>, Self::Error> {
        (**self).find_message_records(head_id)
    }

    fn find_ordered_branch_heads(&self, root_id: &str) -> Result<Vec<Node>, Self::Error> {
        (**self).find_ordered_branch_heads(root_id)
    }
}
