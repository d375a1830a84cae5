#![forbid(unsafe_code)]

use crate::chain::{ChainLink, assemble_chain};
use crate::model::Node;
use crate::source::NodeSource;
use crate::versions::{Version, get_versions};
use std::collections::HashSet;

/// Records whose public id is never used as a `prev_id`, in input order.
pub fn head_candidates<T: ChainLink>(nodes: &[T]) -> Vec<&T> {
    unreferenced_indices(nodes)
        .into_iter()
        .map(|index| &nodes[index])
        .collect()
}

/// Open end of a chain: the first unreferenced record, if any.
pub fn tail_of<T: ChainLink>(nodes: &[T]) -> Option<&T> {
    unreferenced_indices(nodes)
        .first()
        .map(|index| &nodes[*index])
}

/// Canonical head: latest `created_at_ms` among the candidates, earliest
/// candidate on an exact tie.
pub fn select_head<T: ChainLink>(nodes: &[T]) -> Option<&T> {
    select_head_index(nodes, &unreferenced_indices(nodes)).map(|index| &nodes[index])
}

fn unreferenced_indices<T: ChainLink>(nodes: &[T]) -> Vec<usize> {
    let referenced = nodes
        .iter()
        .filter_map(|node| node.prev_id())
        .collect::<HashSet<_>>();
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| !referenced.contains(node.public_id()))
        .map(|(index, _)| index)
        .collect()
}

fn select_head_index<T: ChainLink>(nodes: &[T], candidates: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &index in candidates {
        match best {
            Some(current) if nodes[index].created_at_ms() <= nodes[current].created_at_ms() => {}
            _ => best = Some(index),
        }
    }
    best
}

pub fn find_tail<S: NodeSource>(source: &S, chain_key: &str) -> Result<Option<Node>, S::Error> {
    let mut nodes = source.find_records_by_chain_key(chain_key)?;
    let candidates = unreferenced_indices(&nodes);
    if candidates.len() > 1 {
        tracing::warn!(
            chain_key,
            tails = candidates.len(),
            "chain has more than one open end; using the first"
        );
    }
    Ok(candidates
        .first()
        .copied()
        .map(|index| nodes.swap_remove(index)))
}

pub fn find_head<S: NodeSource>(source: &S, root_id: &str) -> Result<Option<Node>, S::Error> {
    let mut nodes = source.find_branch_records(root_id)?;
    let candidates = unreferenced_indices(&nodes);
    if candidates.len() > 1 {
        tracing::debug!(
            root_id,
            candidates = ?candidates
                .iter()
                .map(|index| nodes[*index].public_id.as_str())
                .collect::<Vec<_>>(),
            "lineage is forked; picking the latest head"
        );
    }
    Ok(select_head_index(&nodes, &candidates).map(|index| nodes.swap_remove(index)))
}

/// Messages of one branch head, in chain order.
pub fn get_chain<S: NodeSource>(source: &S, head_id: &str) -> Result<Vec<Node>, S::Error> {
    let messages = source.find_message_records(head_id)?;
    let _span = tracing::warn_span!("chain", chain_key = head_id).entered();
    Ok(assemble_chain(messages).nodes)
}

/// Messages under the canonical head of a lineage; empty when there is no head.
pub fn get_ordered_nodes<S: NodeSource>(source: &S, root_id: &str) -> Result<Vec<Node>, S::Error> {
    match find_head(source, root_id)? {
        Some(head) => get_chain(source, &head.public_id),
        None => Ok(Vec::new()),
    }
}

pub fn version_history<S: NodeSource>(source: &S, root_id: &str) -> Result<Vec<Version>, S::Error> {
    let heads = source.find_ordered_branch_heads(root_id)?;
    Ok(get_versions(&heads))
}
