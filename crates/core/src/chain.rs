#![forbid(unsafe_code)]

use crate::model::Node;
use std::collections::HashMap;

/// Anything that sits in a predecessor-linked chain.
pub trait ChainLink {
    fn public_id(&self) -> &str;
    fn prev_id(&self) -> Option<&str>;
    fn created_at_ms(&self) -> i64;
}

impl ChainLink for Node {
    fn public_id(&self) -> &str {
        &self.public_id
    }

    fn prev_id(&self) -> Option<&str> {
        self.prev_id.as_deref()
    }

    fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }
}

impl<T: ChainLink + ?Sized> ChainLink for &T {
    fn public_id(&self) -> &str {
        (**self).public_id()
    }

    fn prev_id(&self) -> Option<&str> {
        (**self).prev_id()
    }

    fn created_at_ms(&self) -> i64 {
        (**self).created_at_ms()
    }
}

/// The pointer walk did not cover every input record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub expected: usize,
    pub actual: usize,
    /// The walk came back to a record it had already emitted.
    pub cyclic: bool,
}

#[derive(Clone, Debug)]
pub struct AssembledChain<T> {
    pub nodes: Vec<T>,
    pub violation: Option<IntegrityViolation>,
}

impl<T> AssembledChain<T> {
    pub fn is_intact(&self) -> bool {
        self.violation.is_none()
    }
}

/// Records in chain order; see [`assemble_chain`] for the degradation rules.
pub fn order_nodes<T: ChainLink>(nodes: Vec<T>) -> Vec<T> {
    assemble_chain(nodes).nodes
}

/// Rebuilds chain order from `prev_id` pointers.
///
/// The walk starts at the record whose `prev_id` is null and follows
/// `public_id -> prev_id` lookups until nothing matches. When the walk does
/// not visit every record exactly once (cycle, fork, missing link) the input
/// is returned sorted by `created_at_ms` (then `public_id`) and the mismatch
/// is reported instead of failing.
///
/// Beyond a plain length check, a walk that revisits a record is treated as a
/// violation even if it happens to emit `nodes.len()` entries. That needs
/// duplicated public ids, which the storage schema's unique constraint rules
/// out, so persisted chains only ever hit the length check.
pub fn assemble_chain<T: ChainLink>(nodes: Vec<T>) -> AssembledChain<T> {
    let expected = nodes.len();
    if expected == 0 {
        return AssembledChain {
            nodes,
            violation: None,
        };
    }

    let walk = walk_links(&nodes);
    if walk.order.len() == expected && !walk.cyclic {
        let mut slots = nodes.into_iter().map(Some).collect::<Vec<_>>();
        let nodes = walk
            .order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect::<Vec<_>>();
        return AssembledChain {
            nodes,
            violation: None,
        };
    }

    let violation = IntegrityViolation {
        expected,
        actual: walk.order.len(),
        cyclic: walk.cyclic,
    };
    tracing::warn!(
        expected = violation.expected,
        actual = violation.actual,
        cyclic = violation.cyclic,
        "chain reconstruction length mismatch; falling back to created_at order"
    );

    let mut nodes = nodes;
    nodes.sort_by(|a, b| {
        a.created_at_ms()
            .cmp(&b.created_at_ms())
            .then_with(|| a.public_id().cmp(b.public_id()))
    });
    AssembledChain {
        nodes,
        violation: Some(violation),
    }
}

struct LinkWalk {
    order: Vec<usize>,
    cyclic: bool,
}

fn walk_links<T: ChainLink>(nodes: &[T]) -> LinkWalk {
    // Duplicate prev_id values overwrite: the walk then comes up short.
    let mut by_prev: HashMap<Option<&str>, usize> = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        by_prev.insert(node.prev_id(), index);
    }

    let mut visited = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut cyclic = false;
    let mut cursor = by_prev.get(&None).copied();
    while let Some(index) = cursor {
        if visited[index] {
            cyclic = true;
            break;
        }
        visited[index] = true;
        order.push(index);
        cursor = by_prev.get(&Some(nodes[index].public_id())).copied();
    }
    LinkWalk { order, cyclic }
}
