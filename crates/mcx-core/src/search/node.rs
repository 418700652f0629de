//! Search nodes and the transposition pool.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Running statistics of a search node, guarded by the per-node lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStats {
    /// Running estimate of the expected return through this node.
    pub mean: f64,
    pub visits: u64,
}

/// One expectimax node: a decision node (children are actions) or a chance
/// node (children are percepts). `hash` and the node kind are frozen at
/// construction; the statistics mutate under the node lock.
#[derive(Debug)]
pub struct SearchNode {
    hash: u64,
    chance: bool,
    stats: Mutex<NodeStats>,
}

impl SearchNode {
    fn new(hash: u64, chance: bool) -> Self {
        SearchNode {
            hash,
            chance,
            stats: Mutex::new(NodeStats::default()),
        }
    }

    /// Hash of the history this node represents.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn is_chance(&self) -> bool {
        self.chance
    }

    /// Take the node lock for a composite read-and-decide step.
    pub fn lock_stats(&self) -> MutexGuard<'_, NodeStats> {
        self.stats.lock()
    }

    /// A consistent (mean, visits) pair.
    pub fn snapshot(&self) -> (f64, u64) {
        let stats = self.stats.lock();
        (stats.mean, stats.visits)
    }

    /// Fold one sampled return into the running mean.
    pub fn record_sample(&self, reward: f64) {
        let mut stats = self.stats.lock();
        let visits = stats.visits as f64;
        stats.mean = (stats.mean * visits + reward) / (visits + 1.0);
        stats.visits += 1;
    }
}

/// Transposition table keyed on the agent's history hash.
///
/// Search-scoped: built at the start of each planner invocation and handed
/// to the workers, which share it behind one lock. When the pool is full,
/// lookups still hit but misses refuse to insert, and the planner falls
/// back to playouts at those leaves.
pub struct NodePool {
    nodes: Mutex<HashMap<u64, Arc<SearchNode>>>,
    max_nodes: usize,
}

impl NodePool {
    pub fn new(max_nodes: usize) -> Self {
        NodePool {
            nodes: Mutex::new(HashMap::new()),
            max_nodes: max_nodes.max(1),
        }
    }

    /// Size the pool from a memory budget, assuming a conservative
    /// per-slot overhead for the map entry and the node itself.
    pub fn with_capacity_bytes(bytes: usize) -> Self {
        let slot_size = mem::size_of::<u64>()
            + mem::size_of::<Arc<SearchNode>>()
            + mem::size_of::<SearchNode>()
            + mem::size_of::<usize>() * 4;
        Self::new(bytes / slot_size)
    }

    pub fn find(&self, hash: u64) -> Option<Arc<SearchNode>> {
        self.nodes.lock().get(&hash).cloned()
    }

    /// Find a node, creating it if the pool still has room. `None` means
    /// the node is absent and the pool is full.
    pub fn find_or_create(&self, hash: u64, chance: bool) -> Option<Arc<SearchNode>> {
        let mut nodes = self.nodes.lock();
        if let Some(node) = nodes.get(&hash) {
            return Some(Arc::clone(node));
        }
        if nodes.len() >= self.max_nodes {
            return None;
        }
        let node = Arc::new(SearchNode::new(hash, chance));
        nodes.insert(hash, Arc::clone(&node));
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_nodes
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn clear(&self) {
        self.nodes.lock().clear();
    }
}
