/// Handle to a node of a [`DependencyGraph`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug)]
struct Node<N> {
    payload: N,
    preds: Vec<NodeId>,
}

/// A directed acyclic graph of operations.
///
/// Nodes can only depend on nodes that already exist, so insertion order is always a valid
/// topological order and the graph can never contain a cycle.
#[derive(Clone, Debug)]
pub struct DependencyGraph<N> {
    nodes: Vec<Node<N>>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<N> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node that runs after every node in `preds`.
    ///
    /// # Panics
    ///
    /// Panics if a predecessor does not belong to this graph.
    pub fn add(&mut self, payload: N, preds: &[NodeId]) -> NodeId {
        let id = NodeId(self.nodes.len());
        assert!(
            preds.iter().all(|p| p.0 < id.0),
            "dependency on a node that doesn't exist yet"
        );
        let mut preds = preds.to_vec();
        preds.sort_unstable();
        preds.dedup();
        self.nodes.push(Node { payload, preds });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn payload(&self, id: NodeId) -> &N {
        &self.nodes[id.0].payload
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].preds
    }

    /// Iterates over the nodes in a topological order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i), &node.payload))
    }

    /// Nodes nothing depends on.
    pub fn sinks(&self) -> Vec<NodeId> {
        let mut has_successor = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for p in &node.preds {
                has_successor[p.0] = true;
            }
        }
        has_successor
            .iter()
            .enumerate()
            .filter(|(_, &s)| !s)
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Returns true if `later` transitively depends on `earlier`.
    pub fn depends_on(&self, later: NodeId, earlier: NodeId) -> bool {
        if later.0 <= earlier.0 {
            return false;
        }
        let mut visited = vec![false; later.0 + 1];
        let mut stack = vec![later];
        while let Some(id) = stack.pop() {
            for &p in &self.nodes[id.0].preds {
                if p == earlier {
                    return true;
                }
                // predecessors older than `earlier` can't reach it
                if p.0 > earlier.0 && !visited[p.0] {
                    visited[p.0] = true;
                    stack.push(p);
                }
            }
        }
        false
    }
}
