use indexmap::{IndexMap, IndexSet};

/// Directed graph over string vertices, used for type inheritance
/// (an edge `child -> parent` means "child is-a parent").
///
/// Backed by an adjacency map for O(1) successor lookup while keeping
/// insertion-order iteration. Every vertex that ever appears as an edge
/// target is registered as a vertex of its own, so traversals see it even
/// when it has no outgoing edges. Neighbor queries on a vertex that was
/// never registered return empty rather than failing.
#[derive(Clone, Debug, Default)]
pub struct DirectionalGraph {
    edges: IndexMap<String, IndexSet<String>>,
}

impl DirectionalGraph {
    pub fn new() -> DirectionalGraph {
        DirectionalGraph::default()
    }

    /// Registers a vertex with no outgoing edges (no-op if already present).
    pub fn add_vertex(&mut self, vertex: impl Into<String>) {
        self.edges.entry(vertex.into()).or_default();
    }

    /// Adds the edge `from -> to`. Idempotent: duplicate edges are
    /// suppressed. The target is registered as a vertex as well.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let to = to.into();
        self.add_vertex(to.clone());
        self.edges.entry(from.into()).or_default().insert(to);
    }

    pub fn contains(&self, vertex: &str) -> bool {
        self.edges.contains_key(vertex)
    }

    /// All vertices, in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(|s| s.as_str())
    }

    /// All edges `(from, to)`, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    /// Direct targets of `vertex`'s outgoing edges.
    pub fn successors(&self, vertex: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(vertex)
            .into_iter()
            .flat_map(|tos| tos.iter().map(|s| s.as_str()))
    }

    /// Direct sources of edges pointing at `vertex`.
    pub fn predecessors<'a>(&'a self, vertex: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |(_, tos)| tos.contains(vertex))
            .map(|(from, _)| from.as_str())
    }

    /// All vertices with a directed path to `vertex` (transitive closure of
    /// `predecessors`). For an inheritance graph: all descendant types.
    pub fn pointing_to(&self, vertex: &str) -> Vec<String> {
        let mut acc = IndexSet::new();
        self.collect_pointing_to(vertex, &mut acc);
        acc.into_iter().collect()
    }

    fn collect_pointing_to(&self, vertex: &str, acc: &mut IndexSet<String>) {
        for pred in self.predecessors(vertex).map(str::to_string).collect::<Vec<_>>() {
            if acc.insert(pred.clone()) {
                self.collect_pointing_to(&pred, acc);
            }
        }
    }

    /// All vertices reachable from `vertex` (transitive closure of
    /// `successors`). For an inheritance graph: all ancestor types.
    pub fn pointing_from(&self, vertex: &str) -> Vec<String> {
        let mut acc = IndexSet::new();
        self.collect_pointing_from(vertex, &mut acc);
        acc.into_iter().collect()
    }

    fn collect_pointing_from(&self, vertex: &str, acc: &mut IndexSet<String>) {
        for succ in self.successors(vertex).map(str::to_string).collect::<Vec<_>>() {
            if acc.insert(succ.clone()) {
                self.collect_pointing_from(&succ, acc);
            }
        }
    }
}
