use regex::Regex;

use crate::graph::DirectionalGraph;

/// Name of the implicit universal type, the root of every user hierarchy.
pub const OBJECT_TYPE: &str = "object";

/// Parses a `:types`-style declaration block into an inheritance graph.
///
/// The grammar is `name+ (- parent)?` repeated, whitespace-separated:
///
/// - `truck car - vehicle depot` yields `truck -> vehicle`,
///   `car -> vehicle` and `depot -> object`;
/// - multiple inheritance arises from repeating a child under different
///   parents and is preserved as independent edges.
///
/// Every declared name that is not given an explicit parent (including
/// parents that are themselves never re-declared) is rooted to the
/// universal `object` type, so the output graph is a DAG in which every
/// vertex except `object` has at least one outgoing edge.
pub fn parse_inheritance(declaration: &str) -> DirectionalGraph {
    let dash_group = Regex::new(r"-\s+\w[\w-]*").unwrap();
    let mut text = declaration.to_string();
    if !dash_group.is_match(&text) {
        // no parent anywhere: give every top-level entry the implicit root
        text.push_str(" - ");
        text.push_str(OBJECT_TYPE);
    }

    let mut graph = DirectionalGraph::new();
    let group = Regex::new(r"(?:\w[\w-]*\s+)+-\s+(\w[\w-]*)").unwrap();
    let name = Regex::new(r"\w[\w-]*").unwrap();

    let mut consumed = Vec::new();
    for captures in group.captures_iter(&text) {
        let whole = captures.get(0).unwrap();
        let parent = captures.get(1).unwrap().as_str();
        let children = &text[whole.start()..captures.get(1).unwrap().start()];
        for child in name.find_iter(children) {
            graph.add_edge(child.as_str(), parent);
        }
        consumed.push(whole.range());
    }

    // names left over outside any `children - parent` group are orphans
    for m in name.find_iter(&text) {
        if !consumed.iter().any(|r| r.contains(&m.start())) {
            graph.add_vertex(m.as_str());
        }
    }

    // root every unparented vertex to the universal type
    let orphans: Vec<String> = graph
        .vertices()
        .filter(|v| !v.eq_ignore_ascii_case(OBJECT_TYPE))
        .filter(|v| graph.successors(v).next().is_none())
        .map(str::to_string)
        .collect();
    for orphan in orphans {
        graph.add_edge(orphan, OBJECT_TYPE);
    }
    graph
}

/// Renders a graph back into declaration text, one `child - parent` pair per
/// line. Parsing the result reproduces the same vertex and edge sets.
pub fn to_canonical_text(graph: &DirectionalGraph) -> String {
    let mut out = String::new();
    for (from, to) in graph.edges() {
        out.push_str(from);
        out.push_str(" - ");
        out.push_str(to);
        out.push('\n');
    }
    out
}

/// The objects (or constants) declared to belong directly to one type.
#[derive(Clone, Debug, Default)]
pub struct TypeObjects {
    tpe: String,
    objects: Vec<String>,
}

impl TypeObjects {
    pub fn new(tpe: impl Into<String>) -> TypeObjects {
        TypeObjects {
            tpe: tpe.into(),
            objects: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.tpe
    }

    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    pub fn add(&mut self, object: impl Into<String>) {
        let object = object.into();
        if !self.has_object(&object) {
            self.objects.push(object);
        }
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.iter().any(|o| o.eq_ignore_ascii_case(name))
    }
}

/// All type/object buckets of one declaration section, with case-insensitive
/// type lookup. Built once; `merge` combines domain constants with problem
/// objects without mutating either source.
#[derive(Clone, Debug, Default)]
pub struct TypeObjectMap {
    buckets: Vec<TypeObjects>,
}

impl TypeObjectMap {
    pub fn new() -> TypeObjectMap {
        TypeObjectMap::default()
    }

    pub fn get(&self, tpe: &str) -> Option<&TypeObjects> {
        self.buckets.iter().find(|b| b.tpe.eq_ignore_ascii_case(tpe))
    }

    pub fn add(&mut self, tpe: &str, object: impl Into<String>) {
        match self.buckets.iter_mut().find(|b| b.tpe.eq_ignore_ascii_case(tpe)) {
            Some(bucket) => bucket.add(object),
            None => {
                let mut bucket = TypeObjects::new(tpe);
                bucket.add(object);
                self.buckets.push(bucket);
            }
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeObjects> {
        self.buckets.iter()
    }

    /// Owning type of an object, if declared anywhere in this map.
    pub fn type_of(&self, object: &str) -> Option<&str> {
        self.buckets
            .iter()
            .find(|b| b.has_object(object))
            .map(|b| b.tpe.as_str())
    }

    pub fn merge(&self, other: &TypeObjectMap) -> TypeObjectMap {
        let mut merged = self.clone();
        for bucket in &other.buckets {
            for object in &bucket.objects {
                merged.add(&bucket.tpe, object.clone());
            }
        }
        merged
    }
}

/// Inverts an `object -> type` edge set into one bucket per type, each
/// holding the objects declared under it.
pub fn to_type_objects(graph: &DirectionalGraph) -> TypeObjectMap {
    let mut map = TypeObjectMap::new();
    for (object, tpe) in graph.edges() {
        map.add(tpe, object);
    }
    map
}
