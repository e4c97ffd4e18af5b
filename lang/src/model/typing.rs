use indexmap::IndexSet;

use crate::graph::DirectionalGraph;
use crate::inheritance::TypeObjectMap;

/// Answers subtype and object-membership queries over a parsed inheritance
/// graph and its declared objects. Borrowed views only; building one is
/// free and it never mutates its sources.
pub struct TypeQuery<'a> {
    types: &'a DirectionalGraph,
    objects: &'a TypeObjectMap,
}

impl<'a> TypeQuery<'a> {
    pub fn new(types: &'a DirectionalGraph, objects: &'a TypeObjectMap) -> TypeQuery<'a> {
        TypeQuery { types, objects }
    }

    /// The type itself plus every type deriving from it, transitively.
    /// Inheritance edges point child to parent, so descendants are the
    /// vertices with a path to `tpe`.
    pub fn type_and_descendants(&self, tpe: &str) -> Vec<String> {
        let mut out: IndexSet<String> = IndexSet::new();
        out.insert(tpe.to_string());
        for descendant in self.types.pointing_to(tpe) {
            out.insert(descendant);
        }
        out.into_iter().collect()
    }

    /// Whether `sub` equals `sup` or derives from it, transitively.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        sub.eq_ignore_ascii_case(sup)
            || self
                .types
                .pointing_from(sub)
                .iter()
                .any(|ancestor| ancestor.eq_ignore_ascii_case(sup))
    }

    /// Objects declared under the type or under any of its descendants,
    /// in declaration order, deduplicated.
    pub fn objects_of_type(&self, tpe: &str) -> Vec<String> {
        let mut out: IndexSet<String> = IndexSet::new();
        for t in self.type_and_descendants(tpe) {
            if let Some(bucket) = self.objects.get(&t) {
                for object in bucket.objects() {
                    out.insert(object.clone());
                }
            }
        }
        out.into_iter().collect()
    }
}
