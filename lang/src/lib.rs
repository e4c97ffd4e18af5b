//! Parsing and semantic modelling of planning-domain documents: a lossless
//! syntax tree over the s-expression grammar, type/object inheritance
//! resolution, and domain/problem models built by walking the tree.

pub mod graph;
pub mod inheritance;
pub mod input;
pub mod model;
pub mod syntax;
