use std::fmt::{Display, Error, Formatter};

use itertools::Itertools;

use crate::input::Sym;
use crate::syntax::token::TokenKind;
use crate::syntax::tree::{NodeId, SyntaxTree};

/// A bound, typed parameter of a lifted variable or action, e.g. `?t - truck`.
#[derive(Clone, Debug)]
pub struct Parameter {
    pub name: Sym,
    pub tpe: Sym,
}

impl Parameter {
    pub fn new(name: impl Into<Sym>, tpe: impl Into<Sym>) -> Parameter {
        Parameter {
            name: name.into(),
            tpe: tpe.into(),
        }
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}: {}", self.name, self.tpe)
    }
}

/// One argument of a variable application: either a bound parameter or a
/// ground object literal.
#[derive(Clone, Debug)]
pub enum Term {
    Parameter(Parameter),
    Object(Sym),
}

impl Term {
    pub fn name(&self) -> &Sym {
        match self {
            Term::Parameter(p) => &p.name,
            Term::Object(o) => o,
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.name())
    }
}

/// A predicate or function, either as declared (lifted, with typed
/// parameters) or as applied (grounded, with object terms substituted).
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: Sym,
    pub terms: Vec<Term>,
}

impl Variable {
    pub fn new(name: impl Into<Sym>, terms: Vec<Term>) -> Variable {
        Variable {
            name: name.into(),
            terms,
        }
    }

    /// Name with terms, e.g. `at ?t ?loc`.
    pub fn full_name(&self) -> String {
        if self.terms.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.terms.iter().format(" "))
        }
    }

    /// Whether a grounded occurrence refers to this declaration.
    /// Matching is case-insensitive and by name only; arity and type
    /// compatibility are left to the external validator.
    pub fn matches(&self, other: &Variable) -> bool {
        self.name.canonical_eq(other.name.as_str())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "({})", self.full_name())
    }
}

/// Reads a variable application from a bracket node: the first token is the
/// variable name, every following token a term. A leading `?` denotes a
/// parameter reference, typed as the generic `object` since the declaration
/// site is not consulted here.
pub fn parse_variable(tree: &SyntaxTree, node: NodeId) -> Option<Variable> {
    let mut name: Option<Sym> = None;
    let mut terms = Vec::new();
    if let Some(op) = tree.operator(node) {
        name = Some(Sym::with_source(op, tree.span(node)));
    }
    for child in tree.content_children(node) {
        let text = tree.token_text(child);
        let sym = Sym::with_source(text, tree.span(child));
        match tree.node(child).kind() {
            TokenKind::Parameter if name.is_some() => {
                terms.push(Term::Parameter(Parameter::new(sym, crate::inheritance::OBJECT_TYPE)))
            }
            TokenKind::Other | TokenKind::Number | TokenKind::Parameter => match name {
                None => name = Some(sym),
                Some(_) => terms.push(Term::Object(sym)),
            },
            _ => {}
        }
    }
    name.map(|name| Variable::new(name, terms))
}

/// Reads a lifted declaration `(name ?p1 - type1 ?p2 ?p3 - type2)` from a
/// bracket node. Consecutive untyped parameters share the type that follows
/// them; parameters with no trailing type default to `object`.
pub fn parse_lifted_variable(tree: &SyntaxTree, node: NodeId) -> Option<Variable> {
    let mut name: Option<Sym> = tree.operator(node).map(|op| Sym::with_source(op, tree.span(node)));
    let mut terms: Vec<Term> = Vec::new();
    let mut untyped: Vec<Sym> = Vec::new();
    let mut expecting_type = false;
    for child in tree.content_children(node) {
        let text = tree.token_text(child);
        let sym = Sym::with_source(text, tree.span(child));
        match tree.node(child).kind() {
            TokenKind::Dash => expecting_type = true,
            TokenKind::Parameter => untyped.push(sym),
            TokenKind::Other | TokenKind::Number => {
                if expecting_type {
                    for p in untyped.drain(..) {
                        terms.push(Term::Parameter(Parameter::new(p, sym.clone())));
                    }
                    expecting_type = false;
                } else if name.is_none() {
                    name = Some(sym);
                } else {
                    untyped.push(sym);
                }
            }
            _ => {}
        }
    }
    for p in untyped {
        terms.push(Term::Parameter(Parameter::new(p, crate::inheritance::OBJECT_TYPE)));
    }
    name.map(|name| Variable::new(name, terms))
}

/// Reads a `:parameters` list `(?a ?b - type1 ?c - type2)`. Parameters left
/// without a trailing type default to `object`.
pub fn parse_parameters(tree: &SyntaxTree, node: NodeId) -> Vec<Parameter> {
    let mut parameters = Vec::new();
    let mut untyped: Vec<Sym> = Vec::new();
    let mut expecting_type = false;
    for child in tree.content_children(node) {
        let text = tree.token_text(child);
        let sym = Sym::with_source(text, tree.span(child));
        match tree.node(child).kind() {
            TokenKind::Dash => expecting_type = true,
            TokenKind::Parameter => untyped.push(sym),
            TokenKind::Other if expecting_type => {
                for p in untyped.drain(..) {
                    parameters.push(Parameter::new(p, sym.clone()));
                }
                expecting_type = false;
            }
            _ => {}
        }
    }
    for p in untyped {
        parameters.push(Parameter::new(p, crate::inheritance::OBJECT_TYPE));
    }
    parameters
}

/// Every bracket node of the subtree whose first content token matches the
/// variable's name. The comparison is case-sensitive on the token text, as
/// reference search mirrors what the author actually typed.
pub fn find_references(tree: &SyntaxTree, root: NodeId, variable: &Variable) -> Vec<NodeId> {
    let target = variable.name.as_str();
    tree.descendants(root)
        .filter(|&id| tree.node(id).is_bracket())
        .filter(|&id| match tree.operator(id) {
            Some(op) => op == target,
            None => tree
                .content_children(id)
                .next()
                .map(|head| tree.token_text(head) == target)
                .unwrap_or(false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tree::SyntaxTree;

    fn first_bracket(tree: &SyntaxTree) -> NodeId {
        tree.content_children(tree.root()).next().unwrap()
    }

    #[test]
    fn grounded_application() {
        let tree = SyntaxTree::parse_str("(at truck1 depot)");
        let v = parse_variable(&tree, first_bracket(&tree)).unwrap();
        assert_eq!(v.name.as_str(), "at");
        assert_eq!(v.full_name(), "at truck1 depot");
        assert!(matches!(v.terms[0], Term::Object(_)));
    }

    #[test]
    fn lifted_declaration_with_types() {
        let tree = SyntaxTree::parse_str("(at ?t ?l - location)");
        let v = parse_lifted_variable(&tree, first_bracket(&tree)).unwrap();
        assert_eq!(v.terms.len(), 2);
        match &v.terms[1] {
            Term::Parameter(p) => {
                assert_eq!(p.name.as_str(), "?l");
                assert_eq!(p.tpe.as_str(), "location");
            }
            other => panic!("expected parameter, got {other:?}"),
        }
    }

    #[test]
    fn lifted_and_grounded_match_ignoring_case() {
        let lifted = Variable::new("At", vec![]);
        let grounded = Variable::new("at", vec![Term::Object(Sym::from("truck1"))]);
        assert!(lifted.matches(&grounded));
    }

    #[test]
    fn reference_search_is_case_sensitive() {
        let text = "(define (:init (at t1 d) (At t2 d) (and (at t3 d))))";
        let tree = SyntaxTree::parse_str(text);
        let refs = find_references(&tree, tree.root(), &Variable::new("at", vec![]));
        assert_eq!(refs.len(), 2);
        for r in refs {
            assert!(tree.text(r).starts_with("(at"));
        }
    }
}
