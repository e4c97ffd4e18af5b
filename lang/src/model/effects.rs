use thiserror::Error;

use crate::model::variables::{parse_variable, Variable};
use crate::syntax::tree::{NodeId, SyntaxTree};

/// Classified effect of an action on one state variable.
///
/// A closed set: every syntax node classifies into exactly one variant, and
/// shapes this module does not understand become [`Effect::Unrecognized`]
/// instead of failing, since user-authored text is routinely incomplete.
/// The arithmetic variants additionally reference their right-hand-side
/// expression subtree.
#[derive(Clone, Debug)]
pub enum Effect {
    /// `(pred ...)`: the variable becomes true.
    MakeTrue { node: NodeId, variable: Variable },
    /// `(not (pred ...))`: the variable becomes false.
    MakeFalse { node: NodeId, variable: Variable },
    Assign {
        node: NodeId,
        variable: Variable,
        expression: NodeId,
    },
    Increase {
        node: NodeId,
        variable: Variable,
        expression: NodeId,
    },
    Decrease {
        node: NodeId,
        variable: Variable,
        expression: NodeId,
    },
    ScaleUp {
        node: NodeId,
        variable: Variable,
        expression: NodeId,
    },
    ScaleDown {
        node: NodeId,
        variable: Variable,
        expression: NodeId,
    },
    Unrecognized { node: NodeId },
}

impl Effect {
    pub fn node(&self) -> NodeId {
        match self {
            Effect::MakeTrue { node, .. }
            | Effect::MakeFalse { node, .. }
            | Effect::Assign { node, .. }
            | Effect::Increase { node, .. }
            | Effect::Decrease { node, .. }
            | Effect::ScaleUp { node, .. }
            | Effect::ScaleDown { node, .. }
            | Effect::Unrecognized { node } => *node,
        }
    }

    /// The variable this effect modifies, absent for unrecognized shapes.
    pub fn variable(&self) -> Option<&Variable> {
        match self {
            Effect::MakeTrue { variable, .. }
            | Effect::MakeFalse { variable, .. }
            | Effect::Assign { variable, .. }
            | Effect::Increase { variable, .. }
            | Effect::Decrease { variable, .. }
            | Effect::ScaleUp { variable, .. }
            | Effect::ScaleDown { variable, .. } => Some(variable),
            Effect::Unrecognized { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EffectError {
    #[error("`{keyword}` effect requires a variable and an expression, found {actual} argument(s)")]
    MalformedArity { keyword: String, actual: usize },
    #[error("`{keyword}` effect does not modify a variable")]
    MissingVariable { keyword: String },
}

/// Classifies the effect represented by `node`.
///
/// Total over arbitrary input with one deliberate exception: an effect
/// keyword that was matched but whose operand arity is wrong (e.g.
/// `(increase (fuel))`) indicates a structurally broken action that
/// downstream consumers cannot reason about, and raises.
pub fn parse_effect(tree: &SyntaxTree, node: NodeId) -> Result<Effect, EffectError> {
    if !tree.node(node).is_bracket() {
        return Ok(Effect::Unrecognized { node });
    }
    let operator = tree.operator(node).map(normalize_operator);
    match operator.as_deref() {
        Some("not") => {
            let mut children = tree.content_children(node);
            match (children.next(), children.next()) {
                (Some(inner), None) => match parse_variable(tree, inner) {
                    Some(variable) => Ok(Effect::MakeFalse { node, variable }),
                    None => Ok(Effect::Unrecognized { node }),
                },
                _ => Ok(Effect::Unrecognized { node }),
            }
        }
        Some(op @ ("assign" | "increase" | "decrease" | "scale-up" | "scale-down")) => {
            let children: Vec<NodeId> = tree.content_children(node).collect();
            if children.len() != 2 {
                return Err(EffectError::MalformedArity {
                    keyword: op.to_string(),
                    actual: children.len(),
                });
            }
            let variable = parse_variable(tree, children[0]).ok_or_else(|| EffectError::MissingVariable {
                keyword: op.to_string(),
            })?;
            let expression = children[1];
            Ok(match op {
                "assign" => Effect::Assign {
                    node,
                    variable,
                    expression,
                },
                "increase" => Effect::Increase {
                    node,
                    variable,
                    expression,
                },
                "decrease" => Effect::Decrease {
                    node,
                    variable,
                    expression,
                },
                "scale-up" => Effect::ScaleUp {
                    node,
                    variable,
                    expression,
                },
                _ => Effect::ScaleDown {
                    node,
                    variable,
                    expression,
                },
            })
        }
        Some("and") => {
            // a one-element conjunction wraps its single effect
            let mut children = tree.content_children(node);
            match (children.next(), children.next()) {
                (Some(inner), None) => parse_effect(tree, inner),
                _ => Ok(Effect::Unrecognized { node }),
            }
        }
        Some("at start" | "at end") => match temporal_operand(tree, node) {
            Some(inner) => parse_effect(tree, inner),
            None => Ok(Effect::Unrecognized { node }),
        },
        Some(_) => Ok(Effect::Unrecognized { node }),
        // a bare variable application makes it true
        None => match parse_variable(tree, node) {
            Some(variable) => Ok(Effect::MakeTrue { node, variable }),
            None => Ok(Effect::Unrecognized { node }),
        },
    }
}

/// Lowercases and collapses internal whitespace, so `(at   start` and
/// `(at start` classify identically.
fn normalize_operator(op: &str) -> String {
    op.to_ascii_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The single wrapped effect of an `(at start ...)` / `(at end ...)`
/// qualifier, if `node` has that shape.
fn temporal_operand(tree: &SyntaxTree, node: NodeId) -> Option<NodeId> {
    let mut children = tree.content_children(node);
    let inner = children.next()?;
    match children.next() {
        None => Some(inner),
        Some(_) => None,
    }
}

/// Flattens conjunctions and temporal qualifiers into the individual effects
/// they contain, classifying each.
pub fn parse_effects(tree: &SyntaxTree, node: NodeId) -> Result<Vec<Effect>, EffectError> {
    let mut out = Vec::new();
    collect_effects(tree, node, &mut out)?;
    Ok(out)
}

fn collect_effects(tree: &SyntaxTree, node: NodeId, out: &mut Vec<Effect>) -> Result<(), EffectError> {
    let operator = tree.operator(node).map(|op| normalize_operator(op));
    match operator.as_deref() {
        Some("and") => {
            for child in tree.content_children(node).collect::<Vec<_>>() {
                collect_effects(tree, child, out)?;
            }
        }
        Some("at start" | "at end") => match temporal_operand(tree, node) {
            Some(inner) => collect_effects(tree, inner, out)?,
            None => out.push(parse_effect(tree, node)?),
        },
        _ => out.push(parse_effect(tree, node)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tree::SyntaxTree;

    fn effect_of(text: &str) -> Result<Effect, EffectError> {
        let tree = SyntaxTree::parse_str(text);
        let node = tree.content_children(tree.root()).next().unwrap();
        parse_effect(&tree, node)
    }

    #[test]
    fn bare_application_makes_true() {
        match effect_of("(loaded ?p ?t)").unwrap() {
            Effect::MakeTrue { variable, .. } => assert_eq!(variable.full_name(), "loaded ?p ?t"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn negation_makes_false() {
        match effect_of("(not (loaded ?p ?t))").unwrap() {
            Effect::MakeFalse { variable, .. } => assert_eq!(variable.name.as_str(), "loaded"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn arithmetic_effects_carry_their_expression() {
        let tree = SyntaxTree::parse_str("(increase (fuel-used ?t) (* 2 ?d))");
        let node = tree.content_children(tree.root()).next().unwrap();
        match parse_effect(&tree, node).unwrap() {
            Effect::Increase {
                variable, expression, ..
            } => {
                assert_eq!(variable.name.as_str(), "fuel-used");
                assert_eq!(tree.text(expression), "(* 2 ?d)");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn temporal_qualifiers_unwrap() {
        match effect_of("(at end (not (moving ?t)))").unwrap() {
            Effect::MakeFalse { variable, .. } => assert_eq!(variable.name.as_str(), "moving"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn unknown_keywords_are_unrecognized_not_errors() {
        assert!(matches!(effect_of("(forall (?x) (p ?x))").unwrap(), Effect::Unrecognized { .. }));
        assert!(matches!(effect_of("(when (p) (q))").unwrap(), Effect::Unrecognized { .. }));
    }

    #[test]
    fn malformed_arity_raises() {
        assert!(matches!(
            effect_of("(increase (fuel-used ?t))"),
            Err(EffectError::MalformedArity { .. })
        ));
        assert!(matches!(
            effect_of("(assign (fuel) 1 2)"),
            Err(EffectError::MalformedArity { .. })
        ));
    }

    #[test]
    fn conjunctions_flatten() {
        let tree = SyntaxTree::parse_str("(and (at start (p)) (at end (not (q))) (increase (r) 1))");
        let node = tree.content_children(tree.root()).next().unwrap();
        let effects = parse_effects(&tree, node).unwrap();
        assert_eq!(effects.len(), 3);
        assert!(matches!(effects[0], Effect::MakeTrue { .. }));
        assert!(matches!(effects[1], Effect::MakeFalse { .. }));
        assert!(matches!(effects[2], Effect::Increase { .. }));
    }
}
