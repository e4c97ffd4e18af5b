use std::fmt::{Display, Error, Formatter};
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::inheritance::{parse_inheritance, to_type_objects, TypeObjectMap};
use crate::input::{Input, Sym};
use crate::model::domain::{declaration_text, find_define};
use crate::model::variables::{parse_variable, Variable};
use crate::syntax::tree::{NodeId, SyntaxTree};

/// Value assigned to a state variable by an initial-state element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VariableValue {
    Bool(bool),
    Numeric(f64),
}

impl Display for VariableValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            VariableValue::Bool(b) => write!(f, "{b}"),
            VariableValue::Numeric(n) => write!(f, "{n}"),
        }
    }
}

/// One fact or fluent assignment effective from a time point. Plain init
/// facts and timed-initial literals/fluents share this representation,
/// distinguished only by `time > 0`.
#[derive(Clone, Debug)]
pub struct TimedVariableValue {
    pub time: f64,
    pub variable: Variable,
    pub value: VariableValue,
    /// False when the element had a shape this parser does not model; the
    /// variable and a nominal `true` are still recorded so reference search
    /// and completion keep working over it.
    pub is_supported: bool,
}

/// A named or anonymous goal-state condition inside `:constraints`.
#[derive(Clone, Debug)]
pub struct StateConstraint {
    pub name: Option<Sym>,
    pub condition: Option<NodeId>,
    pub node: NodeId,
}

/// Ordering or satisfaction constraint between goal states.
#[derive(Clone, Debug)]
pub enum Constraint {
    StateSatisfying(StateConstraint),
    /// `(after a b)`: state `a` must be satisfied before state `b`.
    After {
        predecessor: StateConstraint,
        successor: StateConstraint,
        node: NodeId,
    },
    Unrecognized { node: NodeId },
}

impl Constraint {
    pub fn node(&self) -> NodeId {
        match self {
            Constraint::StateSatisfying(c) => c.node,
            Constraint::After { node, .. } | Constraint::Unrecognized { node } => *node,
        }
    }
}

/// A `(supply-demand <name> ...)` contract declared among the constraints.
#[derive(Clone, Debug)]
pub struct SupplyDemand {
    pub name: Option<Sym>,
    pub node: NodeId,
}

/// Semantic model of a problem document: objects, initial state, goal and
/// ordering constraints. Like [`super::domain::DomainModel`], built in one
/// lenient pass and immutable afterwards.
pub struct ProblemModel {
    tree: SyntaxTree,
    name: Option<Sym>,
    domain_name: Option<Sym>,
    objects: TypeObjectMap,
    init: Vec<TimedVariableValue>,
    goal: Option<NodeId>,
    constraints: Vec<Constraint>,
    supply_demands: Vec<SupplyDemand>,
}

impl ProblemModel {
    pub fn parse(input: Arc<Input>) -> Result<ProblemModel> {
        let tree = SyntaxTree::parse(input);
        let Some(define) = find_define(&tree) else {
            bail!("no (define ...) block in document");
        };

        let mut model = ProblemModel {
            name: None,
            domain_name: None,
            objects: TypeObjectMap::new(),
            init: Vec::new(),
            goal: None,
            constraints: Vec::new(),
            supply_demands: Vec::new(),
            tree,
        };
        let tree = &model.tree;

        for section in tree.content_children(define).collect::<Vec<_>>() {
            let Some(op) = tree.operator(section) else { continue };
            match op.to_ascii_lowercase().as_str() {
                "problem" => {
                    model.name = tree
                        .content_children(section)
                        .next()
                        .map(|n| Sym::with_source(tree.token_text(n), tree.span(n)));
                }
                ":domain" => {
                    model.domain_name = tree
                        .content_children(section)
                        .next()
                        .map(|n| Sym::with_source(tree.token_text(n), tree.span(n)));
                }
                ":objects" => {
                    let graph = parse_inheritance(&declaration_text(tree, section));
                    model.objects = to_type_objects(&graph);
                }
                ":init" => {
                    for element in tree.content_children(section) {
                        if let Some(value) = parse_init_element(tree, element) {
                            model.init.push(value);
                        }
                    }
                }
                ":goal" => {
                    model.goal = tree.content_children(section).next();
                }
                ":constraints" => {
                    let mut constraints = Vec::new();
                    let mut supply_demands = Vec::new();
                    for element in tree.content_children(section) {
                        collect_constraints(tree, element, &mut constraints, &mut supply_demands);
                    }
                    model.constraints = constraints;
                    model.supply_demands = supply_demands;
                }
                _ => {}
            }
        }
        Ok(model)
    }

    pub fn parse_str(text: &str) -> Result<ProblemModel> {
        ProblemModel::parse(Arc::new(Input::from_string(text)))
    }

    pub fn name(&self) -> Option<&Sym> {
        self.name.as_ref()
    }

    pub fn domain_name(&self) -> Option<&Sym> {
        self.domain_name.as_ref()
    }

    pub fn objects(&self) -> &TypeObjectMap {
        &self.objects
    }

    pub fn init(&self) -> &[TimedVariableValue] {
        &self.init
    }

    pub fn goal(&self) -> Option<NodeId> {
        self.goal
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn supply_demands(&self) -> &[SupplyDemand] {
        &self.supply_demands
    }

    pub fn syntax_tree(&self) -> &SyntaxTree {
        &self.tree
    }
}

/// Reads one `:init` element. Unreadable elements (no variable name at all)
/// yield `None`; readable-but-unmodeled shapes are kept with
/// `is_supported == false`.
fn parse_init_element(tree: &SyntaxTree, node: NodeId) -> Option<TimedVariableValue> {
    if !tree.node(node).is_bracket() {
        return None;
    }
    let operator = tree.operator(node).map(|op| op.to_ascii_lowercase());
    match operator.as_deref() {
        Some("not") => {
            let inner = tree.content_children(node).next()?;
            let variable = parse_variable(tree, inner)?;
            Some(TimedVariableValue {
                time: 0.0,
                variable,
                value: VariableValue::Bool(false),
                is_supported: true,
            })
        }
        Some("=" | "assign") => {
            let mut children = tree.content_children(node);
            let head = children.next()?;
            let variable = parse_variable(tree, head)?;
            match children.next().and_then(|n| tree.token_text(n).parse::<f64>().ok()) {
                Some(number) => Some(TimedVariableValue {
                    time: 0.0,
                    variable,
                    value: VariableValue::Numeric(number),
                    is_supported: true,
                }),
                None => Some(TimedVariableValue {
                    time: 0.0,
                    variable,
                    value: VariableValue::Bool(true),
                    is_supported: false,
                }),
            }
        }
        // `(at <time> <element>)` is a timed initial literal/fluent only
        // when the first argument is numeric; `(at plane1 depot)` is a
        // plain fact over a predicate that happens to be named `at`
        Some("at") if timed_literal_time(tree, node).is_some() => {
            let time = timed_literal_time(tree, node)?;
            let inner = tree.content_children(node).nth(1)?;
            let mut value = parse_init_element(tree, inner)?;
            value.time = time;
            Some(value)
        }
        _ => {
            let variable = parse_variable(tree, node)?;
            let is_supported = !tree.text(node).contains('?') && tree.node(node).is_closed();
            Some(TimedVariableValue {
                time: 0.0,
                variable,
                value: VariableValue::Bool(true),
                is_supported,
            })
        }
    }
}

fn timed_literal_time(tree: &SyntaxTree, node: NodeId) -> Option<f64> {
    tree.content_children(node)
        .next()
        .and_then(|n| tree.token_text(n).parse::<f64>().ok())
}

/// Head word of a constraint node. Fused operators carry it on the bracket
/// token itself; other heads are the first content child.
fn constraint_head(tree: &SyntaxTree, node: NodeId) -> (Option<String>, Vec<NodeId>) {
    if let Some(op) = tree.operator(node) {
        return (Some(op.to_ascii_lowercase()), tree.content_children(node).collect());
    }
    let children: Vec<NodeId> = tree.content_children(node).collect();
    match children.split_first() {
        Some((&head, rest)) if !tree.node(head).is_bracket() => {
            (Some(tree.token_text(head).to_ascii_lowercase()), rest.to_vec())
        }
        _ => (None, children),
    }
}

fn collect_constraints(
    tree: &SyntaxTree,
    node: NodeId,
    constraints: &mut Vec<Constraint>,
    supply_demands: &mut Vec<SupplyDemand>,
) {
    if !tree.node(node).is_bracket() {
        return;
    }
    let (head, args) = constraint_head(tree, node);
    match head.as_deref() {
        Some("and") => {
            for child in args {
                collect_constraints(tree, child, constraints, supply_demands);
            }
        }
        Some("name") => {
            let name = args
                .iter()
                .find(|&&n| !tree.node(n).is_bracket())
                .map(|&n| Sym::with_source(tree.token_text(n), tree.span(n)));
            let condition = args.iter().find(|&&n| tree.node(n).is_bracket()).copied();
            constraints.push(Constraint::StateSatisfying(StateConstraint { name, condition, node }));
        }
        Some("after") => {
            let mut names = args
                .iter()
                .filter(|&&n| !tree.node(n).is_bracket())
                .map(|&n| Sym::with_source(tree.token_text(n), tree.span(n)));
            match (names.next(), names.next()) {
                (Some(predecessor), Some(successor)) => constraints.push(Constraint::After {
                    predecessor: StateConstraint {
                        name: Some(predecessor),
                        condition: None,
                        node,
                    },
                    successor: StateConstraint {
                        name: Some(successor),
                        condition: None,
                        node,
                    },
                    node,
                }),
                _ => constraints.push(Constraint::Unrecognized { node }),
            }
        }
        Some("supply-demand") => {
            let name = args
                .iter()
                .find(|&&n| !tree.node(n).is_bracket())
                .map(|&n| Sym::with_source(tree.token_text(n), tree.span(n)));
            supply_demands.push(SupplyDemand { name, node });
        }
        // a bare condition expression is an anonymous goal state
        None if !args.is_empty() => constraints.push(Constraint::StateSatisfying(StateConstraint {
            name: None,
            condition: Some(node),
            node,
        })),
        _ => constraints.push(Constraint::Unrecognized { node }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBLEM: &str = r#"
(define (problem log-1)
  (:domain logistics)
  (:objects plane1 plane2 - plane
            depot city1 - location)
  (:init (at plane1 depot)
         (not (boarded crew1))
         (= (fuel-level plane1) 30)
         (at 10 (open runway))
         (at 20 (= (fuel-price) 1.5)))
  (:goal (and (at plane1 city1)))
  (:constraints (and
    (name fueled (>= (fuel-level plane1) 10))
    (name landed (at plane1 city1))
    (after fueled landed)
    (supply-demand sd1 (over all (available runway)))))
)
"#;

    #[test]
    fn names_and_objects() {
        let model = ProblemModel::parse_str(PROBLEM).unwrap();
        assert_eq!(model.name().unwrap().as_str(), "log-1");
        assert_eq!(model.domain_name().unwrap().as_str(), "logistics");
        let planes = model.objects().get("plane").unwrap();
        assert_eq!(planes.objects(), ["plane1", "plane2"]);
        assert!(model.objects().get("Location").unwrap().has_object("DEPOT"));
    }

    #[test]
    fn init_distinguishes_facts_fluents_and_timed_values() {
        let model = ProblemModel::parse_str(PROBLEM).unwrap();
        let init = model.init();
        assert_eq!(init.len(), 5);

        assert_eq!(init[0].variable.full_name(), "at plane1 depot");
        assert_eq!(init[0].value, VariableValue::Bool(true));
        assert_eq!(init[0].time, 0.0);

        assert_eq!(init[1].value, VariableValue::Bool(false));
        assert_eq!(init[2].value, VariableValue::Numeric(30.0));

        // timed initial literal and fluent
        assert_eq!(init[3].time, 10.0);
        assert_eq!(init[3].value, VariableValue::Bool(true));
        assert_eq!(init[4].time, 20.0);
        assert_eq!(init[4].value, VariableValue::Numeric(1.5));
        assert!(init.iter().all(|v| v.is_supported));
    }

    #[test]
    fn goal_node_covers_the_condition() {
        let model = ProblemModel::parse_str(PROBLEM).unwrap();
        let goal = model.goal().unwrap();
        assert_eq!(model.syntax_tree().text(goal), "(and (at plane1 city1))");
    }

    #[test]
    fn constraints_classify_into_named_states_and_orderings() {
        let model = ProblemModel::parse_str(PROBLEM).unwrap();
        let constraints = model.constraints();
        assert_eq!(constraints.len(), 3);
        match &constraints[0] {
            Constraint::StateSatisfying(c) => {
                assert_eq!(c.name.as_ref().unwrap().as_str(), "fueled");
                assert!(c.condition.is_some());
            }
            other => panic!("unexpected constraint: {other:?}"),
        }
        match &constraints[2] {
            Constraint::After {
                predecessor, successor, ..
            } => {
                assert_eq!(predecessor.name.as_ref().unwrap().as_str(), "fueled");
                assert_eq!(successor.name.as_ref().unwrap().as_str(), "landed");
            }
            other => panic!("unexpected constraint: {other:?}"),
        }
    }

    #[test]
    fn supply_demand_contracts_are_collected() {
        let model = ProblemModel::parse_str(PROBLEM).unwrap();
        assert_eq!(model.supply_demands().len(), 1);
        assert_eq!(model.supply_demands()[0].name.as_ref().unwrap().as_str(), "sd1");
    }

    #[test]
    fn unmodeled_init_elements_are_kept_unsupported() {
        let model = ProblemModel::parse_str("(define (problem p) (:init (= (f) unknown)))").unwrap();
        assert_eq!(model.init().len(), 1);
        assert!(!model.init()[0].is_supported);
        assert_eq!(model.init()[0].variable.name.as_str(), "f");
    }
}
