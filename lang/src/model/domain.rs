use std::sync::Arc;

use anyhow::{bail, Result};

use crate::graph::DirectionalGraph;
use crate::inheritance::{parse_inheritance, to_type_objects, TypeObjectMap, OBJECT_TYPE};
use crate::input::{Input, Sym};
use crate::model::action::{Action, DurativeAction, InstantAction};
use crate::model::effects::{parse_effects, Effect, EffectError};
use crate::model::variables::{find_references, parse_lifted_variable, parse_parameters, Variable};
use crate::syntax::token::TokenKind;
use crate::syntax::tree::{NodeId, SyntaxTree};

/// Semantic model of a domain document: the declarations an editor needs to
/// answer queries (completion, hovers, reference search) and to cross-check
/// problems and plans against.
///
/// Built in one pass over the syntax tree and immutable afterwards. Parsing
/// is lenient section by section: unknown blocks are skipped, since the
/// document is routinely incomplete while being authored.
pub struct DomainModel {
    tree: SyntaxTree,
    name: Option<Sym>,
    requirements: Vec<Sym>,
    predicates: Vec<Variable>,
    functions: Vec<Variable>,
    derived: Vec<Variable>,
    actions: Vec<Action>,
    types: DirectionalGraph,
    constants: TypeObjectMap,
}

impl DomainModel {
    pub fn parse(input: Arc<Input>) -> Result<DomainModel> {
        let tree = SyntaxTree::parse(input);
        let Some(define) = find_define(&tree) else {
            bail!("no (define ...) block in document");
        };

        let mut model = DomainModel {
            name: None,
            requirements: Vec::new(),
            predicates: Vec::new(),
            functions: Vec::new(),
            derived: Vec::new(),
            actions: Vec::new(),
            types: DirectionalGraph::new(),
            constants: TypeObjectMap::new(),
            tree,
        };
        let tree = &model.tree;

        // comment lines seen since the previous section, attached to the
        // next action as its documentation
        let mut pending_comments: Vec<String> = Vec::new();

        for section in tree.node(define).children().to_vec() {
            match tree.node(section).kind() {
                TokenKind::Comment => {
                    pending_comments.push(strip_comment(tree.token_text(section)));
                    continue;
                }
                TokenKind::Whitespace => continue,
                _ => {}
            }
            let docs = std::mem::take(&mut pending_comments);
            let Some(op) = tree.operator(section) else { continue };
            match op.to_ascii_lowercase().as_str() {
                "domain" => {
                    model.name = tree
                        .content_children(section)
                        .next()
                        .map(|n| Sym::with_source(tree.token_text(n), tree.span(n)));
                }
                ":requirements" => {
                    for req in tree.content_children(section) {
                        model
                            .requirements
                            .push(Sym::with_source(tree.token_text(req), tree.span(req)));
                    }
                }
                ":types" => {
                    model.types = parse_inheritance(&declaration_text(tree, section));
                }
                ":constants" => {
                    let graph = parse_inheritance(&declaration_text(tree, section));
                    model.constants = to_type_objects(&graph);
                }
                ":predicates" => {
                    for decl in tree.content_children(section).collect::<Vec<_>>() {
                        if let Some(v) = parse_lifted_variable(tree, decl) {
                            model.predicates.push(v);
                        }
                    }
                }
                ":functions" => {
                    for decl in tree.content_children(section).collect::<Vec<_>>() {
                        if let Some(v) = parse_lifted_variable(tree, decl) {
                            model.functions.push(v);
                        }
                    }
                }
                ":derived" => {
                    if let Some(decl) = tree.content_children(section).next() {
                        if let Some(v) = parse_lifted_variable(tree, decl) {
                            model.derived.push(v);
                        }
                    }
                }
                // events and processes share the instantaneous action shape
                ":action" | ":event" | ":process" => {
                    model.actions.push(Action::Instant(parse_instant_action(tree, section, docs)));
                }
                ":durative-action" => {
                    model
                        .actions
                        .push(Action::Durative(parse_durative_action(tree, section, docs)));
                }
                _ => {}
            }
        }
        Ok(model)
    }

    pub fn parse_str(text: &str) -> Result<DomainModel> {
        DomainModel::parse(Arc::new(Input::from_string(text)))
    }

    pub fn name(&self) -> Option<&Sym> {
        self.name.as_ref()
    }

    pub fn requirements(&self) -> &[Sym] {
        &self.requirements
    }

    pub fn predicates(&self) -> &[Variable] {
        &self.predicates
    }

    pub fn functions(&self) -> &[Variable] {
        &self.functions
    }

    pub fn derived(&self) -> &[Variable] {
        &self.derived
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.name().is_some_and(|n| n.canonical_eq(name)))
    }

    pub fn type_graph(&self) -> &DirectionalGraph {
        &self.types
    }

    /// Declared type names. The universal `object` type is implicit and
    /// excluded.
    pub fn types(&self) -> Vec<&str> {
        self.types
            .vertices()
            .filter(|t| !t.eq_ignore_ascii_case(OBJECT_TYPE))
            .collect()
    }

    pub fn constants(&self) -> &TypeObjectMap {
        &self.constants
    }

    pub fn syntax_tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Classified effects of an action, or the structural error of its
    /// first malformed effect. Callers typically isolate this per action
    /// and keep processing the others.
    pub fn action_effects(&self, action: &Action) -> Result<Vec<Effect>, EffectError> {
        match action.effect() {
            Some(node) => parse_effects(&self.tree, node),
            None => Ok(Vec::new()),
        }
    }

    /// Bracket nodes applying the given declared variable, anywhere in the
    /// document.
    pub fn references(&self, variable: &Variable) -> Vec<NodeId> {
        find_references(&self.tree, self.tree.root(), variable)
    }
}

/// The `(define ...)` node of a document, if any.
pub(crate) fn find_define(tree: &SyntaxTree) -> Option<NodeId> {
    tree.content_children(tree.root())
        .find(|&n| tree.operator(n).is_some_and(|op| op.eq_ignore_ascii_case("define")))
}

pub(crate) fn strip_comment(text: &str) -> String {
    text.trim_start_matches(';').trim().to_string()
}

/// Declaration text of a section with comments dropped, suitable for the
/// inheritance parser.
pub(crate) fn declaration_text(tree: &SyntaxTree, section: NodeId) -> String {
    let mut out = String::new();
    for child in tree.node(section).children() {
        match tree.node(*child).kind() {
            TokenKind::Other | TokenKind::Dash | TokenKind::Number => {
                out.push_str(tree.token_text(*child));
                out.push(' ');
            }
            TokenKind::Whitespace => out.push(' '),
            _ => {}
        }
    }
    out
}

fn parse_instant_action(tree: &SyntaxTree, node: NodeId, documentation: Vec<String>) -> InstantAction {
    let mut action = InstantAction {
        name: None,
        parameters: Vec::new(),
        precondition: None,
        effect: None,
        span: tree.span(node),
        documentation,
    };
    let mut children = tree.content_children(node).collect::<Vec<_>>().into_iter().peekable();
    // the name is optional while the action is being authored; a leading
    // `:keyword` is the first section, not a name
    if let Some(&first) = children.peek() {
        if tree.node(first).kind() == TokenKind::Other && !tree.token_text(first).starts_with(':') {
            children.next();
            action.name = Some(Sym::with_source(tree.token_text(first), tree.span(first)));
        }
    }
    while let Some(key) = children.next() {
        let Some(value) = children.next() else { break };
        match tree.token_text(key).to_ascii_lowercase().as_str() {
            ":parameters" => action.parameters = parse_parameters(tree, value),
            ":precondition" => action.precondition = Some(value),
            ":effect" => action.effect = Some(value),
            _ => {}
        }
    }
    action
}

fn parse_durative_action(tree: &SyntaxTree, node: NodeId, documentation: Vec<String>) -> DurativeAction {
    let mut action = DurativeAction {
        name: None,
        parameters: Vec::new(),
        duration: None,
        condition: None,
        effect: None,
        span: tree.span(node),
        documentation,
    };
    let mut children = tree.content_children(node).collect::<Vec<_>>().into_iter().peekable();
    // the name is optional while the action is being authored; a leading
    // `:keyword` is the first section, not a name
    if let Some(&first) = children.peek() {
        if tree.node(first).kind() == TokenKind::Other && !tree.token_text(first).starts_with(':') {
            children.next();
            action.name = Some(Sym::with_source(tree.token_text(first), tree.span(first)));
        }
    }
    while let Some(key) = children.next() {
        let Some(value) = children.next() else { break };
        match tree.token_text(key).to_ascii_lowercase().as_str() {
            ":parameters" => action.parameters = parse_parameters(tree, value),
            ":duration" => action.duration = Some(value),
            ":condition" => action.condition = Some(value),
            ":effect" => action.effect = Some(value),
            _ => {}
        }
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = r#"
(define (domain logistics)
  (:requirements :strips :typing :durative-actions)
  (:types truck plane - vehicle
          vehicle package - physical
          location)
  (:constants depot0 - location)
  (:predicates (at ?p - physical ?l - location)
               (in ?p - package ?v - vehicle))
  (:functions (fuel-level ?v - vehicle))

  ; Loads a package into a vehicle.
  (:action load
    :parameters (?p - package ?v - vehicle ?l - location)
    :precondition (and (at ?p ?l) (at ?v ?l))
    :effect (and (in ?p ?v) (not (at ?p ?l))))

  (:durative-action fly
    :parameters (?a - plane ?from ?to - location)
    :duration (= ?duration 180)
    :condition (and (at start (at ?a ?from)))
    :effect (and (at start (not (at ?a ?from)))
                 (at end (at ?a ?to))
                 (at end (decrease (fuel-level ?a) 40))))
)
"#;

    #[test]
    fn sections_populate_the_model() {
        let model = DomainModel::parse_str(DOMAIN).unwrap();
        assert_eq!(model.name().unwrap().as_str(), "logistics");
        assert_eq!(model.requirements().len(), 3);
        assert_eq!(model.predicates().len(), 2);
        assert_eq!(model.functions().len(), 1);
        assert_eq!(model.actions().len(), 2);
    }

    #[test]
    fn type_graph_excludes_the_universal_root() {
        let model = DomainModel::parse_str(DOMAIN).unwrap();
        let types = model.types();
        assert!(types.contains(&"truck"));
        assert!(types.contains(&"vehicle"));
        assert!(!types.iter().any(|t| t.eq_ignore_ascii_case("object")));
        // truck -> vehicle -> physical -> object
        assert_eq!(model.type_graph().pointing_from("truck"), vec!["vehicle", "physical", "object"]);
    }

    #[test]
    fn constants_are_bucketed_by_type() {
        let model = DomainModel::parse_str(DOMAIN).unwrap();
        assert!(model.constants().get("location").unwrap().has_object("depot0"));
    }

    #[test]
    fn instant_action_fields() {
        let model = DomainModel::parse_str(DOMAIN).unwrap();
        let Action::Instant(load) = model.action("load").unwrap() else {
            panic!("load should be instantaneous");
        };
        assert_eq!(load.parameters.len(), 3);
        assert_eq!(load.parameters[1].tpe.as_str(), "vehicle");
        assert!(load.precondition.is_some());
        assert_eq!(load.documentation, vec!["Loads a package into a vehicle."]);

        let tree = model.syntax_tree();
        assert!(tree.text(load.effect.unwrap()).starts_with("(and (in ?p ?v)"));
    }

    #[test]
    fn durative_action_fields_and_effects() {
        let model = DomainModel::parse_str(DOMAIN).unwrap();
        let fly = model.action("fly").unwrap();
        assert!(fly.is_durative());
        assert_eq!(fly.parameters().len(), 3);
        let effects = model.action_effects(fly).unwrap();
        assert_eq!(effects.len(), 3);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Decrease { variable, .. } if variable.name.canonical_eq("fuel-level"))));
    }

    #[test]
    fn nameless_action_keeps_its_sections_aligned() {
        let text = "(define (domain d)
  (:action :parameters (?t - truck) :effect (parked ?t)))";
        let model = DomainModel::parse_str(text).unwrap();
        let Action::Instant(action) = &model.actions()[0] else {
            panic!("expected an instantaneous action");
        };
        assert!(action.name.is_none());
        assert_eq!(action.parameters.len(), 1);
        assert_eq!(action.parameters[0].tpe.as_str(), "truck");
        assert!(action.effect.is_some());
    }

    #[test]
    fn reference_search_finds_applications() {
        let model = DomainModel::parse_str(DOMAIN).unwrap();
        let at = model.predicates().iter().find(|p| p.name.canonical_eq("at")).unwrap();
        let refs = model.references(at);
        // declaration + five applications in load/fly (the `(at start ...)`
        // qualifiers do not count: `start`/`end` follows the operator)
        assert!(refs.len() >= 6, "found {}", refs.len());
    }
}
