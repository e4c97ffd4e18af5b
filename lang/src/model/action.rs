use std::fmt::{Display, Error, Formatter};

use itertools::Itertools;

use crate::input::{Span, Sym};
use crate::model::variables::Parameter;
use crate::syntax::tree::NodeId;

/// An atomic, zero-duration action.
///
/// Precondition and effect are kept as syntax-node references so consumers
/// can re-extract the exact authored text (e.g. for the external validator)
/// or classify effects lazily.
#[derive(Clone, Debug)]
pub struct InstantAction {
    pub name: Option<Sym>,
    pub parameters: Vec<Parameter>,
    pub precondition: Option<NodeId>,
    pub effect: Option<NodeId>,
    pub span: Span,
    /// Documentation comment lines immediately preceding the action block.
    pub documentation: Vec<String>,
}

/// An action with a duration and temporally qualified conditions/effects
/// (`at start`, `at end`, `over all`).
#[derive(Clone, Debug)]
pub struct DurativeAction {
    pub name: Option<Sym>,
    pub parameters: Vec<Parameter>,
    pub duration: Option<NodeId>,
    pub condition: Option<NodeId>,
    pub effect: Option<NodeId>,
    pub span: Span,
    pub documentation: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum Action {
    Instant(InstantAction),
    Durative(DurativeAction),
}

impl Action {
    pub fn name(&self) -> Option<&Sym> {
        match self {
            Action::Instant(a) => a.name.as_ref(),
            Action::Durative(a) => a.name.as_ref(),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Action::Instant(a) => &a.parameters,
            Action::Durative(a) => &a.parameters,
        }
    }

    pub fn effect(&self) -> Option<NodeId> {
        match self {
            Action::Instant(a) => a.effect,
            Action::Durative(a) => a.effect,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Action::Instant(a) => &a.span,
            Action::Durative(a) => &a.span,
        }
    }

    pub fn documentation(&self) -> &[String] {
        match self {
            Action::Instant(a) => &a.documentation,
            Action::Durative(a) => &a.documentation,
        }
    }

    pub fn is_durative(&self) -> bool {
        matches!(self, Action::Durative(_))
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self.name() {
            Some(name) => write!(f, "{name}(")?,
            None => write!(f, "?(")?,
        }
        write!(f, "{})", self.parameters().iter().format(", "))
    }
}
