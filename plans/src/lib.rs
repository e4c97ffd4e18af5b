//! Streaming parser for planner output: plain step lines, metadata comment
//! lines and the embedded XML temporal-plan dialect, assembled into
//! [`plan::Plan`] objects as stdout chunks arrive.

pub mod normalize;
pub mod parser;
pub mod plan;
pub mod xml;

pub use parser::{parse_plans, PlanParser, PlanParserConfig};
pub use plan::{Plan, PlanStep};
