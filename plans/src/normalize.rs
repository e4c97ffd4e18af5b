//! Secondary step ordering for display and diffing.
//!
//! The parser keeps steps in the order the planner printed them; rendering
//! and plan comparison want a canonical order instead, so two equivalent
//! plans line up step for step.

use itertools::Itertools;

use crate::plan::{Plan, PlanStep};

/// Orders steps by start time, breaking ties by full action name. Stable
/// for steps that tie on both keys.
pub fn normalized_steps(steps: &[PlanStep]) -> Vec<PlanStep> {
    steps
        .iter()
        .cloned()
        .sorted_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then_with(|| a.full_action_name.cmp(&b.full_action_name))
        })
        .collect()
}

/// The same plan with its steps in canonical order.
pub fn normalized(plan: &Plan) -> Plan {
    Plan {
        steps: normalized_steps(&plan.steps),
        ..plan.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(time: f64, name: &str) -> PlanStep {
        PlanStep {
            time,
            full_action_name: name.to_string(),
            is_durative: false,
            duration: 1e-3,
            line_index: None,
        }
    }

    #[test]
    fn orders_by_time_then_name() {
        let steps = vec![step(5.0, "b x"), step(0.0, "z"), step(5.0, "a y")];
        let ordered = normalized_steps(&steps);
        assert_eq!(ordered[0].full_action_name, "z");
        assert_eq!(ordered[1].full_action_name, "a y");
        assert_eq!(ordered[2].full_action_name, "b x");
    }

    #[test]
    fn ties_keep_their_original_order() {
        let steps = vec![step(1.0, "same"), step(1.0, "same")];
        let ordered = normalized_steps(&steps);
        assert_eq!(ordered.len(), 2);
    }
}
