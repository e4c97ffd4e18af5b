use std::fmt::{Display, Error, Formatter};

/// One scheduled action instance of a plan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanStep {
    /// Start time in seconds.
    pub time: f64,
    /// Action name followed by its arguments, e.g. `drive truck1 depot city1`.
    pub full_action_name: String,
    pub is_durative: bool,
    /// Real duration for durative steps, the configured epsilon otherwise.
    pub duration: f64,
    /// Zero-based line of the planner output this step came from, when it
    /// came from a plain step line.
    pub line_index: Option<usize>,
}

impl PlanStep {
    pub fn action_name(&self) -> &str {
        self.full_action_name
            .split_whitespace()
            .next()
            .unwrap_or(&self.full_action_name)
    }

    pub fn end_time(&self) -> f64 {
        self.time + self.duration
    }

    /// Whether this step starts at `time`, within `epsilon`.
    pub fn starts_at(&self, time: f64, epsilon: f64) -> bool {
        (self.time - time).abs() < epsilon
    }
}

impl Display for PlanStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}: ({})", self.time, self.full_action_name)?;
        if self.is_durative {
            write!(f, " [{}]", self.duration)?;
        }
        Ok(())
    }
}

/// A completed plan assembled from one stretch of planner output.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    /// Completion time of the last-finishing step, or the value the planner
    /// reported in a `; Makespan:` line, whichever is larger.
    pub makespan: f64,
    /// Metric value reported by the planner, if any.
    pub cost: Option<f64>,
    pub states_evaluated: Option<u64>,
    pub domain_name: Option<String>,
    pub problem_name: Option<String>,
}

impl Plan {
    /// The reported metric, defaulting to the makespan when the planner
    /// did not report one.
    pub fn metric(&self) -> f64 {
        self.cost.unwrap_or(self.makespan)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        if let Some(domain) = &self.domain_name {
            writeln!(f, ";;!domain: {domain}")?;
        }
        if let Some(problem) = &self.problem_name {
            writeln!(f, ";;!problem: {problem}")?;
        }
        for step in &self.steps {
            writeln!(f, "{step}")?;
        }
        writeln!(f, "; Makespan: {}", self.makespan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_accessors() {
        let step = PlanStep {
            time: 12.5,
            full_action_name: "drive truck1 depot".to_string(),
            is_durative: true,
            duration: 7.5,
            line_index: Some(3),
        };
        assert_eq!(step.action_name(), "drive");
        assert_eq!(step.end_time(), 20.0);
        assert!(step.starts_at(12.5001, 1e-3));
        assert!(!step.starts_at(12.6, 1e-3));
    }

    #[test]
    fn metric_falls_back_to_makespan() {
        let mut plan = Plan {
            makespan: 42.0,
            ..Plan::default()
        };
        assert_eq!(plan.metric(), 42.0);
        plan.cost = Some(10.0);
        assert_eq!(plan.metric(), 10.0);
    }
}
