//! Incremental parser for planner stdout.
//!
//! Planner output is untrusted free-form text arriving in arbitrarily sized
//! chunks, possibly split mid-line. The parser buffers the unconsumed tail,
//! recognizes metadata comments, plain step lines and embedded XML plan
//! blocks, and assembles one or more completed [`Plan`]s. It never fails:
//! anything it cannot read is logged and skipped, and the worst outcome of
//! a whole stream is a zero-step plan.

use regex::Regex;

use crate::plan::{Plan, PlanStep};
use crate::xml;

#[derive(Clone, Copy, Debug)]
pub struct PlanParserConfig {
    /// Nominal duration of non-durative steps, and the tolerance used when
    /// comparing two times for near-equality.
    pub epsilon: f64,
    /// The parser finalizes zero-step plans as needed so at least this many
    /// plans come out of a finished stream.
    pub minimum_plans_expected: usize,
}

impl Default for PlanParserConfig {
    fn default() -> PlanParserConfig {
        PlanParserConfig {
            epsilon: 1e-3,
            minimum_plans_expected: 1,
        }
    }
}

/// An embedded XML plan document being accumulated line by line.
struct XmlBlock {
    buffer: String,
    root: Option<String>,
}

pub struct PlanParser {
    config: PlanParserConfig,
    /// Unconsumed tail of the stream, at most one partial line.
    buffer: String,
    line_index: usize,
    current: Plan,
    /// Whether any recognized line has touched the current plan.
    started: bool,
    xml_block: Option<XmlBlock>,
    plans: Vec<Plan>,

    step_re: Regex,
    domain_re: Regex,
    problem_re: Regex,
    makespan_re: Regex,
    cost_re: Regex,
    states_re: Regex,
    xml_root_re: Regex,
}

impl PlanParser {
    pub fn new(config: PlanParserConfig) -> PlanParser {
        PlanParser {
            config,
            buffer: String::new(),
            line_index: 0,
            current: Plan::default(),
            started: false,
            xml_block: None,
            plans: Vec::new(),
            step_re: Regex::new(r"^\s*(?:(\d+\.?\d*|\.\d+)\s*:)?\s*\(([^)]*)\)\s*(?:\[\s*(\d+\.?\d*|\.\d+)\s*\])?\s*$")
                .unwrap(),
            domain_re: Regex::new(r"^;;\s*!domain:\s*(\S+)").unwrap(),
            problem_re: Regex::new(r"^;;\s*!problem:\s*(\S+)").unwrap(),
            makespan_re: Regex::new(r"^;\s*Makespan:\s*(\d+\.?\d*|\.\d+)").unwrap(),
            cost_re: Regex::new(r"^;\s*Cost:\s*(\d+\.?\d*|\.\d+)").unwrap(),
            states_re: Regex::new(r"^;\s*States evaluated\s*:\s*(\d+)").unwrap(),
            xml_root_re: Regex::new(r"<([A-Za-z][\w:-]*)[\s>]").unwrap(),
        }
    }

    /// Feeds one chunk of planner stdout. Chunk boundaries are arbitrary; a
    /// trailing partial line is held back until its continuation arrives.
    pub fn append(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.process_line(line.trim_end_matches(&['\n', '\r']));
        }
    }

    /// Signals end of stream: flushes the held-back tail, seals the
    /// in-progress plan and returns every plan seen, topped up with
    /// zero-step plans to the configured minimum.
    pub fn finish(mut self) -> Vec<Plan> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(line.trim_end_matches('\r'));
        }
        if let Some(block) = self.xml_block.take() {
            // end of stream closes an unterminated block
            self.consume_xml(block.buffer);
        }
        if self.started {
            self.seal_current();
        }
        while self.plans.len() < self.config.minimum_plans_expected {
            self.plans.push(Plan::default());
        }
        self.plans
    }

    fn process_line(&mut self, line: &str) {
        let index = self.line_index;
        self.line_index += 1;

        if let Some(mut block) = self.xml_block.take() {
            block.buffer.push_str(line);
            block.buffer.push('\n');
            match self.xml_block_complete(&mut block) {
                true => self.consume_xml(block.buffer),
                false => self.xml_block = Some(block),
            }
            return;
        }

        if let Some(c) = self.domain_re.captures(line) {
            self.current.domain_name = Some(c[1].to_string());
            self.started = true;
        } else if let Some(c) = self.problem_re.captures(line) {
            self.current.problem_name = Some(c[1].to_string());
            self.started = true;
        } else if let Some(c) = self.makespan_re.captures(line) {
            if let Ok(makespan) = c[1].parse::<f64>() {
                self.current.makespan = self.current.makespan.max(makespan);
                self.started = true;
            }
        } else if let Some(c) = self.cost_re.captures(line) {
            if let Ok(cost) = c[1].parse::<f64>() {
                self.current.cost = Some(cost);
                self.started = true;
            }
        } else if let Some(c) = self.states_re.captures(line) {
            if let Ok(states) = c[1].parse::<u64>() {
                self.current.states_evaluated = Some(states);
                self.started = true;
            }
        } else if let Some(step) = self.parse_step(line, index) {
            self.push_step(step);
        } else if line.contains("<?xml") {
            let mut block = XmlBlock {
                buffer: format!("{line}\n"),
                root: None,
            };
            match self.xml_block_complete(&mut block) {
                true => self.consume_xml(block.buffer),
                false => self.xml_block = Some(block),
            }
        } else if !line.trim().is_empty() {
            tracing::debug!(line, "unrecognized planner output line");
        }
    }

    fn parse_step(&self, line: &str, index: usize) -> Option<PlanStep> {
        let captures = self.step_re.captures(line)?;
        let action = captures[2].split_whitespace().collect::<Vec<_>>().join(" ");
        if action.is_empty() {
            return None;
        }
        // a step without a time starts at the current makespan
        let time = captures
            .get(1)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(self.current.makespan);
        let duration = captures.get(3).and_then(|m| m.as_str().parse::<f64>().ok());
        Some(PlanStep {
            time,
            full_action_name: action,
            is_durative: duration.is_some(),
            duration: duration.unwrap_or(self.config.epsilon),
            line_index: Some(index),
        })
    }

    fn push_step(&mut self, step: PlanStep) {
        // a start time regressing below the previous step means the planner
        // began printing its next candidate plan
        if let Some(last) = self.current.steps.last() {
            if step.time < last.time - self.config.epsilon {
                self.seal_current();
            }
        }
        self.started = true;
        self.current.makespan = self.current.makespan.max(step.end_time());
        self.current.steps.push(step);
    }

    /// Whether the accumulated block now closes its root element.
    fn xml_block_complete(&self, block: &mut XmlBlock) -> bool {
        if block.root.is_none() {
            block.root = self
                .xml_root_re
                .captures(&block.buffer)
                .map(|c| c[1].to_string());
        }
        match &block.root {
            Some(root) => block.buffer.contains(&format!("</{root}>")),
            None => false,
        }
    }

    fn consume_xml(&mut self, buffer: String) {
        match xml::parse_plan(&buffer, self.config.epsilon) {
            Ok(steps) => {
                for step in steps {
                    self.started = true;
                    self.current.makespan = self.current.makespan.max(step.end_time());
                    self.current.steps.push(step);
                }
            }
            // lenient: a broken block contributes no steps
            Err(error) => tracing::warn!(%error, "discarding unreadable XML plan block"),
        }
    }

    fn seal_current(&mut self) {
        let domain = self.current.domain_name.clone();
        let problem = self.current.problem_name.clone();
        let plan = std::mem::take(&mut self.current);
        self.plans.push(plan);
        // the next candidate plan in the same stream is for the same inputs
        self.current.domain_name = domain;
        self.current.problem_name = problem;
        self.started = false;
    }
}

impl Default for PlanParser {
    fn default() -> PlanParser {
        PlanParser::new(PlanParserConfig::default())
    }
}

/// Parses a complete plan text in one call.
pub fn parse_plans(text: &str, config: PlanParserConfig) -> Vec<Plan> {
    let mut parser = PlanParser::new(config);
    parser.append(text);
    parser.finish()
}
