//! The XML temporal-plan dialect some planners emit instead of plain step
//! lines: a sequence of `Happening` elements, each holding an `ActionStart`
//! (name, parameter symbols, times encoded as ISO-8601-like duration offsets
//! `PnDTnHnMn.nnnS`) or an `ActionEnd` referencing a prior start by
//! `ActionID`.

use itertools::Itertools;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

use crate::plan::PlanStep;

#[derive(Error, Debug)]
pub enum XmlPlanError {
    #[error("malformed XML plan: {0}")]
    Malformed(#[from] quick_xml::Error),
    #[error("cannot parse duration literal `{0}`")]
    InvalidDuration(String),
    #[error("ActionID `{0}` reused after that action already completed")]
    DuplicateActionId(String),
}

/// Decodes a `PnDTnHnMn.nnnS` offset into seconds. Each component is
/// optional; `P0DT3H0M7.200S` is 10807.2.
pub fn parse_iso_duration(literal: &str) -> Result<f64, XmlPlanError> {
    let re = Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$").unwrap();
    let Some(captures) = re.captures(literal.trim()) else {
        return Err(XmlPlanError::InvalidDuration(literal.to_string()));
    };
    let part = |i: usize| {
        captures
            .get(i)
            .map(|m| m.as_str().parse::<f64>().unwrap_or(0.0))
            .unwrap_or(0.0)
    };
    Ok(part(1) * 86400.0 + part(2) * 3600.0 + part(3) * 60.0 + part(4))
}

/// One `ActionStart` and, once seen, its matching end time.
struct HappeningRecord {
    action_id: Option<String>,
    name: String,
    parameters: Vec<String>,
    start: f64,
    expected_duration: Option<f64>,
    end: Option<f64>,
}

impl HappeningRecord {
    fn full_action_name(&self) -> String {
        if self.parameters.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.parameters.iter().format(" "))
        }
    }
}

#[derive(Default)]
struct HappeningBuilder {
    action_id: Option<String>,
    name: Option<String>,
    parameters: Vec<String>,
    start: Option<f64>,
    expected_duration: Option<f64>,
    end: Option<f64>,
}

/// Parses one well-formed XML plan document into plan steps, in the order
/// the actions start.
///
/// A start matched by an `ActionEnd` becomes a durative step whose duration
/// is the distance between the two times; a start never matched becomes a
/// non-durative step, with `ExpectedDuration` kept as its nominal duration
/// when present and `epsilon` otherwise.
pub fn parse_plan(xml: &str, epsilon: f64) -> Result<Vec<PlanStep>, XmlPlanError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records: Vec<HappeningRecord> = Vec::new();
    let mut building: Option<HappeningBuilder> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                if matches!(e.name().as_ref(), b"ActionStart" | b"ActionEnd") {
                    building = Some(HappeningBuilder::default());
                }
                text.clear();
            }
            Event::Text(ref t) => {
                text = t.unescape()?.into_owned();
            }
            Event::End(ref e) => {
                let tag = e.name();
                if let Some(b) = building.as_mut() {
                    match tag.as_ref() {
                        b"ActionID" => b.action_id = Some(text.clone()),
                        b"Name" => b.name = Some(text.clone()),
                        b"Symbol" => b.parameters.push(text.clone()),
                        b"ExpectedStartTime" => b.start = Some(parse_iso_duration(&text)?),
                        b"ExpectedDuration" => b.expected_duration = Some(parse_iso_duration(&text)?),
                        b"ExpectedEndTime" => b.end = Some(parse_iso_duration(&text)?),
                        _ => {}
                    }
                }
                match tag.as_ref() {
                    b"ActionStart" => {
                        if let Some(b) = building.take() {
                            record_start(&mut records, b)?;
                        }
                    }
                    b"ActionEnd" => {
                        if let Some(b) = building.take() {
                            record_end(&mut records, b);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records
        .into_iter()
        .map(|r| match r.end {
            Some(end) => PlanStep {
                time: r.start,
                full_action_name: r.full_action_name(),
                is_durative: true,
                duration: end - r.start,
                line_index: None,
            },
            None => PlanStep {
                time: r.start,
                full_action_name: r.full_action_name(),
                is_durative: false,
                duration: r.expected_duration.unwrap_or(epsilon),
                line_index: None,
            },
        })
        .collect())
}

fn record_start(records: &mut Vec<HappeningRecord>, b: HappeningBuilder) -> Result<(), XmlPlanError> {
    if let Some(id) = &b.action_id {
        let completed = records
            .iter()
            .any(|r| r.action_id.as_deref() == Some(id) && r.end.is_some());
        if completed {
            return Err(XmlPlanError::DuplicateActionId(id.clone()));
        }
    }
    records.push(HappeningRecord {
        action_id: b.action_id,
        name: b.name.unwrap_or_default(),
        parameters: b.parameters,
        start: b.start.unwrap_or(0.0),
        expected_duration: b.expected_duration,
        end: None,
    });
    Ok(())
}

fn record_end(records: &mut Vec<HappeningRecord>, b: HappeningBuilder) {
    let Some(id) = b.action_id else {
        tracing::warn!("ActionEnd without an ActionID, ignored");
        return;
    };
    let open = records
        .iter_mut()
        .find(|r| r.action_id.as_deref() == Some(id.as_str()) && r.end.is_none());
    match open {
        Some(record) => {
            // realized end time; fall back to the expected duration when the
            // planner omitted it
            record.end = b.end.or_else(|| record.expected_duration.map(|d| record.start + d));
        }
        None => tracing::warn!(action_id = %id, "ActionEnd does not match any open ActionStart"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_durations_decode_to_seconds() {
        assert_eq!(parse_iso_duration("P0DT3H0M7.200S").unwrap(), 10807.2);
        assert_eq!(parse_iso_duration("P0DT0H1M0.000S").unwrap(), 60.0);
        assert_eq!(parse_iso_duration("P1DT0H0M0.000S").unwrap(), 86400.0);
        assert!(parse_iso_duration("3 hours").is_err());
    }

    #[test]
    fn unmatched_start_is_non_durative() {
        let xml = r#"<?xml version="1.0"?>
<Plan>
  <Happening>
    <ActionStart>
      <ActionID>1</ActionID>
      <Name>observe</Name>
      <Parameters><Parameter><Symbol>sat1</Symbol></Parameter></Parameters>
      <ExpectedStartTime>P0DT3H0M7.200S</ExpectedStartTime>
    </ActionStart>
  </Happening>
</Plan>"#;
        let steps = parse_plan(xml, 1e-3).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].time, 10807.2);
        assert!(!steps[0].is_durative);
        assert_eq!(steps[0].full_action_name, "observe sat1");
        assert_eq!(steps[0].duration, 1e-3);
    }

    #[test]
    fn matched_pair_becomes_a_durative_step() {
        let xml = r#"<?xml version="1.0"?>
<Plan>
  <Happening>
    <ActionStart>
      <ActionID>1</ActionID>
      <Name>recharge</Name>
      <ExpectedStartTime>P0DT0H1M0.000S</ExpectedStartTime>
      <ExpectedDuration>P0DT1H0M0.000S</ExpectedDuration>
    </ActionStart>
  </Happening>
  <Happening>
    <ActionEnd>
      <ActionID>1</ActionID>
      <ExpectedEndTime>P0DT1H1M0.000S</ExpectedEndTime>
    </ActionEnd>
  </Happening>
</Plan>"#;
        let steps = parse_plan(xml, 1e-3).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].time, 60.0);
        assert!(steps[0].is_durative);
        assert_eq!(steps[0].duration, 3600.0);
    }

    #[test]
    fn end_without_a_time_uses_the_expected_duration() {
        let xml = r#"<Plan>
  <ActionStart>
    <ActionID>7</ActionID>
    <Name>move</Name>
    <ExpectedStartTime>P0DT0H0M5.000S</ExpectedStartTime>
    <ExpectedDuration>P0DT0H0M2.500S</ExpectedDuration>
  </ActionStart>
  <ActionEnd><ActionID>7</ActionID></ActionEnd>
</Plan>"#;
        let steps = parse_plan(xml, 1e-3).unwrap();
        assert!(steps[0].is_durative);
        assert_eq!(steps[0].duration, 2.5);
    }

    #[test]
    fn reusing_a_completed_action_id_is_an_error() {
        let xml = r#"<Plan>
  <ActionStart><ActionID>1</ActionID><Name>a</Name>
    <ExpectedStartTime>P0DT0H0M0.000S</ExpectedStartTime></ActionStart>
  <ActionEnd><ActionID>1</ActionID>
    <ExpectedEndTime>P0DT0H0M1.000S</ExpectedEndTime></ActionEnd>
  <ActionStart><ActionID>1</ActionID><Name>b</Name>
    <ExpectedStartTime>P0DT0H0M2.000S</ExpectedStartTime></ActionStart>
</Plan>"#;
        assert!(matches!(parse_plan(xml, 1e-3), Err(XmlPlanError::DuplicateActionId(_))));
    }
}
