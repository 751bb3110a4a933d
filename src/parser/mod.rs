//! Parser for the worker's plan output.
//!
//! The worker prints plans as a header line followed by one dictionary-literal
//! record per year:
//!
//! ```text
//! Plan 1 (Start: Rice)
//! {'Year': 1, 'Crop': 'Rice', ..., 'Revenue (INR)': np.float64(95000.0)}
//!
//! Plan 2 (Start: Maize)
//! ...
//! ```
//!
//! Parsing is lenient at the record level: a record that fails to decode is
//! reported and skipped, and a plan survives as long as one record decoded.

mod plan;
mod record;
mod tokenizer;

pub use plan::{PlanDocument, YearEntry};
use record::decode_record;

use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanParseError {
    #[error("No plans found in prediction output")]
    NoPlans,

    #[error("Invalid plan header format at line {line}: {header}")]
    Header { line: usize, header: String },

    #[error("Plan {plan}, line {line}: {reason}")]
    Record {
        plan: u32,
        line: usize,
        text: String,
        reason: String,
    },

    #[error("No valid predictions found in plan {plan}")]
    EmptyPlan { plan: u32 },
}

impl PlanParseError {
    /// Copy without the raw worker text, for hardened deployments
    pub fn redacted(&self) -> Self {
        match self {
            PlanParseError::Header { line, .. } => PlanParseError::Header {
                line: *line,
                header: String::new(),
            },
            PlanParseError::Record {
                plan, line, reason, ..
            } => PlanParseError::Record {
                plan: *plan,
                line: *line,
                text: String::new(),
                reason: reason.clone(),
            },
            other => other.clone(),
        }
    }
}

/// Everything recovered from one worker output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub plans: Vec<PlanDocument>,
    pub errors: Vec<PlanParseError>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A run of output lines belonging to one plan, header first.
/// Line numbers are 1-based positions in the full output.
struct Segment<'a> {
    header_line: usize,
    header: &'a str,
    body: Vec<(usize, &'a str)>,
}

/// Parse worker output into plans plus the problems found along the way.
pub fn parse_plans(raw: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let segments = split_segments(raw);

    if segments.is_empty() {
        outcome.errors.push(PlanParseError::NoPlans);
        return outcome;
    }

    for segment in segments {
        if let Some(plan) = parse_segment(&segment, &mut outcome.errors) {
            outcome.plans.push(plan);
        }
    }

    debug!(
        "Parsed {} plans with {} errors",
        outcome.plans.len(),
        outcome.errors.len()
    );
    outcome
}

fn is_header(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("Plan")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Split on plan headers. A header opens a new plan when it starts the output
/// or follows a blank line; the first header may also follow preamble text,
/// since the worker echoes its input prompts without trailing newlines.
fn split_segments(raw: &str) -> Vec<Segment<'_>> {
    let mut segments: Vec<Segment<'_>> = Vec::new();
    let mut previous_blank = true;

    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        let opens_plan = is_header(line) && (previous_blank || segments.is_empty());
        previous_blank = line.trim().is_empty();

        if opens_plan {
            segments.push(Segment {
                header_line: line_no,
                header: line.trim(),
                body: Vec::new(),
            });
        } else if let Some(current) = segments.last_mut() {
            current.body.push((line_no, line));
        } else if !line.trim().is_empty() {
            debug!("Skipping preamble line {}: {}", line_no, line.trim());
        }
    }

    segments
}

/// Extract `(plan number, start crop)` from a `Plan N (Start: Crop)` header
fn parse_header(header: &str) -> Option<(u32, String)> {
    let digits_start = header.find(|c: char| c.is_ascii_digit())?;
    let digits: String = header[digits_start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let plan_number: u32 = digits.parse().ok().filter(|n| *n >= 1)?;

    let after_start = &header[header.find("Start:")? + "Start:".len()..];
    let crop = after_start[..after_start.find(')')?].trim();
    if crop.is_empty() {
        return None;
    }

    Some((plan_number, crop.to_string()))
}

fn parse_segment(segment: &Segment<'_>, errors: &mut Vec<PlanParseError>) -> Option<PlanDocument> {
    let Some((plan_number, start_crop)) = parse_header(segment.header) else {
        errors.push(PlanParseError::Header {
            line: segment.header_line,
            header: segment.header.to_string(),
        });
        return None;
    };

    let mut entries: Vec<YearEntry> = Vec::new();
    let mut seen_years = BTreeSet::new();

    for &(line_no, line) in &segment.body {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            if !trimmed.is_empty() {
                debug!("Plan {}: ignoring line {}: {}", plan_number, line_no, trimmed);
            }
            continue;
        }

        let record_error = |reason: String| PlanParseError::Record {
            plan: plan_number,
            line: line_no,
            text: trimmed.to_string(),
            reason,
        };

        match decode_record(trimmed) {
            Ok(entry) if !seen_years.insert(entry.year) => {
                errors.push(record_error(format!("duplicate year {}", entry.year)));
            }
            Ok(entry) => entries.push(entry),
            Err(e) => {
                debug!("Plan {}: failed to decode line {}: {}", plan_number, line_no, e);
                errors.push(record_error(e.to_string()));
            }
        }
    }

    if entries.is_empty() {
        errors.push(PlanParseError::EmptyPlan { plan: plan_number });
        return None;
    }

    entries.sort_by_key(|e| e.year);

    Some(PlanDocument {
        plan_number,
        start_crop,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "Plan 1 (Start: Rice)\n{'Year': 1, 'Crop': 'Rice', 'NPK Before': [80.0, 40.0, 60.0], 'Fertilizer Added': [0.0, 0.0, 0.0], 'Predicted Yield (q/ha)': 45.2, 'Area (ha)': 2.5, 'Revenue (INR)': 95000.0}";

    fn record(year: u32, crop: &str, revenue_key: &str, revenue: &str) -> String {
        format!(
            "{{'Year': {year}, 'Crop': '{crop}', 'NPK Before': (np.float64(70.5), 35.0, 52.25), 'Fertilizer Added': (0, 0, 0), 'Predicted Yield (q/ha)': np.float64(20.5), 'Area (ha)': 2.5, '{revenue_key}': {revenue}}}"
        )
    }

    fn two_plans() -> String {
        format!(
            "Enter soil N (kg/ha): Enter soil P2O5 (kg/ha): Enter soil K2O (kg/ha): Enter Karnataka region (e.g., Bangalore, Mysore): Enter land area (ha): \n\
             Plan 1 (Start: Rice)\n{}\n{}\n{}\n\n\
             Plan 2 (Start: Maize)\n{}\n{}\n{}\n",
            record(1, "Rice", "Revenue (INR)", "np.float64(95000.0)"),
            record(2, "Ragi", "Revenue (Rs.)", "41000.5"),
            record(3, "Tur", "Revenue", "np.float32(30000.0)"),
            record(1, "Maize", "Revenue (INR)", "88000.0"),
            record(2, "Jowar", "Revenue (INR)", "np.float64(61000.0)"),
            record(3, "Groundnut", "Revenue (Rs.)", "57000.0"),
        )
    }

    #[test]
    fn test_single_plan_scenario() {
        let outcome = parse_plans(SCENARIO);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(
            outcome.plans,
            vec![PlanDocument {
                plan_number: 1,
                start_crop: "Rice".to_string(),
                entries: vec![YearEntry {
                    year: 1,
                    crop: "Rice".to_string(),
                    npk_before: [80.0, 40.0, 60.0],
                    fertilizer_added: [0.0, 0.0, 0.0],
                    predicted_yield: 45.2,
                    area_ha: 2.5,
                    revenue: 95000.0,
                }],
            }]
        );
    }

    #[test]
    fn test_two_plans_three_records_each() {
        let outcome = parse_plans(&two_plans());
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(outcome.plans.len(), 2);

        let first = &outcome.plans[0];
        assert_eq!(first.plan_number, 1);
        assert_eq!(first.start_crop, "Rice");
        assert_eq!(
            first.entries.iter().map(|e| e.year).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(first.entries[0].npk_before, [70.5, 35.0, 52.25]);
        assert_eq!(first.entries[0].revenue, 95000.0);
        assert_eq!(first.entries[1].revenue, 41000.5);
        assert_eq!(first.entries[2].revenue, 30000.0);

        let second = &outcome.plans[1];
        assert_eq!(second.plan_number, 2);
        assert_eq!(second.start_crop, "Maize");
        assert_eq!(second.entries.len(), 3);
        assert_eq!(second.entries[2].crop, "Groundnut");
        assert_eq!(second.entries[2].revenue, 57000.0);
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let raw = two_plans();
        assert_eq!(parse_plans(&raw), parse_plans(&raw));
    }

    #[test]
    fn test_no_plan_marker_yields_error_not_panic() {
        for raw in ["", "\n\n", "Traceback (most recent call last):\n  boom", "{'Year': 1}"] {
            let outcome = parse_plans(raw);
            assert!(outcome.plans.is_empty());
            assert_eq!(outcome.errors, vec![PlanParseError::NoPlans]);
        }
    }

    #[test]
    fn test_malformed_record_is_skipped_and_reported() {
        let raw = format!(
            "Plan 1 (Start: Rice)\n{}\n{{'Year': 2, 'Crop': broken}}\n{}\n",
            record(1, "Rice", "Revenue", "1.0"),
            record(3, "Tur", "Revenue", "2.0"),
        );
        let outcome = parse_plans(&raw);
        assert_eq!(outcome.plans.len(), 1);
        assert_eq!(outcome.plans[0].entries.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        match &outcome.errors[0] {
            PlanParseError::Record { plan, line, .. } => {
                assert_eq!(*plan, 1);
                assert_eq!(*line, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_plan_without_records_is_a_failure() {
        let raw = format!(
            "Plan 1 (Start: Rice)\nno records here\n\nPlan 2 (Start: Ragi)\n{}",
            record(1, "Ragi", "Revenue", "1.0")
        );
        let outcome = parse_plans(&raw);
        assert_eq!(outcome.plans.len(), 1);
        assert_eq!(outcome.plans[0].plan_number, 2);
        assert_eq!(outcome.errors, vec![PlanParseError::EmptyPlan { plan: 1 }]);
    }

    #[test]
    fn test_bad_header_drops_plan() {
        let raw = format!("Plan one (Rice)\n{}", record(1, "Rice", "Revenue", "1.0"));
        let outcome = parse_plans(&raw);
        assert!(outcome.plans.is_empty());
        assert!(matches!(
            outcome.errors.as_slice(),
            [PlanParseError::Header { line: 1, .. }]
        ));
    }

    #[test]
    fn test_duplicate_year_rejected_and_entries_sorted() {
        let raw = format!(
            "Plan 4 (Start: Tur)\n{}\n{}\n{}",
            record(2, "Ragi", "Revenue", "1.0"),
            record(1, "Tur", "Revenue", "1.0"),
            record(2, "Jowar", "Revenue", "1.0"),
        );
        let outcome = parse_plans(&raw);
        let plan = &outcome.plans[0];
        assert_eq!(plan.plan_number, 4);
        assert_eq!(
            plan.entries.iter().map(|e| e.crop.as_str()).collect::<Vec<_>>(),
            vec!["Tur", "Ragi"]
        );
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_header_not_after_blank_line_stays_in_plan() {
        let raw = format!(
            "Plan 1 (Start: Rice)\n{}\nPlan 2 (Start: Ragi)\n{}",
            record(1, "Rice", "Revenue", "1.0"),
            record(2, "Ragi", "Revenue", "1.0"),
        );
        let outcome = parse_plans(&raw);
        assert_eq!(outcome.plans.len(), 1);
        assert_eq!(outcome.plans[0].entries.len(), 2);
    }

    #[test]
    fn test_crlf_output() {
        let raw = SCENARIO.replace('\n', "\r\n");
        let outcome = parse_plans(&raw);
        assert_eq!(outcome.plans.len(), 1);
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(
            parse_header("Plan 12 (Start: Green Gram)"),
            Some((12, "Green Gram".to_string()))
        );
        assert_eq!(parse_header("Plan 1 (Rice)"), None);
        assert_eq!(parse_header("Plan 0 (Start: Rice)"), None);
        assert_eq!(parse_header("Plan 1 (Start: )"), None);
    }

    #[test]
    fn test_redaction_drops_raw_text() {
        let err = PlanParseError::Record {
            plan: 1,
            line: 2,
            text: "{'secret': 1}".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(
            err.redacted(),
            PlanParseError::Record {
                plan: 1,
                line: 2,
                text: String::new(),
                reason: "bad".to_string(),
            }
        );
    }
}
