use serde::Serialize;
use serde_json::Value;

use super::{PredictionRequest, RawPredictionInput, Region};

pub const MIN_NUTRIENT: f64 = 0.0;
pub const MAX_NUTRIENT: f64 = 500.0;

/// A single rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Normalize and bounds-check a raw request.
///
/// Collects every violation instead of stopping at the first one so the
/// caller can report them all in a single response.
pub fn validate(raw: &RawPredictionInput) -> Result<PredictionRequest, Vec<FieldViolation>> {
    let mut violations = Vec::new();

    let n_value = nutrient(&raw.n_value, "n_value", "Nitrogen", &mut violations);
    let p_value = nutrient(&raw.p_value, "p_value", "Phosphorus", &mut violations);
    let k_value = nutrient(&raw.k_value, "k_value", "Potassium", &mut violations);

    let area = match number(&raw.area) {
        Some(a) if a > 0.0 => Some(a),
        _ => {
            violations.push(FieldViolation::new("area", "Area must be greater than 0"));
            None
        }
    };

    let region = match raw.region.as_ref().and_then(Value::as_str) {
        Some(name) => name.parse::<Region>().ok(),
        None => None,
    };
    if region.is_none() {
        let names = Region::ALL.map(Region::as_str).join(", ");
        violations.push(FieldViolation::new(
            "region",
            format!("Region must be one of: {}", names),
        ));
    }

    match (n_value, p_value, k_value, region, area) {
        (Some(n_value), Some(p_value), Some(k_value), Some(region), Some(area))
            if violations.is_empty() =>
        {
            Ok(PredictionRequest {
                n_value,
                p_value,
                k_value,
                region,
                area,
            })
        }
        _ => Err(violations),
    }
}

fn nutrient(
    value: &Option<Value>,
    field: &str,
    label: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    match number(value) {
        Some(v) if (MIN_NUTRIENT..=MAX_NUTRIENT).contains(&v) => Some(v),
        _ => {
            violations.push(FieldViolation::new(
                field,
                format!(
                    "{} value must be between {} and {}",
                    label, MIN_NUTRIENT, MAX_NUTRIENT
                ),
            ));
            None
        }
    }
}

/// Accept JSON numbers and numeric strings; reject NaN and infinities
fn number(value: &Option<Value>) -> Option<f64> {
    let parsed = match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(n: Value, p: Value, k: Value, region: Value, area: Value) -> RawPredictionInput {
        RawPredictionInput {
            n_value: Some(n),
            p_value: Some(p),
            k_value: Some(k),
            region: Some(region),
            area: Some(area),
        }
    }

    fn fields(violations: &[FieldViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn test_valid_request_normalizes() {
        let raw = input(json!(80), json!(40), json!(60), json!("Bangalore"), json!(2.5));
        let request = validate(&raw).unwrap();
        assert_eq!(request.n_value, 80.0);
        assert_eq!(request.region, Region::Bangalore);
        assert_eq!(request.area, 2.5);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let raw = input(
            json!("80"),
            json!(" 40.5 "),
            json!("0"),
            json!("Hubli"),
            json!("1"),
        );
        let request = validate(&raw).unwrap();
        assert_eq!(request.p_value, 40.5);
        assert_eq!(request.k_value, 0.0);
    }

    #[test]
    fn test_every_region_and_bounds_are_valid() {
        for region in Region::ALL {
            for bound in [MIN_NUTRIENT, MAX_NUTRIENT] {
                let raw = input(
                    json!(bound),
                    json!(bound),
                    json!(bound),
                    json!(region.as_str()),
                    json!(0.01),
                );
                assert!(validate(&raw).is_ok(), "{} at {}", region, bound);
            }
        }
    }

    #[test]
    fn test_upper_bound_is_inclusive() {
        let ok = input(json!(500), json!(1), json!(1), json!("Mysore"), json!(1));
        assert!(validate(&ok).is_ok());

        let over = input(json!(500.01), json!(1), json!(1), json!("Mysore"), json!(1));
        let violations = validate(&over).unwrap_err();
        assert_eq!(fields(&violations), vec!["n_value"]);
    }

    #[test]
    fn test_out_of_range_values_name_their_fields() {
        let raw = input(json!(-1), json!(501), json!(1000), json!("Belgaum"), json!(0));
        let violations = validate(&raw).unwrap_err();
        assert_eq!(
            fields(&violations),
            vec!["n_value", "p_value", "k_value", "area"]
        );
    }

    #[test]
    fn test_unknown_region_rejected() {
        let raw = input(json!(80), json!(40), json!(60), json!("Delhi"), json!(2.5));
        let violations = validate(&raw).unwrap_err();
        assert_eq!(fields(&violations), vec!["region"]);
        assert!(violations[0].message.contains("Bangalore"));
    }

    #[test]
    fn test_missing_and_non_numeric_fields() {
        let raw = RawPredictionInput {
            n_value: Some(json!("lots")),
            p_value: Some(json!(true)),
            k_value: None,
            region: Some(json!(7)),
            area: Some(json!(null)),
        };
        let violations = validate(&raw).unwrap_err();
        assert_eq!(violations.len(), 5);
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        let raw = input(json!("NaN"), json!("inf"), json!(1), json!("Gulbarga"), json!("-inf"));
        let violations = validate(&raw).unwrap_err();
        assert_eq!(fields(&violations), vec!["n_value", "p_value", "area"]);
    }
}
