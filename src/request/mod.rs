//! Request types shared by the HTTP layer, the CLI and the worker protocol

mod validator;

pub use validator::{validate, FieldViolation};

use serde::{Deserialize, Serialize};

/// Request body as received, before any normalization.
///
/// Values are kept as raw JSON so that numeric strings (`"80"`) are accepted
/// and so that every malformed field can be reported in one pass.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPredictionInput {
    #[serde(default)]
    pub n_value: Option<serde_json::Value>,
    #[serde(default)]
    pub p_value: Option<serde_json::Value>,
    #[serde(default)]
    pub k_value: Option<serde_json::Value>,
    #[serde(default)]
    pub region: Option<serde_json::Value>,
    #[serde(default)]
    pub area: Option<serde_json::Value>,
}

/// A validated, normalized prediction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub n_value: f64,
    pub p_value: f64,
    pub k_value: f64,
    pub region: Region,
    pub area: f64,
}

impl PredictionRequest {
    /// The five stdin lines the worker expects, in protocol order: N, P, K, region, area
    pub fn protocol_lines(&self) -> [String; 5] {
        [
            self.n_value.to_string(),
            self.p_value.to_string(),
            self.k_value.to_string(),
            self.region.as_str().to_string(),
            self.area.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Bangalore,
    Mysore,
    Hubli,
    Belgaum,
    Gulbarga,
    Mangalore,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Bangalore,
        Region::Mysore,
        Region::Hubli,
        Region::Belgaum,
        Region::Gulbarga,
        Region::Mangalore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Bangalore => "Bangalore",
            Region::Mysore => "Mysore",
            Region::Hubli => "Hubli",
            Region::Belgaum => "Belgaum",
            Region::Gulbarga => "Gulbarga",
            Region::Mangalore => "Mangalore",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown region: {}", s))
    }
}

/// Selects which worker variant handles the request. Never sent to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Kharif,
    Rabi,
}

impl Season {
    pub const ALL: [Season; 2] = [Season::Kharif, Season::Rabi];
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Season::Kharif => write!(f, "kharif"),
            Season::Rabi => write!(f, "rabi"),
        }
    }
}

impl std::str::FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kharif" => Ok(Season::Kharif),
            "rabi" => Ok(Season::Rabi),
            _ => Err(format!("Unknown season: {}", s)),
        }
    }
}
