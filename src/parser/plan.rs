use serde::Serialize;

/// One candidate crop-rotation plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDocument {
    pub plan_number: u32,
    pub start_crop: String,
    /// Never empty; ordered by ascending year
    pub entries: Vec<YearEntry>,
}

/// One year of a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearEntry {
    pub year: u32,
    pub crop: String,
    pub npk_before: [f64; 3],
    pub fertilizer_added: [f64; 3],
    pub predicted_yield: f64,
    pub area_ha: f64,
    pub revenue: f64,
}

impl PlanDocument {
    pub fn total_revenue(&self) -> f64 {
        self.entries.iter().map(|e| e.revenue).sum()
    }
}
