use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    pub data: Option<TriageForm>,
}

/// Patient intake form. Fields arrive as numbers or strings depending on the
/// client, so they are kept as raw JSON values.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageForm {
    pub sex: Option<Value>,
    pub age: Option<Value>,
    pub way: Option<Value>,
    pub arrival: Option<Value>,
    pub is_mult_injuries: Option<i64>,
    pub is_first_cure: Option<i64>,
    #[serde(rename = "isGreenChanel")]
    pub is_green_channel: Option<i64>,
    #[serde(rename = "IsPregnant", alias = "isPregnant")]
    pub is_pregnant: Option<i64>,
    pub temperature: Option<Value>,
    /// Heart rate
    pub hb: Option<Value>,
    /// Breathing rate
    pub bf: Option<Value>,
    pub o2: Option<Value>,
    pub bd_h: Option<Value>,
    pub bd_l: Option<Value>,
    pub blood_sugar: Option<Value>,
    pub conscious: Option<Value>,
    pub breathe_desc: Option<Value>,
    #[serde(rename = "scorelnfo", alias = "scoreInfo")]
    pub score_info: Option<ScoreInfo>,
    pub complaint: Option<Value>,
    #[serde(rename = "complaintICD")]
    pub complaint_icd: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInfo {
    pub score_pain: Option<Value>,
    pub score_mews: Option<Value>,
    pub score_gcs: Option<Value>,
    pub score_esi: Option<Value>,
    pub score_iss: Option<Value>,
    pub score_morse: Option<Value>,
}

/// Normalised triage suggestion returned to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TriageResult {
    #[serde(rename = "criticalI")]
    pub critical_i: f64,
    #[serde(rename = "criticalII")]
    pub critical_ii: f64,
    #[serde(rename = "nonCritical")]
    pub non_critical: f64,
    /// Department name to probability, in the order the model listed them.
    pub departments: Map<String, Value>,
    pub msg: String,
}
