use serde_json::{Map, Value};

use crate::api::middleware::AppError;
use crate::models::{TriageForm, TriageResult};
use crate::services::llm_service::CompletionClient;
use crate::services::probability::normalize_distribution;
use crate::services::response_parser::parse_json_object;

const MAX_DEPARTMENTS: usize = 3;
const DEFAULT_MSG: &str = "AI triage suggestion";

const TRIAGE_FORMAT: &str = r#"Reply strictly with JSON in the following format and nothing else:
{
  "criticalI": 0.X,
  "criticalII": 0.X,
  "nonCritical": 0.X,
  "departments": {
    "department 1": 0.X,
    "department 2": 0.X,
    "department 3": 0.X
  },
  "msg": "short explanation of the triage level"
}

Requirements:
1. criticalI, criticalII and nonCritical must add up to 1
2. the department probabilities must add up to 1
3. probabilities have one decimal place (such as 0.3, 0.5, 0.2)
4. recommend the 3 most suitable departments for the symptoms and vital signs
5. avoid flat distributions; the probabilities should clearly differ"#;

/// Emergency triage suggestion for a patient intake form.
pub struct TriageService<'a> {
    llm: &'a dyn CompletionClient,
}

impl<'a> TriageService<'a> {
    pub fn new(llm: &'a dyn CompletionClient) -> Self {
        Self { llm }
    }

    pub async fn assess(&self, form: &TriageForm) -> Result<TriageResult, AppError> {
        let prompt = format!(
            "Assess the following patient for emergency triage and suggest a triage level and departments:\n\n{}\n\n{}",
            describe_patient(form),
            TRIAGE_FORMAT
        );

        let response = self.llm.complete(&prompt).await?;
        let parsed = parse_json_object(&response)
            .ok_or_else(|| AppError::LlmService("AI response is not valid JSON".to_string()))?;

        normalize_result(&parsed)
    }
}

/// Natural-language summary of the fields present on the form.
pub fn describe_patient(form: &TriageForm) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut add = |label: &str, value: &Option<Value>, unit: &str| {
        if let Some(text) = present(value) {
            parts.push(format!("{} {}{}", label, text, unit));
        }
    };

    add("sex", &form.sex, "");
    add("age", &form.age, " years");
    add("arrival mode", &form.way, "");
    add("arrival time", &form.arrival, "");
    add("temperature", &form.temperature, " °C");
    add("heart rate", &form.hb, " bpm");
    add("respiratory rate", &form.bf, " /min");
    add("oxygen saturation", &form.o2, "%");
    add("blood sugar", &form.blood_sugar, " mmol/L");
    add("consciousness", &form.conscious, "");
    add("breathing", &form.breathe_desc, "");

    if let Some(score) = &form.score_info {
        add("pain score", &score.score_pain, "");
        add("MEWS score", &score.score_mews, "");
        add("GCS score", &score.score_gcs, "");
        add("ESI score", &score.score_esi, "");
        add("ISS score", &score.score_iss, "");
        add("Morse fall score", &score.score_morse, "");
    }

    add("chief complaint", &form.complaint, "");
    add("complaint ICD code", &form.complaint_icd, "");

    if let (Some(high), Some(low)) = (present(&form.bd_h), present(&form.bd_l)) {
        parts.push(format!("blood pressure {}/{} mmHg", high, low));
    }

    let flags = [
        ("multiple injuries", form.is_mult_injuries),
        ("first visit", form.is_first_cure),
        ("green channel", form.is_green_channel),
        ("pregnant", form.is_pregnant),
    ];
    for (label, flag) in flags {
        if let Some(flag) = flag {
            parts.push(format!("{} {}", label, if flag == 1 { "yes" } else { "no" }));
        }
    }

    format!("Patient: {}.", parts.join(", "))
}

/// Empty strings, zero and false read as "not filled in".
fn present(value: &Option<Value>) -> Option<String> {
    match value.as_ref()? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// Model output may carry probabilities as numbers or numeric strings.
fn weight(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn normalize_result(parsed: &Value) -> Result<TriageResult, AppError> {
    let levels = [
        weight(parsed.get("criticalI")),
        weight(parsed.get("criticalII")),
        weight(parsed.get("nonCritical")),
    ];
    let levels = normalize_distribution(&levels)
        .ok_or_else(|| AppError::LlmService("AI triage levels are all zero".to_string()))?;

    let mut departments = Map::new();
    if let Some(Value::Object(listed)) = parsed.get("departments") {
        let listed: Vec<(&String, f64)> = listed
            .iter()
            .take(MAX_DEPARTMENTS)
            .map(|(name, value)| (name, weight(Some(value))))
            .collect();
        if !listed.is_empty() {
            let weights: Vec<f64> = listed.iter().map(|(_, w)| *w).collect();
            let normalized = normalize_distribution(&weights).ok_or_else(|| {
                AppError::LlmService("AI department probabilities are all zero".to_string())
            })?;
            for ((name, _), p) in listed.into_iter().zip(normalized) {
                departments.insert(name.clone(), Value::from(p));
            }
        }
    }

    let msg = parsed
        .get("msg")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_MSG)
        .to_string();

    Ok(TriageResult {
        critical_i: levels[0],
        critical_ii: levels[1],
        non_critical: levels[2],
        departments,
        msg,
    })
}
