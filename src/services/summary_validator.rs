use serde_json::Value;

use crate::api::middleware::AppError;
use crate::models::{Question, StatementResult, Verdict};
use crate::services::llm_service::CompletionClient;
use crate::services::response_parser::{parse_json_object, strip_code_fence};

const VERDICT_FORMAT: &str = r#"Based on the query results above, give a short conclusion or explanation and judge whether the result answers the question well.
Reply with JSON in this format:
{
  "message": "your summary, explanation or advice",
  "isValid": true/false
}
If the result is not satisfactory, set isValid to false and explain why."#;

/// Asks the completion client to summarise executed results and judge
/// whether they answer the question.
pub struct SummaryValidator<'a> {
    llm: &'a dyn CompletionClient,
}

impl<'a> SummaryValidator<'a> {
    pub fn new(llm: &'a dyn CompletionClient) -> Self {
        Self { llm }
    }

    pub async fn validate(
        &self,
        question: &Question,
        results: &[StatementResult],
        feedback: Option<&str>,
    ) -> Result<Verdict, AppError> {
        let prompt = Self::build_prompt(question, results, feedback);
        let response = self.llm.complete(&prompt).await?;
        Ok(parse_verdict(&response))
    }

    fn build_prompt(question: &Question, results: &[StatementResult], feedback: Option<&str>) -> String {
        let values: Vec<Value> = results.iter().map(StatementResult::display_value).collect();

        let mut prompt = format!(
            "Question: {}\nSQL: {}\nQuery results: {}\n",
            question,
            statement_summary(results),
            Value::Array(values)
        );
        if let Some(feedback) = feedback.filter(|f| !f.is_empty()) {
            prompt.push_str(&format!("\nPrevious summary: {}\n", feedback));
        }
        prompt.push('\n');
        prompt.push_str(VERDICT_FORMAT);
        prompt
    }
}

/// "SQL1: <statement>\nResult: <json>" for every statement, newline joined.
pub fn statement_summary(results: &[StatementResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("SQL{}: {}\nResult: {}", i + 1, r.statement, r.display_value()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Coerce raw model output into a verdict.
///
/// A JSON object (whole text, or embedded in prose) is structured; its
/// `isValid` counts only when it is a real boolean. Anything else keeps the
/// raw text as the message.
pub fn parse_verdict(text: &str) -> Verdict {
    match parse_json_object(text) {
        Some(object) => {
            let message = match object.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let is_valid = object.get("isValid").and_then(Value::as_bool).unwrap_or(false);
            Verdict::Structured { message, is_valid }
        }
        None => Verdict::Unstructured {
            raw_text: strip_code_fence(text).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::ScriptedCompletion;
    use serde_json::json;

    #[test]
    fn test_parse_verdict_strict() {
        let verdict = parse_verdict(r#"{"message": "12 customers", "isValid": true}"#);
        assert_eq!(
            verdict,
            Verdict::Structured {
                message: "12 customers".to_string(),
                is_valid: true
            }
        );
    }

    #[test]
    fn test_parse_verdict_embedded() {
        let text = "Sure!\n```json\n{\"message\": \"empty result\", \"isValid\": false}\n```";
        let verdict = parse_verdict(text).into_validation();
        assert_eq!(verdict.message, "empty result");
        assert!(!verdict.is_valid);
    }

    #[test]
    fn test_parse_verdict_non_bool_is_invalid() {
        let verdict = parse_verdict(r#"{"message": "ok", "isValid": "true"}"#).into_validation();
        assert!(!verdict.is_valid);
        let verdict = parse_verdict(r#"{"message": "ok"}"#).into_validation();
        assert!(!verdict.is_valid);
    }

    #[test]
    fn test_parse_verdict_free_text() {
        let verdict = parse_verdict("The numbers look plausible.");
        assert_eq!(
            verdict,
            Verdict::Unstructured {
                raw_text: "The numbers look plausible.".to_string()
            }
        );
    }

    #[test]
    fn test_statement_summary() {
        let results = vec![
            StatementResult::success("SELECT 1", json!([{"1": 1}])),
            StatementResult::failure("SELECT x", "boom"),
        ];
        assert_eq!(
            statement_summary(&results),
            "SQL1: SELECT 1\nResult: [{\"1\":1}]\nSQL2: SELECT x\nResult: \"SQL execution failed: boom\""
        );
    }

    #[tokio::test]
    async fn test_prompt_includes_feedback_only_when_present() {
        let llm = ScriptedCompletion::new()
            .reply(r#"{"message": "a", "isValid": false}"#)
            .reply(r#"{"message": "b", "isValid": true}"#);
        let validator = SummaryValidator::new(&llm);
        let question = Question::new("how many?").unwrap();
        let results = vec![StatementResult::success("SELECT 1", json!([]))];

        validator.validate(&question, &results, None).await.unwrap();
        validator
            .validate(&question, &results, Some("a"))
            .await
            .unwrap();

        let prompts = llm.prompts();
        assert!(prompts[0].starts_with("Question: how many?\nSQL: SQL1: SELECT 1"));
        assert!(!prompts[0].contains("Previous summary"));
        assert!(prompts[1].contains("\nPrevious summary: a\n"));
        assert!(prompts[1].contains("\"isValid\": true/false"));
    }
}
