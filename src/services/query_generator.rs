use crate::api::middleware::AppError;
use crate::models::{Question, SchemaSnapshot};
use crate::services::database::DatabaseType;
use crate::services::llm_service::CompletionClient;
use crate::services::response_parser::strip_code_fence;

const QUERY_RULES: &str = "Return only the SQL, without comments or explanations. \
Do not reference tables or columns that are not listed above.";

/// What the previous outer iteration produced, fed back when regenerating.
#[derive(Debug, Clone, Copy)]
pub struct Correction<'a> {
    pub previous_query: &'a str,
    pub feedback: &'a str,
}

/// Turns a question and the schema into query text through the completion
/// client.
pub struct QueryGenerator<'a> {
    llm: &'a dyn CompletionClient,
    dialect: DatabaseType,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(llm: &'a dyn CompletionClient, dialect: DatabaseType) -> Self {
        Self { llm, dialect }
    }

    pub async fn generate(
        &self,
        question: &Question,
        schema: &SchemaSnapshot,
        correction: Option<Correction<'_>>,
    ) -> Result<String, AppError> {
        let prompt = self.build_prompt(question, schema, correction);
        let response = self.llm.complete(&prompt).await?;
        Ok(strip_code_fence(&response).to_string())
    }

    fn build_prompt(
        &self,
        question: &Question,
        schema: &SchemaSnapshot,
        correction: Option<Correction<'_>>,
    ) -> String {
        let dialect = self.dialect_name();
        let tables = schema.table_names().join(", ");
        let structure = schema.describe();

        match correction {
            None => format!(
                "Question: {question}\nTables: {tables}\nTable structures:\n{structure}\n\
                 Write a single {dialect} query that answers the question. {QUERY_RULES}"
            ),
            Some(Correction {
                previous_query,
                feedback,
            }) => format!(
                "Question: {question}\nTables: {tables}\nTable structures:\n{structure}\n\
                 Previous SQL: {previous_query}\nPrevious review: {feedback}\n\n\
                 Correct the {dialect} query so it avoids the problem above. {QUERY_RULES}"
            ),
        }
    }

    fn dialect_name(&self) -> &'static str {
        match self.dialect {
            DatabaseType::MySQL => "MySQL",
            DatabaseType::PostgreSQL => "PostgreSQL",
        }
    }
}
