// Markdown rendering of query results
//
// Rowsets (arrays of objects) and single objects become tables; anything
// else is passed through or pretty-printed. Truncation is off unless asked for.

use serde_json::{Map, Value};

use crate::config::RenderConfig;
use crate::models::{QueryAttempt, StatementResult};

/// Column limit used when column truncation is enabled
pub const MAX_COLUMNS: usize = 10;
/// Cell length limit used when cell truncation is enabled
pub const MAX_CELL_LENGTH: usize = 30;

const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_columns: Option<usize>,
    pub max_cell_length: Option<usize>,
}

impl RenderOptions {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            max_columns: config.truncate_columns.then_some(MAX_COLUMNS),
            max_cell_length: config.truncate_cells.then_some(MAX_CELL_LENGTH),
        }
    }
}

pub struct ResultRenderer;

impl ResultRenderer {
    pub fn render(value: &Value, options: RenderOptions) -> String {
        match value {
            Value::Array(rows) => match rows.first() {
                Some(Value::Object(first)) => Self::render_rows(first, rows, options),
                _ => Self::render_plain(value),
            },
            Value::Object(object) => {
                Self::render_rows(object, std::slice::from_ref(value), options)
            }
            _ => Self::render_plain(value),
        }
    }

    fn render_rows(first: &Map<String, Value>, rows: &[Value], options: RenderOptions) -> String {
        let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
        let truncated = match options.max_columns {
            Some(limit) if keys.len() > limit => {
                keys.truncate(limit);
                true
            }
            _ => false,
        };

        let mut lines = Vec::with_capacity(rows.len() + 2);

        let mut header: Vec<&str> = keys.clone();
        let mut separator: Vec<&str> = keys.iter().map(|_| "---").collect();
        if truncated {
            header.push(TRUNCATION_MARKER);
            separator.push("---");
        }
        lines.push(Self::table_line(&header));
        lines.push(Self::table_line(&separator));

        for row in rows {
            let mut cells: Vec<String> = keys
                .iter()
                .map(|key| Self::cell(row.get(*key), options.max_cell_length))
                .collect();
            if truncated {
                cells.push(TRUNCATION_MARKER.to_string());
            }
            lines.push(Self::table_line(&cells));
        }

        lines.join("\n")
    }

    fn table_line<S: AsRef<str>>(cells: &[S]) -> String {
        let joined = cells.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" | ");
        format!("| {} |", joined)
    }

    fn cell(value: Option<&Value>, max_len: Option<usize>) -> String {
        let text = match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        match max_len {
            Some(limit) if text.chars().count() > limit => {
                let mut cut: String = text.chars().take(limit).collect();
                cut.push_str(TRUNCATION_MARKER);
                cut
            }
            _ => text,
        }
    }

    /// Chunk text for one executed query attempt: the generated text, then
    /// every statement with its rendered result.
    pub fn render_attempt(
        attempt: &QueryAttempt,
        results: &[StatementResult],
        options: RenderOptions,
    ) -> String {
        let mut out = format!("Generated SQL:\n```sql\n{}\n```\n\n", attempt.generated_text());
        for (i, result) in results.iter().enumerate() {
            out.push_str(&format!(
                "Statement {}:\n```sql\n{}\n```\nResult:\n{}\n\n",
                i + 1,
                result.statement,
                Self::render(&result.display_value(), options)
            ));
        }
        out
    }

    fn render_plain(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}
