// Generate -> execute -> validate, with bounded regeneration and revalidation
//
// The run is an explicit state machine. Every external call happens inside
// `step`, and every decision about what comes next after a verdict is made
// by the pure `decide` function, so the loop bounds can be checked without
// any I/O.

use regex::Regex;

use crate::api::middleware::AppError;
use crate::config::PipelineConfig;
use crate::models::{
    PipelineOutcome, QueryAttempt, Question, RunStatus, SchemaSnapshot, StatementResult,
    StreamEvent, ValidationVerdict,
};
use crate::services::database::DataBackend;
use crate::services::llm_service::CompletionClient;
use crate::services::query_executor::QueryExecutor;
use crate::services::query_generator::{Correction, QueryGenerator};
use crate::services::result_renderer::{RenderOptions, ResultRenderer};
use crate::services::stream_emitter::EventSink;
use crate::services::summary_validator::SummaryValidator;

pub const SUMMARY_LABEL: &str = "AI summary: ";
const EMPTY_SUMMARY: &str = "none";
/// One generated query plus at most one regenerated replacement
pub const MAX_QUERY_ATTEMPTS: usize = 2;

/// Loop bounds and the "verdict blames the query" heuristic.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_query_attempts: usize,
    pub max_validate_attempts: usize,
    pub sql_error_pattern: Regex,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AppError> {
        let sql_error_pattern = Regex::new(&config.sql_error_pattern).map_err(|e| {
            AppError::Validation(format!("Invalid SQL error pattern: {}", e))
        })?;
        Ok(Self {
            max_query_attempts: config.max_query_attempts.clamp(1, MAX_QUERY_ATTEMPTS),
            max_validate_attempts: config.max_validate_attempts.max(1),
            sql_error_pattern,
        })
    }

    pub fn is_sql_error(&self, message: &str) -> bool {
        self.sql_error_pattern.is_match(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    GenerateQuery {
        iteration: usize,
    },
    Execute {
        iteration: usize,
        generated: String,
    },
    Validate {
        iteration: usize,
        attempt: usize,
        feedback: Option<String>,
    },
    Success,
    Exhausted,
    Faulted {
        reason: String,
    },
}

/// What to do after an invalid-or-valid verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accept,
    /// The heuristic saw a broken query; regenerate without spending the
    /// rest of the inner budget.
    ShortCircuit,
    Revalidate,
    NextQuery,
    GiveUp,
}

/// Mutable bookkeeping of one run; dropped once the outcome is built.
#[derive(Default)]
struct PipelineRun {
    attempts: Vec<QueryAttempt>,
    results: Vec<StatementResult>,
    rendered: String,
    verdicts: Vec<ValidationVerdict>,
    heuristic_fired: bool,
}

impl PipelineRun {
    fn last_message(&self) -> Option<&str> {
        self.verdicts.last().map(|v| v.message.as_str())
    }
}

pub struct RetryController<'a> {
    backend: &'a dyn DataBackend,
    llm: &'a dyn CompletionClient,
    policy: &'a RetryPolicy,
    render: RenderOptions,
}

impl<'a> RetryController<'a> {
    pub fn new(
        backend: &'a dyn DataBackend,
        llm: &'a dyn CompletionClient,
        policy: &'a RetryPolicy,
        render: RenderOptions,
    ) -> Self {
        Self {
            backend,
            llm,
            policy,
            render,
        }
    }

    /// Drive one question to a terminal state.
    ///
    /// Emits one chunk per executed attempt and a final summary chunk. Never
    /// fails: faults end up in the delivered text.
    pub async fn run(
        &self,
        question: &Question,
        schema: &SchemaSnapshot,
        sink: &mut dyn EventSink,
    ) -> PipelineOutcome {
        let mut run = PipelineRun::default();
        let mut state = State::GenerateQuery { iteration: 0 };

        while !Self::is_terminal(&state) {
            state = self.step(state, &mut run, question, schema, sink).await;
        }

        let (status, summary) = match state {
            State::Success => (RunStatus::Validated, Self::summary_text(&run)),
            State::Faulted { reason } => (RunStatus::Faulted, format!("AI call failed: {}", reason)),
            _ => (RunStatus::Exhausted, Self::summary_text(&run)),
        };

        let final_chunk = match status {
            RunStatus::Faulted => summary.clone(),
            _ => format!("{}{}", SUMMARY_LABEL, summary),
        };
        sink.emit(StreamEvent::chunk(final_chunk));

        tracing::info!(
            "Pipeline finished: {:?} after {} queries and {} validations",
            status,
            run.attempts.len(),
            run.verdicts.len()
        );

        PipelineOutcome {
            status,
            validations: run.verdicts.len(),
            attempts: run.attempts,
            rendered: run.rendered,
            summary,
        }
    }

    fn is_terminal(state: &State) -> bool {
        matches!(state, State::Success | State::Exhausted | State::Faulted { .. })
    }

    async fn step(
        &self,
        state: State,
        run: &mut PipelineRun,
        question: &Question,
        schema: &SchemaSnapshot,
        sink: &mut dyn EventSink,
    ) -> State {
        match state {
            State::GenerateQuery { iteration } => {
                tracing::info!("Generating query, iteration {}", iteration + 1);
                let generator = QueryGenerator::new(self.llm, self.backend.database_type());

                let previous_query = run.attempts.last().map(QueryAttempt::generated_text);
                let correction = match (previous_query, run.last_message()) {
                    (Some(previous_query), Some(feedback)) => Some(Correction {
                        previous_query,
                        feedback,
                    }),
                    _ => None,
                };

                match generator.generate(question, schema, correction).await {
                    Ok(generated) => State::Execute {
                        iteration,
                        generated,
                    },
                    Err(e) => State::Faulted {
                        reason: e.reason().to_string(),
                    },
                }
            }

            State::Execute {
                iteration,
                generated,
            } => {
                let attempt = QueryAttempt::new(generated);
                tracing::info!("Executing {} statements", attempt.statements().len());

                let results = QueryExecutor::new(self.backend).execute_all(&attempt).await;
                run.rendered = ResultRenderer::render_attempt(&attempt, &results, self.render);
                sink.emit(StreamEvent::chunk(run.rendered.clone()));

                run.results = results;
                run.attempts.push(attempt);

                State::Validate {
                    iteration,
                    attempt: 0,
                    feedback: None,
                }
            }

            State::Validate {
                iteration,
                attempt,
                feedback,
            } => {
                let validator = SummaryValidator::new(self.llm);
                let verdict = match validator
                    .validate(question, &run.results, feedback.as_deref())
                    .await
                {
                    Ok(verdict) => verdict.into_validation(),
                    Err(e) => {
                        return State::Faulted {
                            reason: e.reason().to_string(),
                        }
                    }
                };
                tracing::info!(
                    "Validation {} of iteration {}: valid = {}",
                    attempt + 1,
                    iteration + 1,
                    verdict.is_valid
                );

                let decision = self.decide(iteration, attempt, &verdict, run.heuristic_fired);
                let message = verdict.message.clone();
                run.verdicts.push(verdict);

                match decision {
                    Decision::Accept => State::Success,
                    Decision::ShortCircuit => {
                        tracing::info!("Verdict points at a broken query, regenerating");
                        run.heuristic_fired = true;
                        State::GenerateQuery {
                            iteration: iteration + 1,
                        }
                    }
                    Decision::Revalidate => State::Validate {
                        iteration,
                        attempt: attempt + 1,
                        feedback: Some(message),
                    },
                    Decision::NextQuery => State::GenerateQuery {
                        iteration: iteration + 1,
                    },
                    Decision::GiveUp => State::Exhausted,
                }
            }

            terminal => terminal,
        }
    }

    fn decide(
        &self,
        iteration: usize,
        attempt: usize,
        verdict: &ValidationVerdict,
        heuristic_fired: bool,
    ) -> Decision {
        let outer_left = iteration + 1 < self.policy.max_query_attempts;

        if verdict.is_valid {
            Decision::Accept
        } else if !heuristic_fired && outer_left && self.policy.is_sql_error(&verdict.message) {
            Decision::ShortCircuit
        } else if attempt + 1 < self.policy.max_validate_attempts {
            Decision::Revalidate
        } else if outer_left {
            Decision::NextQuery
        } else {
            Decision::GiveUp
        }
    }

    fn summary_text(run: &PipelineRun) -> String {
        match run.last_message().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => EMPTY_SUMMARY.to_string(),
        }
    }
}
