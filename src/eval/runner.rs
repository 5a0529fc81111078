//! Sequential, checkpointed evaluation runs.

use super::dataset::Question;
use super::record::{InferenceResult, RunReport, TrajectoryStep};
use super::EvalError;
use crate::agent::FibAgent;
use crate::provider::{generate_with_retry, GenerateRequest, ModelBackend, ModelSpec};
use crate::retry::RetryConfig;
use crate::tools::common::truncate_chars;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant for students of the Facultat \
d'Informàtica de Barcelona (FIB, UPC). \
Answer questions about courses, exams, professors, classrooms, academic terms and news. \
Reply in the language of the question and say so when you do not know.";

/// The agent under evaluation.
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Recorded in every result.
    fn model(&self) -> &ModelSpec;

    /// Answer one question, returning the full conversation.
    async fn answer(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<Vec<TrajectoryStep>, EvalError>;
}

/// Answers with the two-level [`FibAgent`], recording every tool step of the
/// root conversation.
pub struct AgentAnswerer {
    agent: FibAgent,
    model: ModelSpec,
}

impl AgentAnswerer {
    pub fn new(agent: FibAgent, model: ModelSpec) -> Self {
        Self { agent, model }
    }
}

#[async_trait]
impl Answerer for AgentAnswerer {
    fn model(&self) -> &ModelSpec {
        &self.model
    }

    async fn answer(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<Vec<TrajectoryStep>, EvalError> {
        let messages = self.agent.run(&question.question, &cancel).await?;
        Ok(messages.iter().map(TrajectoryStep::from).collect())
    }
}

/// Answers straight from a model backend, without tools.
pub struct BackendAnswerer {
    backend: Arc<dyn ModelBackend>,
    model: ModelSpec,
    system_prompt: String,
    retry: RetryConfig,
}

impl BackendAnswerer {
    pub fn new(backend: Arc<dyn ModelBackend>, model: ModelSpec) -> Self {
        Self {
            backend,
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Answerer for BackendAnswerer {
    fn model(&self) -> &ModelSpec {
        &self.model
    }

    async fn answer(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<Vec<TrajectoryStep>, EvalError> {
        let request =
            GenerateRequest::prompt(&question.question).with_system_prompt(&self.system_prompt);
        let reply =
            generate_with_retry(self.backend.as_ref(), request, &self.retry, &cancel).await?;
        Ok(vec![
            TrajectoryStep::human(&question.question),
            TrajectoryStep::ai(reply.content),
        ])
    }
}

/// Writes the run report after every question.
#[derive(Debug, Clone)]
pub struct CheckpointSink {
    path: PathBuf,
    pretty: bool,
}

impl CheckpointSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn write(&self, report: &RunReport) -> Result<(), EvalError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| EvalError::io(dir, e))?;
        }
        let json = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        }
        .map_err(|e| EvalError::json(&self.path, e))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| EvalError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| EvalError::io(&self.path, e))
    }

    /// The report at `path`, if the file exists.
    pub fn load(path: &Path) -> Result<Option<RunReport>, EvalError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EvalError::io(path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| EvalError::json(path, e))
    }
}

pub struct EvalRunner {
    answerer: Arc<dyn Answerer>,
    sink: Option<CheckpointSink>,
    run_timestamp: NaiveDateTime,
}

impl EvalRunner {
    pub fn new(answerer: Arc<dyn Answerer>) -> Self {
        Self {
            answerer,
            sink: None,
            run_timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn with_checkpoint(mut self, sink: CheckpointSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_timestamp(mut self, run_timestamp: NaiveDateTime) -> Self {
        self.run_timestamp = run_timestamp;
        self
    }

    pub fn run_timestamp(&self) -> NaiveDateTime {
        self.run_timestamp
    }

    /// Answer every question not already in `previous`, in order.
    ///
    /// Answer failures are recorded in the result, not returned. Cancellation
    /// stops the run after the last completed question; the report so far is
    /// returned and already checkpointed.
    pub async fn run(
        &self,
        questions: &[Question],
        previous: Vec<InferenceResult>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EvalError> {
        if questions.is_empty() {
            return Err(EvalError::NoQuestions);
        }

        let model = self.answerer.model().clone();
        let total = questions.len();
        let done: HashSet<String> = previous.iter().map(|r| r.question_id.clone()).collect();
        let remaining: Vec<&Question> = questions
            .iter()
            .filter(|q| !done.contains(&q.id))
            .collect();
        info!("Running {} remaining questions out of {} total", remaining.len(), total);

        let mut results = previous;
        for (i, question) in remaining.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            info!(
                "[{}/{}] Running: {} - {}",
                done.len() + i + 1,
                total,
                question.id,
                truncate_chars(&question.question, 50)
            );

            let result = match self.answerer.answer(question, cancel.clone()).await {
                Ok(trajectory) => InferenceResult::success(question, &model, trajectory),
                Err(_) if cancel.is_cancelled() => break,
                Err(e) => {
                    warn!("{} failed: {}", question.id, e);
                    InferenceResult::failure(question, &model, e)
                }
            };
            results.push(result);

            if let Some(sink) = &self.sink {
                let report =
                    RunReport::new(self.run_timestamp, model.clone(), total, results.clone());
                sink.write(&report)?;
            }
        }

        if cancel.is_cancelled() {
            warn!("Evaluation cancelled after {} of {} questions", results.len(), total);
        }
        Ok(RunReport::new(self.run_timestamp, model, total, results))
    }
}
