//! Batch evaluation: replay a question set against an [`Answerer`] and
//! record one [`InferenceResult`] per question in a checkpointed
//! [`RunReport`].

pub mod dataset;
pub mod record;
pub mod runner;

pub use dataset::{load_questions, Question, QuestionFilter};
pub use record::{
    final_response, output_filename, render_for_judge, InferenceResult, ResultMetadata, RunReport,
    ToolCallRecord, TrajectoryStep,
};
pub use runner::{
    AgentAnswerer, Answerer, BackendAnswerer, CheckpointSink, EvalRunner, DEFAULT_SYSTEM_PROMPT,
};

use crate::provider::ProviderError;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: invalid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("No questions match the specified filters")]
    NoQuestions,
}

impl EvalError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}
