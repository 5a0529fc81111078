//! Evaluation questions.

use super::EvalError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// e.g. `q_001`
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    /// `simple`, `multi_step`, `contextual` or `ambiguous`.
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub expected_tools: Vec<String>,
    #[serde(default)]
    pub requires_auth: bool,
}

/// Load a JSON array of questions.
pub fn load_questions(path: &Path) -> Result<Vec<Question>, EvalError> {
    let raw = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| EvalError::json(path, e))
}

/// Which questions to run. All criteria combine.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub question_id: Option<String>,
    pub category: Option<String>,
    pub complexity: Option<String>,
    /// Drop questions that need a logged-in user.
    pub skip_auth: bool,
    /// Keep only the first N after filtering.
    pub limit: Option<usize>,
}

impl QuestionFilter {
    pub fn matches(&self, q: &Question) -> bool {
        if self.question_id.as_ref().is_some_and(|id| *id != q.id) {
            return false;
        }
        if self.category.is_some() && self.category != q.category {
            return false;
        }
        if self.complexity.is_some() && self.complexity != q.complexity {
            return false;
        }
        !(self.skip_auth && q.requires_auth)
    }

    pub fn apply(&self, questions: Vec<Question>) -> Vec<Question> {
        questions
            .into_iter()
            .filter(|q| self.matches(q))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn questions() -> Vec<Question> {
        serde_json::from_value(json!([
            { "id": "q_001", "question": "Quants crèdits té IA?", "category": "courses",
              "complexity": "simple", "expected_tools": ["get_course_details"] },
            { "id": "q_002", "question": "Quan és l'examen final de PROP?", "category": "exams",
              "complexity": "simple", "expected_tools": ["search_exams"] },
            { "id": "q_003", "question": "Quin horari tinc dilluns?", "category": "schedule",
              "complexity": "contextual", "expected_tools": ["get_my_schedule"],
              "requires_auth": true },
            { "id": "q_004", "question": "Qui fa classe d'IA?", "category": "courses",
              "complexity": "multi_step" }
        ]))
        .unwrap()
    }

    #[test]
    fn filters_combine_and_limit_applies_last() {
        let filter = QuestionFilter {
            category: Some("courses".into()),
            ..Default::default()
        };
        let ids: Vec<_> = filter.apply(questions()).into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["q_001", "q_004"]);

        let filter = QuestionFilter {
            skip_auth: true,
            limit: Some(3),
            ..Default::default()
        };
        let ids: Vec<_> = filter.apply(questions()).into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["q_001", "q_002", "q_004"]);

        let filter = QuestionFilter {
            question_id: Some("q_003".into()),
            complexity: Some("simple".into()),
            ..Default::default()
        };
        assert!(filter.apply(questions()).is_empty());
    }

    #[test]
    fn loads_from_file_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, r#"[{"id": "q_9", "question": "Hola?"}]"#).unwrap();
        let loaded = load_questions(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].expected_tools.is_empty());
        assert!(!loaded[0].requires_auth);

        assert!(matches!(
            load_questions(&dir.path().join("missing.json")),
            Err(EvalError::Io { .. })
        ));
    }
}
