//! Faculty directory tools.

use super::common::*;
use crate::api::FibClient;
use crate::models::Professor;
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfessorQuery {
    /// First or last name.
    pub name: Option<String>,
    pub course_code: Option<String>,
    /// Department code, e.g. CS.
    pub department: Option<String>,
}

impl ProfessorQuery {
    pub fn matches(&self, prof: &Professor) -> bool {
        if let Some(name) = &self.name {
            if !matches_query(&prof.nom, name) && !matches_query(&prof.cognoms, name) {
                return false;
            }
        }
        if let Some(code) = &self.course_code {
            if !prof.assignatures.iter().any(|c| matches_query(c, code)) {
                return false;
            }
        }
        if let Some(dept) = &self.department {
            if !eq_ignore_case(&prof.departament, dept) {
                return false;
            }
        }
        true
    }

    pub fn summary(&self, count: usize) -> String {
        let mut summary = format!("Found {} professor(s)", count);
        if let Some(name) = &self.name {
            summary.push_str(&format!(" matching '{}'", name));
        }
        if let Some(code) = &self.course_code {
            summary.push_str(&format!(" teaching {}", code));
        }
        summary
    }
}

pub fn search_professors(professors: &[Professor], query: &ProfessorQuery) -> Vec<Value> {
    professors
        .iter()
        .filter(|p| query.matches(p))
        .map(|p| {
            let specializations = (!p.especialitats.is_empty()).then_some(&p.especialitats);
            json!({
                "name": p.full_name(),
                "email": p.email(),
                "department": p.departament,
                "courses": p.assignatures,
                "specializations": specializations,
                "research_profile": non_empty(&p.futur_url),
                "teaching_profile": non_empty(&p.apren_url),
            })
        })
        .collect()
}

async fn run(
    tool: &str,
    client: &FibClient,
    query: ProfessorQuery,
    cancel: &CancellationToken,
) -> Result<ToolResult, ToolError> {
    let professors = match client.professors(cancel).await {
        Ok(professors) => professors,
        Err(e) => return api_error(tool, e),
    };
    let results = search_professors(&professors, &query);
    let summary = query.summary(results.len());
    Ok(format_tool_response(results, summary))
}

/// Search professors by name, course or department.
pub struct SearchProfessorsTool {
    client: FibClient,
}

impl SearchProfessorsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for SearchProfessorsTool {
    fn name(&self) -> &str {
        "search_professors"
    }

    fn label(&self) -> &str {
        "Search Professors"
    }

    fn description(&self) -> &str {
        "Search the FIB faculty directory by first or last name, course code taught, or department \
        code (e.g. AC, CS, ESSI). Returns name, email, department and courses."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "First or last name" },
                "course_code": { "type": "string", "description": "Course the professor teaches" },
                "department": { "type": "string", "description": "Department code" }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query: ProfessorQuery = parse_args(params)?;
        run(self.name(), &self.client, query, &cancel).await
    }
}

#[derive(Debug, Deserialize)]
struct CourseProfessorsArgs {
    course_code: String,
}

/// Professors teaching one course.
pub struct CourseProfessorsTool {
    client: FibClient,
}

impl CourseProfessorsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for CourseProfessorsTool {
    fn name(&self) -> &str {
        "get_course_professors"
    }

    fn label(&self) -> &str {
        "Course Professors"
    }

    fn description(&self) -> &str {
        "List the professors teaching a specific FIB course."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_code": { "type": "string", "description": "Course code, e.g. IA" }
            },
            "required": ["course_code"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let args: CourseProfessorsArgs = parse_args(params)?;
        let query = ProfessorQuery {
            course_code: Some(args.course_code),
            ..Default::default()
        };
        run(self.name(), &self.client, query, &cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn professor(nom: &str, cognoms: &str, dept: &str, courses: &[&str]) -> Professor {
        Professor {
            id: 1,
            assignatures: courses.iter().map(|c| c.to_string()).collect(),
            plans_estudi: vec![],
            especialitats: vec![],
            obfuscated_email: format!("{}(at)upc.edu", nom.to_lowercase()),
            nom: nom.into(),
            cognoms: cognoms.into(),
            departament: dept.into(),
            futur_url: String::new(),
            apren_url: "https://example.edu/apren".into(),
        }
    }

    #[test]
    fn filters_combine() {
        let profs = vec![
            professor("Anna", "Puig", "CS", &["IA", "APA"]),
            professor("Joan", "Vila", "AC", &["AC2"]),
            professor("Marta", "Anglada", "CS", &["BD"]),
        ];

        let by_name = ProfessorQuery {
            name: Some("ang".into()),
            ..Default::default()
        };
        let results = search_professors(&profs, &by_name);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "Marta Anglada");
        assert_eq!(results[0]["email"], "marta@upc.edu");
        assert!(results[0]["research_profile"].is_null());

        let by_course = ProfessorQuery {
            course_code: Some("ia".into()),
            department: Some("cs".into()),
            ..Default::default()
        };
        assert_eq!(search_professors(&profs, &by_course).len(), 1);
        assert_eq!(by_course.summary(1), "Found 1 professor(s) teaching ia");
    }
}
