//! Course catalog tools.

use super::common::*;
use crate::api::FibClient;
use crate::models::Course;
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CourseQuery {
    /// Matched against course code and name.
    pub query: Option<String>,
    /// Q1 or Q2.
    pub semester: Option<String>,
    pub study_plan: Option<String>,
    /// OBL, OPT or PE.
    pub course_type: Option<String>,
    pub credits_min: Option<f64>,
    pub credits_max: Option<f64>,
    pub active_only: bool,
}

impl Default for CourseQuery {
    fn default() -> Self {
        Self {
            query: None,
            semester: None,
            study_plan: None,
            course_type: None,
            credits_min: None,
            credits_max: None,
            active_only: true,
        }
    }
}

impl CourseQuery {
    pub fn matches(&self, course: &Course) -> bool {
        if self.active_only && !course.is_active() {
            return false;
        }
        if let Some(q) = &self.query {
            if !matches_query(&course.id, q) && !matches_query(&course.nom, q) {
                return false;
            }
        }
        if let Some(semester) = &self.semester {
            if !course.quadrimestres.iter().any(|s| eq_ignore_case(s, semester)) {
                return false;
            }
        }
        if let Some(plan) = &self.study_plan {
            if !course.plans.iter().any(|p| eq_ignore_case(p, plan)) {
                return false;
            }
        }
        if let Some(kind) = &self.course_type {
            // With a study plan, the requirement type must hold in that plan.
            let plan = self.study_plan.as_deref();
            let typed = course.obligatorietats.iter().any(|req| {
                eq_ignore_case(&req.codi_oblig, kind)
                    && plan.map_or(true, |p| eq_ignore_case(&req.pla, p))
            });
            if !typed {
                return false;
            }
        }
        if self.credits_min.is_some_and(|min| course.credits < min) {
            return false;
        }
        if self.credits_max.is_some_and(|max| course.credits > max) {
            return false;
        }
        true
    }

    pub fn summary(&self, count: usize) -> String {
        let mut summary = format!("Found {} course(s)", count);
        if let Some(q) = &self.query {
            summary.push_str(&format!(" matching '{}'", q));
        }
        if let Some(kind) = &self.course_type {
            summary.push_str(&format!(" of type {}", kind));
        }
        summary
    }
}

pub fn search_courses(courses: &[Course], query: &CourseQuery) -> Vec<Value> {
    courses
        .iter()
        .filter(|c| query.matches(c))
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.nom,
                "credits": c.credits,
                "semester": c.semestre,
                "semesters_offered": c.quadrimestres,
                "study_plans": c.plans,
                "syllabus_url": c.guia_docent_url_publica,
            })
        })
        .collect()
}

pub fn course_details(course: &Course) -> Value {
    json!({
        "id": course.id,
        "name": course.nom,
        "credits": course.credits,
        "semester": course.semestre,
        "semesters_offered": course.quadrimestres,
        "study_plans": course.plans,
        "upc_code": course.codi_upc,
        "active": course.is_active(),
        "languages": course.lang,
        "syllabus_url": course.guia_docent_url_publica,
        "requirements": course.obligatorietats.iter().map(|req| json!({
            "type": req.codi_oblig,
            "plan": req.pla,
            "specialization": non_empty(&req.nom_especialitat),
        })).collect::<Vec<_>>(),
    })
}

/// Search the course catalog with filters.
pub struct SearchCoursesTool {
    client: FibClient,
}

impl SearchCoursesTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for SearchCoursesTool {
    fn name(&self) -> &str {
        "search_courses"
    }

    fn label(&self) -> &str {
        "Search Courses"
    }

    fn description(&self) -> &str {
        "Search the FIB course catalog by code or name, semester (Q1/Q2), study plan, course type \
        (OBL, OPT, PE) and ECTS credits. Only active courses are returned unless active_only is \
        false."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to match against course code or name"
                },
                "semester": { "type": "string", "enum": ["Q1", "Q2"] },
                "study_plan": {
                    "type": "string",
                    "description": "Study plan code, e.g. GRAU, MAI, MIRI"
                },
                "course_type": {
                    "type": "string",
                    "enum": ["OBL", "OPT", "PE"],
                    "description": "OBL = obligatory, OPT = elective, PE = project"
                },
                "credits_min": { "type": "number" },
                "credits_max": { "type": "number" },
                "active_only": {
                    "type": "boolean",
                    "description": "Only active courses (default true)"
                }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query: CourseQuery = parse_args(params)?;
        let courses = match self.client.courses(&cancel).await {
            Ok(courses) => courses,
            Err(e) => return api_error(self.name(), e),
        };
        let results = search_courses(&courses, &query);
        let summary = query.summary(results.len());
        Ok(format_tool_response(results, summary))
    }
}

#[derive(Debug, Deserialize)]
struct CourseDetailsArgs {
    course_code: String,
}

/// Full information on one course.
pub struct CourseDetailsTool {
    client: FibClient,
}

impl CourseDetailsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for CourseDetailsTool {
    fn name(&self) -> &str {
        "get_course_details"
    }

    fn label(&self) -> &str {
        "Course Details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a FIB course: credits, semesters offered, study plans, \
        teaching languages, syllabus URL and requirement type per plan."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_code": {
                    "type": "string",
                    "description": "Course code, e.g. IA, AC2, CPP-MAI"
                }
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
        let args: CourseDetailsArgs = parse_args(params)?;
        let code = args.course_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ToolError::InvalidArgs("course_code must not be empty".into()));
        }
        match self.client.course(&code, &cancel).await {
            Ok(course) => Ok(format_object(course_details(&course))),
            Err(e) => api_error(self.name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseObligation;

    fn course(id: &str, credits: f64, vigent: &str) -> Course {
        Course {
            id: id.into(),
            url: String::new(),
            guia: None,
            obligatorietats: vec![
                CourseObligation {
                    codi_oblig: "OBL".into(),
                    codi_especialitat: String::new(),
                    pla: "GRAU".into(),
                    nom_especialitat: String::new(),
                },
                CourseObligation {
                    codi_oblig: "OPT".into(),
                    codi_especialitat: String::new(),
                    pla: "MAI".into(),
                    nom_especialitat: String::new(),
                },
            ],
            plans: vec!["GRAU".into(), "MAI".into()],
            lang: Default::default(),
            quadrimestres: vec!["Q1".into()],
            sigles: id.into(),
            codi_upc: "270000".into(),
            semestre: "S5".into(),
            credits,
            vigent: vigent.into(),
            guia_docent_externa: String::new(),
            nom: format!("Course {}", id),
            guia_docent_url_publica: String::new(),
        }
    }

    fn ids(results: &[Value]) -> Vec<&str> {
        results.iter().filter_map(|r| r["id"].as_str()).collect()
    }

    #[test]
    fn inactive_courses_are_hidden_by_default() {
        let courses = vec![course("IA", 6.0, "S"), course("OLD", 6.0, "N")];
        assert_eq!(ids(&search_courses(&courses, &CourseQuery::default())), vec!["IA"]);

        let all = CourseQuery {
            active_only: false,
            ..Default::default()
        };
        assert_eq!(search_courses(&courses, &all).len(), 2);
    }

    #[test]
    fn course_type_is_checked_within_the_study_plan() {
        let courses = vec![course("IA", 6.0, "S")];
        let opt_in_grau = CourseQuery {
            course_type: Some("opt".into()),
            study_plan: Some("GRAU".into()),
            ..Default::default()
        };
        assert!(search_courses(&courses, &opt_in_grau).is_empty());

        let opt_in_mai = CourseQuery {
            course_type: Some("OPT".into()),
            study_plan: Some("mai".into()),
            ..Default::default()
        };
        assert_eq!(search_courses(&courses, &opt_in_mai).len(), 1);
    }

    #[test]
    fn credit_range_and_text_query() {
        let courses = vec![course("IA", 6.0, "S"), course("TFG", 18.0, "S")];
        let query = CourseQuery {
            credits_min: Some(7.0),
            ..Default::default()
        };
        assert_eq!(ids(&search_courses(&courses, &query)), vec!["TFG"]);

        let query = CourseQuery {
            query: Some("course ia".into()),
            ..Default::default()
        };
        assert_eq!(ids(&search_courses(&courses, &query)), vec!["IA"]);
        assert_eq!(query.summary(1), "Found 1 course(s) matching 'course ia'");
    }

    #[test]
    fn arguments_default_to_active_only() {
        let query: CourseQuery = parse_args(Value::Null).unwrap();
        assert!(query.active_only);
        let query: CourseQuery = parse_args(json!({"active_only": false})).unwrap();
        assert!(!query.active_only);
        assert!(parse_args::<CourseQuery>(json!({"credits_min": "lots"})).is_err());
    }
}
