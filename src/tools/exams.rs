//! Exam schedule tools.

use super::common::*;
use crate::api::FibClient;
use crate::models::Exam;
use crate::types::*;
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExamArgs {
    pub course_code: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// "1" or "2".
    #[serde(deserialize_with = "string_or_number")]
    pub semester: Option<String>,
    pub year: Option<i64>,
    /// F = final, P = partial.
    pub exam_type: Option<String>,
    pub study_plan: Option<String>,
}

/// Validated exam filters.
#[derive(Debug, Clone, Default)]
pub struct ExamQuery {
    pub course_code: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub semester: Option<i64>,
    pub year: Option<i64>,
    pub exam_type: Option<String>,
    pub study_plan: Option<String>,
}

impl TryFrom<ExamArgs> for ExamQuery {
    type Error = ToolError;

    fn try_from(args: ExamArgs) -> Result<Self, ToolError> {
        let semester = match args.semester.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let digits = raw.trim_start_matches(['Q', 'q']);
                match digits.parse::<i64>() {
                    Ok(n @ 1..=2) => Some(n),
                    _ => {
                        return Err(ToolError::InvalidArgs(format!(
                            "semester must be 1 or 2, got {}",
                            raw
                        )))
                    }
                }
            }
        };
        // A bare end date includes the whole day.
        let end = match parse_date_arg("end_date", args.end_date.as_deref())? {
            Some(end) if end.time() == Default::default() => Some(end_of_day(end.date())),
            other => other,
        };
        Ok(Self {
            course_code: args.course_code,
            start: parse_date_arg("start_date", args.start_date.as_deref())?,
            end,
            semester,
            year: args.year,
            exam_type: args.exam_type,
            study_plan: args.study_plan,
        })
    }
}

impl ExamQuery {
    pub fn matches(&self, exam: &Exam) -> bool {
        if let Some(code) = &self.course_code {
            if !eq_ignore_case(&exam.assig, code) {
                return false;
            }
        }
        if self.start.is_some_and(|start| exam.inici < start) {
            return false;
        }
        if self.end.is_some_and(|end| exam.fi > end) {
            return false;
        }
        if self.semester.is_some_and(|q| exam.quatr != q) {
            return false;
        }
        if self.year.is_some_and(|y| exam.curs != y) {
            return false;
        }
        if let Some(kind) = &self.exam_type {
            if !eq_ignore_case(&exam.tipus, kind) {
                return false;
            }
        }
        if let Some(plan) = &self.study_plan {
            if !eq_ignore_case(&exam.pla, plan) {
                return false;
            }
        }
        true
    }
}

/// Matching exams, soonest first.
pub fn search_exams(exams: &[Exam], query: &ExamQuery) -> Vec<Value> {
    let mut matching: Vec<&Exam> = exams.iter().filter(|e| query.matches(e)).collect();
    matching.sort_by_key(|e| e.inici);
    matching
        .into_iter()
        .map(|exam| {
            json!({
                "course": exam.assig,
                "date": exam.inici.format("%Y-%m-%d").to_string(),
                "start_time": exam.inici.format("%H:%M").to_string(),
                "end_time": exam.fi.format("%H:%M").to_string(),
                "classroom": exam.aules,
                "type": exam.type_name(),
                "study_plan": exam.pla,
                "academic_year": format!("{}-{}", exam.curs, exam.curs + 1),
                "semester": format!("Q{}", exam.quatr),
                "comments": non_empty(&exam.comentaris),
            })
        })
        .collect()
}

/// Window from the start of `today` to the end of `today + days_ahead`.
pub fn upcoming_query(today: NaiveDate, days_ahead: u64, study_plan: Option<String>) -> ExamQuery {
    let last = today.checked_add_days(Days::new(days_ahead)).unwrap_or(NaiveDate::MAX);
    ExamQuery {
        start: today.and_hms_opt(0, 0, 0),
        end: Some(end_of_day(last)),
        study_plan,
        ..Default::default()
    }
}

/// Search exam schedules.
pub struct SearchExamsTool {
    client: FibClient,
}

impl SearchExamsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for SearchExamsTool {
    fn name(&self) -> &str {
        "search_exams"
    }

    fn label(&self) -> &str {
        "Search Exams"
    }

    fn description(&self) -> &str {
        "Search FIB exam schedules by course code, date range (YYYY-MM-DD), semester (1 or 2), \
        academic year (e.g. 2024 for 2024-2025), exam type (F = final, P = partial) and study \
        plan. Results are sorted by date."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_code": { "type": "string", "description": "Course code, e.g. IA" },
                "start_date": { "type": "string", "description": "Earliest exam date, YYYY-MM-DD" },
                "end_date": { "type": "string", "description": "Latest exam date, YYYY-MM-DD" },
                "semester": { "type": "string", "enum": ["1", "2"] },
                "year": { "type": "integer", "description": "First year of the academic year" },
                "exam_type": { "type": "string", "enum": ["F", "P"] },
                "study_plan": { "type": "string", "description": "Study plan code, e.g. GRAU" }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let args: ExamArgs = parse_args(params)?;
        let course = args.course_code.clone();
        let query = ExamQuery::try_from(args)?;
        let exams = match self.client.exams(&cancel).await {
            Ok(exams) => exams,
            Err(e) => return api_error(self.name(), e),
        };
        let results = search_exams(&exams, &query);
        let mut summary = format!("Found {} exam(s)", results.len());
        if let Some(code) = course {
            summary.push_str(&format!(" for course {}", code));
        }
        Ok(format_tool_response(results, summary))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct UpcomingArgs {
    days_ahead: u64,
    study_plan: Option<String>,
}

impl Default for UpcomingArgs {
    fn default() -> Self {
        Self {
            days_ahead: 30,
            study_plan: None,
        }
    }
}

/// Exams in the next N days.
pub struct UpcomingExamsTool {
    client: FibClient,
}

impl UpcomingExamsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for UpcomingExamsTool {
    fn name(&self) -> &str {
        "get_upcoming_exams"
    }

    fn label(&self) -> &str {
        "Upcoming Exams"
    }

    fn description(&self) -> &str {
        "Get FIB exams scheduled from today up to N days ahead (default 30), optionally for one \
        study plan."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days_ahead": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Days to look ahead (default 30)"
                },
                "study_plan": { "type": "string", "description": "Study plan code, e.g. GRAU" }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let args: UpcomingArgs = parse_args(params)?;
        let query = upcoming_query(Local::now().date_naive(), args.days_ahead, args.study_plan);
        let exams = match self.client.exams(&cancel).await {
            Ok(exams) => exams,
            Err(e) => return api_error(self.name(), e),
        };
        let results = search_exams(&exams, &query);
        let summary = format!(
            "Found {} exam(s) in the next {} day(s)",
            results.len(),
            args.days_ahead
        );
        Ok(format_tool_response(results, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam(id: i64, assig: &str, day: &str, tipus: &str) -> Exam {
        let at = |time: &str| {
            NaiveDateTime::parse_from_str(&format!("{} {}", day, time), "%Y-%m-%d %H:%M").unwrap()
        };
        Exam {
            id,
            assig: assig.into(),
            codi_upc: "270000".into(),
            aules: "A5201".into(),
            inici: at("08:00"),
            fi: at("11:00"),
            quatr: 1,
            curs: 2024,
            pla: "GRAU".into(),
            tipus: tipus.into(),
            tipus_assignatura: String::new(),
            comentaris: String::new(),
            eslaboratori: String::new(),
        }
    }

    fn query(args: Value) -> ExamQuery {
        ExamQuery::try_from(parse_args::<ExamArgs>(args).unwrap()).unwrap()
    }

    #[test]
    fn results_are_sorted_by_start() {
        let exams = vec![
            exam(1, "BD", "2025-01-20", "F"),
            exam(2, "IA", "2025-01-10", "F"),
            exam(3, "PRO1", "2025-01-15", "P"),
        ];
        let results = search_exams(&exams, &ExamQuery::default());
        let courses: Vec<_> = results.iter().map(|r| r["course"].as_str().unwrap()).collect();
        assert_eq!(courses, vec!["IA", "PRO1", "BD"]);
        assert_eq!(results[1]["type"], "Partial");
        assert_eq!(results[0]["academic_year"], "2024-2025");
    }

    #[test]
    fn end_date_includes_the_whole_day() {
        let exams = vec![exam(1, "BD", "2025-01-20", "F"), exam(2, "IA", "2025-01-21", "F")];
        let q = query(json!({"start_date": "2025-01-20", "end_date": "2025-01-20"}));
        assert_eq!(search_exams(&exams, &q).len(), 1);
    }

    #[test]
    fn semester_accepts_strings_and_numbers() {
        assert_eq!(query(json!({"semester": "2"})).semester, Some(2));
        assert_eq!(query(json!({"semester": 1})).semester, Some(1));
        assert_eq!(query(json!({"semester": "Q2"})).semester, Some(2));
        let bad = ExamQuery::try_from(parse_args::<ExamArgs>(json!({"semester": "3"})).unwrap());
        assert!(matches!(bad, Err(ToolError::InvalidArgs(_))));
    }

    #[test]
    fn upcoming_window() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let exams = vec![
            exam(1, "OLD", "2025-01-09", "F"),
            exam(2, "IA", "2025-01-10", "F"),
            exam(3, "BD", "2025-01-17", "F"),
            exam(4, "LATE", "2025-01-18", "F"),
        ];
        let results = search_exams(&exams, &upcoming_query(today, 7, None));
        let courses: Vec<_> = results.iter().map(|r| r["course"].as_str().unwrap()).collect();
        assert_eq!(courses, vec!["IA", "BD"]);
    }
}
