//! Tools over the logged-in user's own data (`jo/...`).
//!
//! Every tool checks for a credential first and answers with an
//! "Authentication required" result instead of calling the API without one.

use super::common::*;
use crate::api::FibClient;
use crate::models::{UserClass, UserCourse, UserNotice, UserProfile, WEEKDAYS};
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const LOGIN_REQUIRED: &str = "Authentication required. You need to log in with your FIB \
account to access personal data like your courses, schedule, and notices.";
const NOTICE_CHARS: usize = 500;

fn require_login(client: &FibClient) -> Option<ToolResult> {
    if client.is_authenticated() {
        None
    } else {
        Some(error_result("Authentication required", LOGIN_REQUIRED))
    }
}

pub fn profile_summary(profile: &UserProfile) -> Value {
    json!({
        "username": profile.username,
        "full_name": profile.full_name(),
        "email": profile.email,
        "type": profile.tipus,
        "study_plans": profile.plans_estudi,
        "is_student": profile.is_student(),
        "is_professor": profile.is_professor(),
    })
}

pub struct MyProfileTool {
    client: FibClient,
}

impl MyProfileTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for MyProfileTool {
    fn name(&self) -> &str {
        "get_my_profile"
    }

    fn label(&self) -> &str {
        "My Profile"
    }

    fn description(&self) -> &str {
        "Get the logged-in user's FIB profile: username, name, email, user type and study plans. \
        Requires login."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        _params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        if let Some(result) = require_login(&self.client) {
            return Ok(result);
        }
        match self.client.my_profile(&cancel).await {
            Ok(profile) => Ok(format_object(profile_summary(&profile))),
            Err(e) => api_error(self.name(), e),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MyCoursesQuery {
    /// Q1 or Q2.
    pub semester: Option<String>,
    pub passed_only: bool,
    pub with_grades: bool,
}

/// Matching enrolled courses and their credit total.
pub fn my_courses(courses: &[UserCourse], query: &MyCoursesQuery) -> (Vec<Value>, f64) {
    let mut total_credits = 0.0;
    let results: Vec<Value> = courses
        .iter()
        .filter(|c| {
            query
                .semester
                .as_deref()
                .map_or(true, |s| eq_ignore_case(&c.quadrimestre, s))
        })
        .filter(|c| !query.passed_only || c.is_passed())
        .map(|c| {
            total_credits += c.credits;
            let mut entry = json!({
                "id": c.id,
                "name": c.nom,
                "credits": c.credits,
                "semester": c.quadrimestre,
                "group": c.grup,
            });
            if query.with_grades {
                entry["grade"] = json!(c.nota);
                entry["qualification"] = json!(c.qualificacio);
                entry["passed"] = json!(c.is_passed());
            }
            entry
        })
        .collect();
    (results, total_credits)
}

pub struct MyCoursesTool {
    client: FibClient,
}

impl MyCoursesTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for MyCoursesTool {
    fn name(&self) -> &str {
        "get_my_courses"
    }

    fn label(&self) -> &str {
        "My Courses"
    }

    fn description(&self) -> &str {
        "Get the logged-in user's enrolled courses with the total credits, optionally for one \
        semester (Q1/Q2), only passed courses, or including grades. Requires login."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "semester": { "type": "string", "enum": ["Q1", "Q2"] },
                "passed_only": { "type": "boolean" },
                "with_grades": {
                    "type": "boolean",
                    "description": "Include grade, qualification and passed flag"
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
        let query: MyCoursesQuery = parse_args(params)?;
        if let Some(result) = require_login(&self.client) {
            return Ok(result);
        }
        let courses = match self.client.my_courses(&cancel).await {
            Ok(courses) => courses,
            Err(e) => return api_error(self.name(), e),
        };
        let (results, credits) = my_courses(&courses, &query);
        let mut summary = format!(
            "Found {} enrolled course(s), {} total credits",
            results.len(),
            credits
        );
        if let Some(semester) = &query.semester {
            summary.push_str(&format!(" in {}", semester));
        }
        Ok(format_tool_response(results, summary))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleQuery {
    /// English weekday name.
    pub day: Option<String>,
    pub course_code: Option<String>,
}

impl ScheduleQuery {
    fn weekday(&self) -> Result<Option<u8>, ToolError> {
        let Some(day) = self.day.as_deref() else {
            return Ok(None);
        };
        WEEKDAYS
            .iter()
            .position(|name| eq_ignore_case(name, day))
            .map(|i| Some(i as u8 + 1))
            .ok_or_else(|| ToolError::InvalidArgs(format!("unknown day: {}", day)))
    }
}

/// Matching classes, by weekday then start time.
pub fn my_schedule(classes: &[UserClass], query: &ScheduleQuery) -> Result<Vec<Value>, ToolError> {
    let weekday = query.weekday()?;
    let mut matching: Vec<&UserClass> = classes
        .iter()
        .filter(|c| weekday.map_or(true, |d| c.dia_setmana == d))
        .filter(|c| {
            query
                .course_code
                .as_deref()
                .map_or(true, |code| matches_query(&c.codi_assig, code))
        })
        .collect();
    matching.sort_by(|a, b| (a.dia_setmana, &a.inici).cmp(&(b.dia_setmana, &b.inici)));
    Ok(matching
        .into_iter()
        .map(|c| {
            json!({
                "course": c.codi_assig,
                "course_name": c.nom_assig,
                "day": c.day_name(),
                "start_time": c.inici,
                "end_time": c.fi,
                "type": c.class_type_name(),
                "classroom": c.aules,
                "group": c.grup,
            })
        })
        .collect())
}

pub struct MyScheduleTool {
    client: FibClient,
}

impl MyScheduleTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for MyScheduleTool {
    fn name(&self) -> &str {
        "get_my_schedule"
    }

    fn label(&self) -> &str {
        "My Schedule"
    }

    fn description(&self) -> &str {
        "Get the logged-in user's weekly class schedule with times, classrooms and class types, \
        optionally for one day or one course. Requires login."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "day": {
                    "type": "string",
                    "enum": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                },
                "course_code": { "type": "string" }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query: ScheduleQuery = parse_args(params)?;
        query.weekday()?;
        if let Some(result) = require_login(&self.client) {
            return Ok(result);
        }
        let classes = match self.client.my_classes(&cancel).await {
            Ok(classes) => classes,
            Err(e) => return api_error(self.name(), e),
        };
        let results = my_schedule(&classes, &query)?;
        let mut summary = format!("Found {} class(es)", results.len());
        if let Some(day) = &query.day {
            summary.push_str(&format!(" on {}", day));
        }
        if let Some(code) = &query.course_code {
            summary.push_str(&format!(" for {}", code));
        }
        Ok(format_tool_response(results, summary))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NoticesQuery {
    pub course_code: Option<String>,
    pub limit: usize,
}

impl Default for NoticesQuery {
    fn default() -> Self {
        Self {
            course_code: None,
            limit: 10,
        }
    }
}

/// Newest notices first, at most `limit`.
pub fn my_notices(notices: &[UserNotice], query: &NoticesQuery) -> Vec<Value> {
    let mut matching: Vec<&UserNotice> = notices
        .iter()
        .filter(|n| {
            query
                .course_code
                .as_deref()
                .map_or(true, |code| matches_query(&n.codi_assig, code))
        })
        .collect();
    matching.sort_by(|a, b| b.data_insercio.cmp(&a.data_insercio));
    matching
        .into_iter()
        .take(query.limit)
        .map(|n| {
            json!({
                "id": n.id,
                "title": n.titol,
                "course": n.codi_assig,
                "content": truncate_chars(&n.plain_text(), NOTICE_CHARS),
                "date": n.data_insercio.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "has_attachments": !n.adjunts.is_empty(),
            })
        })
        .collect()
}

pub struct MyNoticesTool {
    client: FibClient,
}

impl MyNoticesTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for MyNoticesTool {
    fn name(&self) -> &str {
        "get_my_notices"
    }

    fn label(&self) -> &str {
        "My Notices"
    }

    fn description(&self) -> &str {
        "Get the logged-in user's course notices and announcements, newest first (default 10), \
        optionally for one course. Requires login."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_code": { "type": "string" },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum notices (default 10)"
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
        let query: NoticesQuery = parse_args(params)?;
        if let Some(result) = require_login(&self.client) {
            return Ok(result);
        }
        let notices = match self.client.my_notices(&cancel).await {
            Ok(notices) => notices,
            Err(e) => return api_error(self.name(), e),
        };
        let results = my_notices(&notices, &query);
        let mut summary = format!("Found {} notice(s)", results.len());
        if let Some(code) = &query.course_code {
            summary.push_str(&format!(" for {}", code));
        }
        Ok(format_tool_response(results, summary))
    }
}
