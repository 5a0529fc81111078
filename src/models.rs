//! Typed FIB API records.
//!
//! Field names follow the API's JSON. Required fields have no serde default,
//! so a record missing one fails validation in the mapper; optional fields
//! default to an empty string, empty list or `None`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::mapper::Record;

// ---------------------------------------------------------------------------
// Public resources
// ---------------------------------------------------------------------------

/// Requirement type of a course within a study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseObligation {
    /// OBL, OPT, PE, ...
    pub codi_oblig: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub codi_especialitat: String,
    pub pla: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub nom_especialitat: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub guia: Option<String>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub obligatorietats: Vec<CourseObligation>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub plans: Vec<String>,
    /// Teaching languages keyed by term.
    #[serde(default, deserialize_with = "de::null_default")]
    pub lang: BTreeMap<String, Vec<String>>,
    /// Terms in which the course is offered (Q1, Q2).
    #[serde(default, deserialize_with = "de::null_default")]
    pub quadrimestres: Vec<String>,
    pub sigles: String,
    pub codi_upc: String,
    pub semestre: String,
    pub credits: f64,
    pub vigent: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub guia_docent_externa: String,
    pub nom: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub guia_docent_url_publica: String,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.vigent == "S"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    /// Course code.
    pub assig: String,
    pub codi_upc: String,
    pub aules: String,
    #[serde(deserialize_with = "de::datetime")]
    pub inici: NaiveDateTime,
    #[serde(deserialize_with = "de::datetime")]
    pub fi: NaiveDateTime,
    /// Term number within the academic year (1 or 2).
    pub quatr: i64,
    /// First calendar year of the academic year.
    pub curs: i64,
    pub pla: String,
    /// F = final, P = partial.
    pub tipus: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub tipus_assignatura: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub comentaris: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub eslaboratori: String,
}

impl Exam {
    pub fn is_final(&self) -> bool {
        self.tipus == "F"
    }

    pub fn is_partial(&self) -> bool {
        self.tipus == "P"
    }

    pub fn type_name(&self) -> &str {
        if self.is_final() {
            "Final"
        } else if self.is_partial() {
            "Partial"
        } else {
            &self.tipus
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professor {
    pub id: i64,
    #[serde(default, deserialize_with = "de::null_default")]
    pub assignatures: Vec<String>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub plans_estudi: Vec<String>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub especialitats: Vec<String>,
    /// Address with `(at)` in place of `@`.
    pub obfuscated_email: String,
    pub nom: String,
    pub cognoms: String,
    pub departament: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub futur_url: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub apren_url: String,
}

impl Professor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nom, self.cognoms)
    }

    pub fn email(&self) -> String {
        self.obfuscated_email.replace("(at)", "@")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: String,
    pub reserves: String,
}

impl Classroom {
    /// Building letter, or empty when the id does not start with one.
    pub fn building(&self) -> String {
        match self.id.chars().next() {
            Some(c) if c.is_alphabetic() => c.to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicTerm {
    /// e.g. `2025Q1`
    pub id: String,
    pub url: String,
    pub actual: String,
    pub actual_horaris: String,
    pub classes: String,
    pub examens: String,
    pub assignatures: String,
}

impl AcademicTerm {
    pub fn is_current(&self) -> bool {
        self.actual == "S"
    }

    pub fn has_current_schedules(&self) -> bool {
        self.actual_horaris == "S"
    }

    pub fn year(&self) -> Option<i32> {
        self.id.get(..4)?.parse().ok()
    }

    pub fn semester(&self) -> Option<u32> {
        self.id.chars().last()?.to_digit(10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub titol: String,
    pub link: String,
    /// HTML summary.
    pub descripcio: String,
    #[serde(deserialize_with = "de::datetime")]
    pub data_publicacio: NaiveDateTime,
}

impl NewsItem {
    pub fn plain_description(&self) -> String {
        strip_html(&self.descripcio)
    }
}

// ---------------------------------------------------------------------------
// Private resources (OAuth)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub nom: String,
    pub cognoms: String,
    pub email: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub foto: String,
    #[serde(default = "default_user_type")]
    pub tipus: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub plans_estudi: Vec<String>,
}

fn default_user_type() -> String {
    "estudiant".into()
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nom, self.cognoms)
    }

    pub fn is_student(&self) -> bool {
        self.tipus.eq_ignore_ascii_case("estudiant")
    }

    pub fn is_professor(&self) -> bool {
        self.tipus.eq_ignore_ascii_case("professor")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCourse {
    pub id: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub url: String,
    pub nom: String,
    pub credits: f64,
    #[serde(default, deserialize_with = "de::null_default")]
    pub quadrimestre: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub grup: String,
    #[serde(default)]
    pub nota: Option<f64>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub qualificacio: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub convocatoria: String,
}

impl UserCourse {
    pub fn is_passed(&self) -> bool {
        match self.nota {
            Some(nota) => nota >= 5.0,
            None => matches!(
                self.qualificacio.to_ascii_uppercase().as_str(),
                "A" | "B" | "C" | "D"
            ),
        }
    }
}

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClass {
    pub codi_assig: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub nom_assig: String,
    pub grup: String,
    /// 1 = Monday .. 7 = Sunday
    pub dia_setmana: u8,
    /// HH:MM
    pub inici: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub fi: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub dupinici: String,
    /// T = theory, L = lab, P = problems, S = seminar.
    pub tipus: String,
    pub aules: String,
}

impl UserClass {
    pub fn day_name(&self) -> &'static str {
        match self.dia_setmana {
            d @ 1..=7 => WEEKDAYS[d as usize - 1],
            _ => "Unknown",
        }
    }

    pub fn class_type_name(&self) -> String {
        match self.tipus.to_ascii_uppercase().as_str() {
            "T" => "Theory".into(),
            "L" => "Lab".into(),
            "P" => "Problems".into(),
            "S" => "Seminar".into(),
            _ => self.tipus.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, deserialize_with = "de::null_default")]
    pub nom: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub tipus_mime: String,
    #[serde(default, deserialize_with = "de::null_default")]
    pub mida: u64,
    #[serde(default, deserialize_with = "de::optional_datetime")]
    pub data_modificacio: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotice {
    pub id: i64,
    pub titol: String,
    pub codi_assig: String,
    /// May contain HTML.
    pub text: String,
    #[serde(deserialize_with = "de::datetime")]
    pub data_insercio: NaiveDateTime,
    #[serde(default, deserialize_with = "de::optional_datetime")]
    pub data_modificacio: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub adjunts: Vec<Attachment>,
}

impl UserNotice {
    pub fn plain_text(&self) -> String {
        strip_html(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Natural keys
// ---------------------------------------------------------------------------

impl Record for Course {
    const RESOURCE: &'static str = "assignatures";
    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for Exam {
    const RESOURCE: &'static str = "examens";
    fn natural_key(&self) -> String {
        self.id.to_string()
    }
}

impl Record for Professor {
    const RESOURCE: &'static str = "professors";
    fn natural_key(&self) -> String {
        self.id.to_string()
    }
}

impl Record for Classroom {
    const RESOURCE: &'static str = "aules";
    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for AcademicTerm {
    const RESOURCE: &'static str = "quadrimestres";
    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for NewsItem {
    const RESOURCE: &'static str = "noticies";
    fn natural_key(&self) -> String {
        self.link.clone()
    }
}

impl Record for UserProfile {
    const RESOURCE: &'static str = "jo";
    fn natural_key(&self) -> String {
        self.username.clone()
    }
}

impl Record for UserCourse {
    const RESOURCE: &'static str = "jo/assignatures";
    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for UserClass {
    const RESOURCE: &'static str = "jo/classes";
    fn natural_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.codi_assig, self.grup, self.dia_setmana, self.inici
        )
    }
}

impl Record for UserNotice {
    const RESOURCE: &'static str = "jo/avisos";
    fn natural_key(&self) -> String {
        self.id.to_string()
    }
}

/// Drop HTML tags and trim.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Serde helpers for the API's loosely typed fields.
pub(crate) mod de {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer};

    /// Treat an explicit `null` like a missing field.
    pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// RFC 3339 timestamps keep their wall-clock time; naive ISO-8601
    /// timestamps and plain dates are taken as faculty local time.
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(dt);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    pub fn datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw)))
    }

    pub fn optional_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn course_optional_fields_default() {
        let course: Course = serde_json::from_value(json!({
            "id": "IA",
            "url": "https://api.fib.upc.edu/v2/assignatures/IA/",
            "sigles": "IA",
            "codi_upc": "270036",
            "semestre": "S5",
            "credits": 6.0,
            "vigent": "S",
            "nom": "Intel·ligència Artificial",
            "guia_docent_externa": null
        }))
        .unwrap();
        assert!(course.is_active());
        assert!(course.plans.is_empty());
        assert!(course.guia.is_none());
        assert_eq!(course.guia_docent_externa, "");
    }

    #[test]
    fn exam_accepts_naive_and_offset_datetimes() {
        let exam: Exam = serde_json::from_value(json!({
            "id": 1, "assig": "BD", "codi_upc": "270020", "aules": "A5201",
            "inici": "2025-01-14T08:00:00", "fi": "2025-01-14T11:00:00+01:00",
            "quatr": 1, "curs": 2024, "pla": "GRAU", "tipus": "F"
        }))
        .unwrap();
        assert!(exam.is_final());
        assert_eq!(exam.inici.format("%H:%M").to_string(), "08:00");
        assert_eq!(exam.fi.format("%H:%M").to_string(), "11:00");
    }

    #[test]
    fn derived_properties() {
        let prof = Professor {
            id: 7,
            assignatures: vec![],
            plans_estudi: vec![],
            especialitats: vec![],
            obfuscated_email: "jane.doe(at)upc.edu".into(),
            nom: "Jane".into(),
            cognoms: "Doe".into(),
            departament: "CS".into(),
            futur_url: String::new(),
            apren_url: String::new(),
        };
        assert_eq!(prof.email(), "jane.doe@upc.edu");
        assert_eq!(prof.full_name(), "Jane Doe");

        let room = Classroom {
            id: "A5201".into(),
            reserves: String::new(),
        };
        assert_eq!(room.building(), "A");

        let term = AcademicTerm {
            id: "2025Q1".into(),
            url: String::new(),
            actual: "S".into(),
            actual_horaris: "N".into(),
            classes: String::new(),
            examens: String::new(),
            assignatures: String::new(),
        };
        assert_eq!(term.year(), Some(2025));
        assert_eq!(term.semester(), Some(1));
        assert!(term.is_current());
    }

    #[test]
    fn user_course_pass_rules() {
        let mut course: UserCourse = serde_json::from_value(json!({
            "id": "PRO1", "nom": "Programació I", "credits": 7.5
        }))
        .unwrap();
        assert!(!course.is_passed());
        course.qualificacio = "b".into();
        assert!(course.is_passed());
        course.nota = Some(4.9);
        assert!(!course.is_passed());
    }

    #[test]
    fn html_is_stripped() {
        assert_eq!(
            strip_html("  <p>Exam <b>moved</b> to A5</p> "),
            "Exam moved to A5"
        );
    }

    #[test]
    fn class_names() {
        let class: UserClass = serde_json::from_value(json!({
            "codi_assig": "IA", "grup": "11", "dia_setmana": 3,
            "inici": "10:00", "tipus": "L", "aules": "C6S308"
        }))
        .unwrap();
        assert_eq!(class.day_name(), "Wednesday");
        assert_eq!(class.class_type_name(), "Lab");
        assert_eq!(class.natural_key(), "IA/11/3/10:00");
    }
}
