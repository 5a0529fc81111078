//! Endpoint descriptors for the FIB API.

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Authenticated with the application's `client_id` only.
    Public,
    /// Requires the user's OAuth bearer token.
    Private,
}

/// Static description of one API resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub resource: &'static str,
    /// Path relative to the base URL, with a trailing slash.
    pub path: String,
    pub visibility: Visibility,
    /// Sent as `limit` on the first page request when set.
    pub page_size: Option<usize>,
}

impl Endpoint {
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Detail endpoint of a single course, e.g. `assignatures/IA/`.
    pub fn course(code: &str) -> Result<Self, ApiError> {
        let code = validate_id(code)?;
        Ok(Self {
            resource: COURSES.resource,
            path: format!("{}/{}/", COURSES.resource, code),
            visibility: Visibility::Public,
            page_size: None,
        })
    }
}

/// Compile-time endpoint definition; expanded into an [`Endpoint`] on use.
#[derive(Debug, Clone, Copy)]
pub struct EndpointDef {
    pub resource: &'static str,
    pub visibility: Visibility,
    /// Default page size for the resource; `None` leaves it to the server.
    pub page_size: Option<usize>,
}

impl EndpointDef {
    pub const fn new(resource: &'static str, visibility: Visibility) -> Self {
        Self {
            resource,
            visibility,
            page_size: None,
        }
    }

    pub const fn paged(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            resource: self.resource,
            path: format!("{}/", self.resource),
            visibility: self.visibility,
            page_size: self.page_size,
        }
    }
}

impl From<EndpointDef> for Endpoint {
    fn from(def: EndpointDef) -> Self {
        def.endpoint()
    }
}

/// Large catalogues are fetched in pages of this size.
pub const CATALOGUE_PAGE_SIZE: usize = 200;

pub const COURSES: EndpointDef =
    EndpointDef::new("assignatures", Visibility::Public).paged(CATALOGUE_PAGE_SIZE);
pub const EXAMS: EndpointDef =
    EndpointDef::new("examens", Visibility::Public).paged(CATALOGUE_PAGE_SIZE);
pub const PROFESSORS: EndpointDef =
    EndpointDef::new("professors", Visibility::Public).paged(CATALOGUE_PAGE_SIZE);
pub const CLASSROOMS: EndpointDef =
    EndpointDef::new("aules", Visibility::Public).paged(CATALOGUE_PAGE_SIZE);
pub const ACADEMIC_TERMS: EndpointDef = EndpointDef::new("quadrimestres", Visibility::Public);
pub const NEWS: EndpointDef = EndpointDef::new("noticies", Visibility::Public).paged(50);
pub const MY_PROFILE: EndpointDef = EndpointDef::new("jo", Visibility::Private);
pub const MY_COURSES: EndpointDef = EndpointDef::new("jo/assignatures", Visibility::Private);
pub const MY_CLASSES: EndpointDef = EndpointDef::new("jo/classes", Visibility::Private);
pub const MY_NOTICES: EndpointDef = EndpointDef::new("jo/avisos", Visibility::Private);

/// Every listable endpoint, for lookups by resource name.
pub const ALL: [EndpointDef; 10] = [
    COURSES,
    EXAMS,
    PROFESSORS,
    CLASSROOMS,
    ACADEMIC_TERMS,
    NEWS,
    MY_PROFILE,
    MY_COURSES,
    MY_CLASSES,
    MY_NOTICES,
];

pub fn by_resource(resource: &str) -> Option<Endpoint> {
    let resource = resource.trim_matches('/');
    ALL.iter()
        .find(|def| def.resource == resource)
        .map(EndpointDef::endpoint)
}

/// Identifiers end up in URL paths; only allow what codes actually contain.
fn validate_id(id: &str) -> Result<&str, ApiError> {
    let id = id.trim();
    let valid = !id.is_empty()
        && id.len() <= 32
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && id != "."
        && id != "..";
    if valid {
        Ok(id)
    } else {
        Err(ApiError::Client {
            status: 400,
            message: format!("invalid identifier: {:?}", id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_endpoints_live_under_jo() {
        for def in ALL {
            let endpoint = def.endpoint();
            assert_eq!(endpoint.is_private(), endpoint.path.starts_with("jo"));
            assert!(endpoint.path.ends_with('/'));
        }
    }

    #[test]
    fn catalogues_carry_their_page_size() {
        assert_eq!(COURSES.endpoint().page_size, Some(200));
        assert_eq!(by_resource("aules").unwrap().page_size, Some(200));
        assert_eq!(MY_PROFILE.endpoint().page_size, None);
        assert_eq!(COURSES.endpoint().with_page_size(20).page_size, Some(20));
    }

    #[test]
    fn lookup_by_resource() {
        assert_eq!(by_resource("jo/avisos/").unwrap().path, "jo/avisos/");
        assert!(by_resource("unknown").is_none());
    }

    #[test]
    fn course_detail_validates_code() {
        assert_eq!(Endpoint::course("IA").unwrap().path, "assignatures/IA/");
        assert!(Endpoint::course("../jo").is_err());
        assert!(Endpoint::course("").is_err());
    }
}
