pub mod academic;
pub mod classrooms;
pub mod common;
pub mod courses;
pub mod exams;
pub mod news;
pub mod private;
pub mod professors;

pub use academic::{AcademicTermsTool, CurrentTermTool};
pub use classrooms::ListClassroomsTool;
pub use common::format_tool_response;
pub use courses::{CourseDetailsTool, SearchCoursesTool};
pub use exams::{SearchExamsTool, UpcomingExamsTool};
pub use news::NewsTool;
pub use private::{MyCoursesTool, MyNoticesTool, MyProfileTool, MyScheduleTool};
pub use professors::{CourseProfessorsTool, SearchProfessorsTool};

use crate::api::FibClient;
use crate::types::AgentTool;

/// Tools over public FIB data. No login needed.
pub fn public_tools(client: &FibClient) -> Vec<Box<dyn AgentTool>> {
    vec![
        Box::new(SearchCoursesTool::new(client.clone())),
        Box::new(CourseDetailsTool::new(client.clone())),
        Box::new(SearchExamsTool::new(client.clone())),
        Box::new(UpcomingExamsTool::new(client.clone())),
        Box::new(SearchProfessorsTool::new(client.clone())),
        Box::new(CourseProfessorsTool::new(client.clone())),
        Box::new(AcademicTermsTool::new(client.clone())),
        Box::new(CurrentTermTool::new(client.clone())),
        Box::new(NewsTool::new(client.clone())),
        Box::new(ListClassroomsTool::new(client.clone())),
    ]
}

/// Tools over the logged-in user's data.
pub fn private_tools(client: &FibClient) -> Vec<Box<dyn AgentTool>> {
    vec![
        Box::new(MyProfileTool::new(client.clone())),
        Box::new(MyCoursesTool::new(client.clone())),
        Box::new(MyScheduleTool::new(client.clone())),
        Box::new(MyNoticesTool::new(client.clone())),
    ]
}

/// Every tool, public first.
pub fn all_tools(client: &FibClient) -> Vec<Box<dyn AgentTool>> {
    let mut tools = public_tools(client);
    tools.extend(private_tools(client));
    tools
}

/// Find a tool by its `name()`.
pub fn find_tool<'a>(tools: &'a [Box<dyn AgentTool>], name: &str) -> Option<&'a dyn AgentTool> {
    tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
}
