//! Agent tools end to end against a mock FIB API.

use fibagent::auth::{Credential, TokenStore};
use fibagent::tools::*;
use fibagent::{AgentTool, FibClient, FibConfig, RetryConfig, ToolError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> FibConfig {
    FibConfig::new("test-client")
        .with_base_url(server.uri())
        .without_token_file()
        .with_retry(RetryConfig::none())
}

fn anonymous_client(server: &MockServer) -> FibClient {
    FibClient::new(&config(server)).unwrap()
}

fn logged_in_client(server: &MockServer) -> FibClient {
    let store = TokenStore::new(None, None, Duration::from_secs(60));
    store.store(Credential::expiring_in("tok", None, 3600));
    FibClient::with_token_store(&config(server), Arc::new(store)).unwrap()
}

fn course(id: &str, name: &str, credits: f64, vigent: &str) -> Value {
    json!({
        "id": id,
        "url": format!("https://api.fib.upc.edu/v2/assignatures/{}/", id),
        "guia": null,
        "obligatorietats": [{
            "codi_oblig": "OBL",
            "codi_especialitat": "",
            "pla": "GRAU",
            "nom_especialitat": ""
        }],
        "plans": ["GRAU"],
        "lang": { "Q1": ["CAT"] },
        "quadrimestres": ["Q1"],
        "sigles": id,
        "codi_upc": "270000",
        "semestre": "Q5",
        "credits": credits,
        "vigent": vigent,
        "guia_docent_externa": "",
        "nom": name,
        "guia_docent_url_publica": null
    })
}

async fn mount_json(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn parse(result: &fibagent::ToolResult) -> Value {
    serde_json::from_str(&result.text()).unwrap()
}

#[tokio::test]
async fn search_courses_filters_inactive_by_default() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/assignatures/",
        json!({
            "count": 3,
            "next": null,
            "results": [
                course("IA", "Intel·ligència Artificial", 6.0, "S"),
                course("IA2", "Intel·ligència Artificial II", 6.0, "N"),
                course("BD", "Bases de Dades", 6.0, "S"),
            ]
        }),
    )
    .await;

    let tool = SearchCoursesTool::new(anonymous_client(&server));
    let result = tool
        .execute("t1", json!({ "query": "intel" }), CancellationToken::new())
        .await
        .unwrap();

    let body = parse(&result);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], "IA");
    assert_eq!(body["summary"], "Found 1 course(s) matching 'intel'");
}

#[tokio::test]
async fn course_details_reports_not_found_as_result() {
    let server = MockServer::start().await;
    let ia = course("IA", "Intel·ligència Artificial", 6.0, "S");
    mount_json(&server, "/assignatures/IA/", ia).await;
    Mock::given(method("GET"))
        .and(path("/assignatures/NOPE/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tool = CourseDetailsTool::new(anonymous_client(&server));
    let found = tool
        .execute("t1", json!({ "course_code": "ia" }), CancellationToken::new())
        .await
        .unwrap();
    let body = parse(&found);
    assert_eq!(body["id"], "IA");
    assert_eq!(body["active"], true);
    assert_eq!(body["requirements"][0]["type"], "OBL");

    let missing = tool
        .execute("t2", json!({ "course_code": "nope" }), CancellationToken::new())
        .await
        .unwrap();
    let body = parse(&missing);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn invalid_arguments_are_tool_errors() {
    let server = MockServer::start().await;
    let tool = CourseDetailsTool::new(anonymous_client(&server));
    let err = tool
        .execute("t1", json!({}), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidArgs(_)));
}

#[tokio::test]
async fn empty_results_say_so() {
    let server = MockServer::start().await;
    mount_json(&server, "/aules/", json!([])).await;

    let tool = ListClassroomsTool::new(anonymous_client(&server));
    let result = tool
        .execute("t1", json!({ "building": "Z" }), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.text(), "No results found.");
}

#[tokio::test]
async fn service_outage_is_a_user_facing_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/professors/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tool = SearchProfessorsTool::new(anonymous_client(&server));
    let result = tool
        .execute("t1", json!({ "name": "puig" }), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(parse(&result)["error"], "Service unavailable");
}

#[tokio::test]
async fn private_tools_need_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jo/avisos/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let tool = MyNoticesTool::new(anonymous_client(&server));
    let result = tool
        .execute("t1", json!({}), CancellationToken::new())
        .await
        .unwrap();
    let body = parse(&result);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn my_notices_newest_first_with_limit() {
    let server = MockServer::start().await;
    let notice = |id: i64, course: &str, date: &str| {
        json!({
            "id": id,
            "titol": format!("Avís {}", id),
            "codi_assig": course,
            "text": "<p>Hola</p>",
            "data_insercio": date,
            "data_modificacio": null,
            "adjunts": []
        })
    };
    mount_json(
        &server,
        "/jo/avisos/",
        json!([
            notice(1, "IA", "2025-02-01T09:00:00"),
            notice(2, "BD", "2025-03-01T09:00:00"),
            notice(3, "IA", "2025-03-05T09:00:00"),
        ]),
    )
    .await;

    let tool = MyNoticesTool::new(logged_in_client(&server));
    let result = tool
        .execute("t1", json!({ "course_code": "ia", "limit": 1 }), CancellationToken::new())
        .await
        .unwrap();
    let body = parse(&result);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["title"], "Avís 3");
}

#[test]
fn tool_sets_have_unique_names() {
    let config = FibConfig::new("test-client").without_token_file();
    let client = FibClient::new(&config).unwrap();
    let tools = all_tools(&client);
    assert_eq!(public_tools(&client).len(), 10);
    assert_eq!(private_tools(&client).len(), 4);

    let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 14);
    assert!(find_tool(&tools, "get_upcoming_exams").is_some());
    assert!(find_tool(&tools, "bash").is_none());
    for tool in &tools {
        assert_eq!(tool.parameters_schema()["type"], "object", "{}", tool.name());
    }
}
