//! End-to-end tests of the routing surface: requests go in, rendered responses come out.

use expect_test::expect;
use serde_json::{Value, json};

use mockrest_base::pal::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpStatusCode,
};
use mockrest_base::{ErrorKind, FilePath, MockPal, MockrestResult, Pal, PalHandle};

use crate::config::Options;
use crate::document::Document;
use crate::render::TemplateKey;
use crate::store::{JsonFileStore, StoreHandle};

use super::{Mount, RenderContext, ResourceKind, RoutingSurface, Stage};

fn blog() -> Value {
    json!({
        "posts": [
            {"id": 1, "title": "first post", "author": "ann"},
            {"id": 2, "title": "mockrest", "author": "someone"}
        ],
        "comments": [
            {"id": 1, "body": "some comment", "postId": 1},
            {"id": 5, "body": "another", "postId": 2}
        ],
        "replies": [
            {"id": 1, "text": "a", "commentId": 5},
            {"id": 2, "text": "b", "commentId": 1},
            {"id": 3, "text": "c", "commentId": 5}
        ],
        "profile": {"name": "ann"}
    })
}

fn surface_with(document: Value, options: Options, pal: MockPal) -> RoutingSurface {
    let document = Document::from_value(document).unwrap();
    RoutingSurface::from_document(document, options, PalHandle::new(pal)).unwrap()
}

fn surface() -> RoutingSurface {
    surface_with(blog(), Options::default(), MockPal::new())
}

fn get(surface: &RoutingSurface, url: &str) -> HttpResponse {
    surface.dispatch(HttpRequest::new(HttpMethod::Get, url))
}

fn body_json(response: &HttpResponse) -> Value {
    serde_json::from_slice(response.body().as_bytes()).unwrap()
}

fn header<'a>(response: &'a HttpResponse, name: &str) -> Option<&'a str> {
    response.headers().get(name).map(String::as_str)
}

#[test]
fn test_one_router_per_entry() {
    let surface = surface();
    let resources: Vec<(&str, ResourceKind)> = surface
        .resources()
        .iter()
        .map(|r| (r.name.as_str(), r.kind))
        .collect();
    assert_eq!(
        resources,
        [
            ("posts", ResourceKind::Plural),
            ("comments", ResourceKind::Plural),
            ("replies", ResourceKind::Plural),
            ("profile", ResourceKind::Singular),
        ]
    );
}

#[test]
fn test_unsupported_entry_fails_the_build() {
    let document = Document::from_value(json!({"posts": [], "count": 3})).unwrap();
    let error =
        RoutingSurface::from_document(document, Options::default(), PalHandle::new(MockPal::new()))
            .unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::UnsupportedEntry { key, .. } if key == "count"));
    assert!(error.is_configuration_fault());
    assert_eq!(
        error.to_string(),
        "Type of \"count\" (number) is not supported. Use objects or arrays of objects."
    );
}

#[test]
fn test_empty_document_mounts_nothing() {
    let surface = surface_with(json!({}), Options::default(), MockPal::new());
    assert!(surface.resources().is_empty());
    assert_eq!(body_json(&get(&surface, "/db")), json!({}));
}

#[test]
fn test_db_returns_the_whole_document() {
    let surface = surface();
    let response = get(&surface, "/db");
    assert_eq!(response.status(), HttpStatusCode::Ok);
    assert_eq!(body_json(&response), blog());
}

#[test]
fn test_unknown_path_is_404_empty_object() {
    let surface = surface();
    for url in ["/unknown", "/", "/posts/1/comments/2"] {
        let response = get(&surface, url);
        assert_eq!(response.status(), HttpStatusCode::NotFound, "{}", url);
        assert_eq!(response.body().as_string().unwrap(), "{}", "{}", url);
    }
}

#[test]
fn test_missing_record_is_404() {
    let surface = surface();
    let response = get(&surface, "/posts/99");
    assert_eq!(response.status(), HttpStatusCode::NotFound);
    assert_eq!(body_json(&response), json!({}));
}

#[test]
fn test_list_and_show() {
    let surface = surface();
    let response = get(&surface, "/posts");
    assert_eq!(
        header(&response, "content-type"),
        Some("application/json; charset=utf-8")
    );
    assert_eq!(body_json(&response), blog()["posts"]);

    let response = get(&surface, "/posts/2");
    expect![[r#"
        {
          "id": 2,
          "title": "mockrest",
          "author": "someone"
        }"#]]
    .assert_eq(&response.body().as_string().unwrap());
}

#[test]
fn test_created_record_is_returned_by_later_get() {
    let surface = surface();
    let created = surface.dispatch(
        HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Host", "localhost:3000")
            .with_json(&json!({"title": "new"})),
    );
    assert_eq!(created.status(), HttpStatusCode::Created);
    assert_eq!(body_json(&created), json!({"title": "new", "id": 3}));
    assert_eq!(
        header(&created, "location"),
        Some("http://localhost:3000/posts/3")
    );

    let fetched = get(&surface, "/posts/3");
    assert_eq!(body_json(&fetched), json!({"title": "new", "id": 3}));
}

#[test]
fn test_update_and_delete() {
    let surface = surface();
    let response = surface.dispatch(
        HttpRequest::new(HttpMethod::Patch, "/posts/1").with_json(&json!({"title": "patched"})),
    );
    assert_eq!(
        body_json(&response),
        json!({"id": 1, "title": "patched", "author": "ann"})
    );

    let response = surface.dispatch(HttpRequest::new(HttpMethod::Delete, "/posts/1"));
    assert_eq!(response.status(), HttpStatusCode::Ok);
    assert_eq!(body_json(&response), json!({}));
    assert_eq!(get(&surface, "/posts/1").status(), HttpStatusCode::NotFound);
    // comment 1 belonged to post 1
    assert_eq!(body_json(&get(&surface, "/comments")), json!([{"id": 5, "body": "another", "postId": 2}]));
}

#[test]
fn test_nested_get_filters_by_parent() {
    let surface = surface();
    let response = get(&surface, "/comments/5/replies");
    assert_eq!(
        body_json(&response),
        json!([
            {"id": 1, "text": "a", "commentId": 5},
            {"id": 3, "text": "c", "commentId": 5}
        ])
    );
}

#[test]
fn test_nested_get_on_childless_collection_is_empty() {
    let surface = surface_with(
        json!({"users": [{"id": 1}], "todos": [{"id": 1, "title": "x"}]}),
        Options::default(),
        MockPal::new(),
    );
    assert_eq!(body_json(&get(&surface, "/users/1/todos")), json!([]));
}

#[test]
fn test_nested_post_sets_foreign_key() {
    let surface = surface();
    let response = surface.dispatch(
        HttpRequest::new(HttpMethod::Post, "/comments/5/replies").with_json(&json!({"text": "d"})),
    );
    assert_eq!(response.status(), HttpStatusCode::Created);
    assert_eq!(
        body_json(&response),
        json!({"text": "d", "commentId": 5, "id": 4})
    );
}

#[test]
fn test_custom_foreign_key_suffix() {
    let surface = surface_with(
        json!({"posts": [{"id": 1}], "comments": [{"id": 1, "post_id": 1}, {"id": 2, "post_id": 2}]}),
        Options::default().with_foreign_key_suffix("_id"),
        MockPal::new(),
    );
    assert_eq!(
        body_json(&get(&surface, "/posts/1/comments")),
        json!([{"id": 1, "post_id": 1}])
    );
}

#[test]
fn test_custom_id_field() {
    let surface = surface_with(
        json!({"books": [{"isbn": "a1", "title": "x"}]}),
        Options::default().with_id("isbn"),
        MockPal::new(),
    );
    assert_eq!(
        body_json(&get(&surface, "/books/a1")),
        json!({"isbn": "a1", "title": "x"})
    );
}

#[test]
fn test_singular_resource() {
    let surface = surface();
    assert_eq!(body_json(&get(&surface, "/profile")), json!({"name": "ann"}));

    let response = surface.dispatch(
        HttpRequest::new(HttpMethod::Put, "/profile").with_json(&json!({"name": "changed"})),
    );
    assert_eq!(response.status(), HttpStatusCode::Ok);
    assert_eq!(body_json(&get(&surface, "/profile")), json!({"name": "changed"}));
}

#[test]
fn test_paging_headers() {
    let surface = surface();
    let response = get(&surface, "/replies?_page=1&_limit=2");
    assert_eq!(body_json(&response).as_array().map(Vec::len), Some(2));
    assert_eq!(header(&response, "x-total-count"), Some("3"));
    assert_eq!(
        header(&response, "link"),
        Some(concat!(
            "<http://localhost/replies?_page=1&_limit=2>; rel=\"first\", ",
            "<http://localhost/replies?_page=2&_limit=2>; rel=\"next\", ",
            "<http://localhost/replies?_page=2&_limit=2>; rel=\"last\""
        ))
    );
}

#[test]
fn test_method_override() {
    let surface = surface();
    let response = surface.dispatch(
        HttpRequest::new(HttpMethod::Post, "/posts/2").with_header("X-HTTP-Method-Override", "DELETE"),
    );
    assert_eq!(response.status(), HttpStatusCode::Ok);
    assert_eq!(get(&surface, "/posts/2").status(), HttpStatusCode::NotFound);
}

#[test]
fn test_form_encoded_body() {
    let surface = surface();
    let response = surface.dispatch(
        HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("title=from+a+form"),
    );
    assert_eq!(body_json(&response), json!({"title": "from a form", "id": 3}));
}

#[test]
fn test_jsonp() {
    let surface = surface();
    let response = get(&surface, "/profile?callback=cb");
    assert_eq!(
        header(&response, "content-type"),
        Some("text/javascript; charset=utf-8")
    );
    expect![[r#"
        /**/ typeof cb === 'function' && cb({
          "name": "ann"
        });"#]]
    .assert_eq(&response.body().as_string().unwrap());
}

#[test]
fn test_invalid_json_body_is_500() {
    let surface = surface();
    let response = surface.dispatch(
        HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/json")
            .with_body("{not json"),
    );
    assert_eq!(response.status(), HttpStatusCode::InternalServerError);
    let body = response.body().as_string().unwrap();
    assert!(body.starts_with("Invalid JSON"), "{}", body);
    assert!(body.contains("in stage body-decoder"), "{}", body);
    assert!(body.contains("while handling POST /posts"), "{}", body);
}

#[test]
fn test_hypermedia_renders_get_all_template() {
    let pal = MockPal::new();
    pal.add_file(
        FilePath::from("templates/posts.html"),
        b"{% for post in top %}[{{ post.title }}]{% endfor %}".to_vec(),
    );
    let options = Options::default()
        .with_hypermedia(true)
        .with_template("posts", TemplateKey::GetAll, "templates/posts.html");
    let surface = surface_with(blog(), options, pal);

    let response = get(&surface, "/posts");
    assert_eq!(response.status(), HttpStatusCode::Ok);
    assert_eq!(header(&response, "content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.body().as_string().unwrap(), "[first post][mockrest]");
}

#[test]
fn test_hypermedia_unmapped_template_is_500() {
    let options = Options::default()
        .with_hypermedia(true)
        .with_template("posts", TemplateKey::GetAll, "templates/posts.html");
    let surface = surface_with(blog(), options, MockPal::new());

    let response = get(&surface, "/comments");
    assert_eq!(response.status(), HttpStatusCode::InternalServerError);
    assert!(
        response
            .body()
            .as_string()
            .unwrap()
            .starts_with("No template configured for resource \"comments\" and key \"GET-ALL\"")
    );
}

#[derive(Debug)]
struct Exploding;

impl Stage for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn handle(&self, ctx: &mut RenderContext, _path: &str) -> MockrestResult<()> {
        if ctx.query().contains("panic") {
            panic!("stage blew up");
        }
        mockrest_base::bail!("stage failed")
    }
}

#[test]
fn test_failing_stage_is_500_and_next_request_succeeds() {
    let mut surface = surface();
    surface.mount(Mount::at("/boom", Exploding));

    let response = get(&surface, "/boom");
    assert_eq!(response.status(), HttpStatusCode::InternalServerError);
    assert_eq!(header(&response, "content-type"), Some("text/plain; charset=utf-8"));
    expect![[r#"
        stage failed
        ├─ in stage exploding
        └─ while handling GET /boom
    "#]]
    .assert_eq(&response.body().as_string().unwrap());

    let response = get(&surface, "/boom?panic");
    assert_eq!(response.status(), HttpStatusCode::InternalServerError);
    assert!(
        response
            .body()
            .as_string()
            .unwrap()
            .starts_with("Handler panicked: stage blew up")
    );

    assert_eq!(get(&surface, "/posts/1").status(), HttpStatusCode::Ok);
}

#[test]
fn test_served_through_mock_pal() {
    let pal = MockPal::new();
    let surface = surface_with(blog(), Options::default(), pal.clone());
    let handle = pal
        .start_http_server(Box::new(surface), HttpServerConfig::default())
        .unwrap();

    let response = pal
        .simulate_request(handle.port(), HttpRequest::new(HttpMethod::Get, "/posts/1"))
        .unwrap();
    assert_eq!(body_json(&response)["title"], json!("first post"));

    handle.shutdown();
    assert!(
        pal.simulate_request(handle.port(), HttpRequest::new(HttpMethod::Get, "/posts"))
            .is_err()
    );
}

#[test]
fn test_file_store_persists_mutations() {
    let pal = MockPal::new();
    pal.add_file(FilePath::from("db.json"), br#"{"tags": []}"#.to_vec());
    let store = StoreHandle::new(
        JsonFileStore::open(PalHandle::new(pal.clone()), FilePath::from("db.json")).unwrap(),
    );
    let surface =
        RoutingSurface::build(store, Options::default(), PalHandle::new(pal.clone())).unwrap();

    surface.dispatch(HttpRequest::new(HttpMethod::Post, "/tags").with_json(&json!({"name": "rust"})));

    let written: Value =
        serde_json::from_str(&pal.file_contents(&FilePath::from("db.json")).unwrap()).unwrap();
    assert_eq!(written, json!({"tags": [{"name": "rust", "id": 1}]}));
    assert_eq!(body_json(&get(&surface, "/tags/1")), json!({"name": "rust", "id": 1}));
}
