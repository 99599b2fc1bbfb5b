use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use mockrest_base::pal::http::{HttpBody, HttpMethod, HttpResponse, HttpStatusCode};
use mockrest_base::{MockrestError, MockrestResult, ResultExt};

use crate::document::json_type_name;
use crate::render::{Renderer, jsonp_response};
use crate::store::StoreHandle;
use crate::store::identity::empty_object;

use super::{QueryParams, RenderContext, Stage};

const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// Lets a POST act as another verb via `X-HTTP-Method-Override`.
#[derive(Debug, Default)]
pub struct MethodOverride;

impl Stage for MethodOverride {
    fn name(&self) -> &str {
        "method-override"
    }

    fn handle(&self, ctx: &mut RenderContext, _path: &str) -> MockrestResult<()> {
        if ctx.method() != HttpMethod::Post {
            return Ok(());
        }
        let Some(requested) = ctx.header(METHOD_OVERRIDE_HEADER).map(str::to_string) else {
            return Ok(());
        };
        match HttpMethod::parse(&requested) {
            Some(method) => {
                debug!(%method, "overriding request method");
                ctx.set_method(method);
            }
            None => warn!(requested, "ignoring unknown override method"),
        }
        Ok(())
    }
}

/// Decodes JSON and urlencoded request bodies into the context body.
///
/// Bodies of other content types, and empty bodies, decode to `{}`.
#[derive(Debug, Default)]
pub struct BodyDecoder;

impl Stage for BodyDecoder {
    fn name(&self) -> &str {
        "body-decoder"
    }

    fn handle(&self, ctx: &mut RenderContext, _path: &str) -> MockrestResult<()> {
        let media_type = ctx
            .header("content-type")
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let raw = ctx.raw_body();

        let body = if raw.is_empty() {
            empty_object()
        } else if media_type == "application/json" || media_type.ends_with("+json") {
            decode_json(raw)?
        } else if media_type == "application/x-www-form-urlencoded" {
            QueryParams::parse(&String::from_utf8_lossy(raw.as_bytes())).to_json()
        } else {
            debug!(media_type, "ignoring body of unsupported content type");
            empty_object()
        };
        ctx.set_body(body);
        Ok(())
    }
}

fn decode_json(raw: &HttpBody) -> MockrestResult<Value> {
    let parsed: MockrestResult<Value> = serde_json::from_slice(raw.as_bytes()).map_err(Into::into);
    match parsed.context("Failed to decode JSON request body")? {
        value @ (Value::Object(_) | Value::Array(_)) => Ok(value),
        other => Err(mockrest_base::err!(
            "A JSON request body must be an object or an array, got {}",
            json_type_name(&other)
        )),
    }
}

/// `GET /db`: the whole document.
#[derive(Debug)]
pub struct DatabaseSnapshot {
    store: StoreHandle,
}

impl DatabaseSnapshot {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

impl Stage for DatabaseSnapshot {
    fn name(&self) -> &str {
        "db"
    }

    fn handle(&self, ctx: &mut RenderContext, path: &str) -> MockrestResult<()> {
        if ctx.method() != HttpMethod::Get || !(path.is_empty() || path == "/") {
            return Ok(());
        }
        let document = self.store.state().into_value();
        let response = jsonp_response(ctx.query(), &document, HttpStatusCode::Ok)?;
        ctx.respond(response);
        Ok(())
    }
}

/// Last regular stage: answers 404 `{}` when no router attached a result, then renders.
#[derive(Debug)]
pub struct Fallback {
    renderer: Arc<Renderer>,
}

impl Fallback {
    pub fn new(renderer: Arc<Renderer>) -> Self {
        Self { renderer }
    }
}

impl Stage for Fallback {
    fn name(&self) -> &str {
        "fallback"
    }

    fn handle(&self, ctx: &mut RenderContext, _path: &str) -> MockrestResult<()> {
        if ctx.data().is_none() {
            warn!(method = %ctx.method(), path = ctx.path(), "no resource matched");
            ctx.set_status(HttpStatusCode::NotFound);
            ctx.set_data(empty_object());
        }
        let response = self.renderer.render(ctx)?;
        ctx.respond(response);
        Ok(())
    }
}

/// Terminal stage: turns any failure into a 500 carrying the diagnostic trace.
#[derive(Debug, Default)]
pub struct ErrorStage;

impl ErrorStage {
    pub fn respond(&self, error: &MockrestError) -> HttpResponse {
        if error.is_configuration_fault() {
            error!(error = %error, "configuration fault while handling request");
        } else {
            error!(error = %error, "request failed");
        }
        HttpResponse::internal_error()
            .with_content_type("text/plain; charset=utf-8")
            .with_body(format!("{:?}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockrest_base::ErrorKind;
    use mockrest_base::pal::http::HttpRequest;
    use serde_json::json;

    fn run(stage: &dyn Stage, request: HttpRequest) -> MockrestResult<RenderContext> {
        let mut ctx = RenderContext::from_request(request);
        stage.handle(&mut ctx, "")?;
        Ok(ctx)
    }

    #[test]
    fn test_method_override_on_post() {
        let request = HttpRequest::new(HttpMethod::Post, "/posts/1")
            .with_header("X-HTTP-Method-Override", "delete");
        let ctx = run(&MethodOverride, request).unwrap();
        assert_eq!(ctx.method(), HttpMethod::Delete);
    }

    #[test]
    fn test_method_override_ignored_on_get() {
        let request = HttpRequest::new(HttpMethod::Get, "/posts/1")
            .with_header("X-HTTP-Method-Override", "DELETE");
        let ctx = run(&MethodOverride, request).unwrap();
        assert_eq!(ctx.method(), HttpMethod::Get);
    }

    #[test]
    fn test_body_decoder_json() {
        let request = HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(r#"{"title": "a"}"#);
        let ctx = run(&BodyDecoder, request).unwrap();
        assert_eq!(ctx.body(), &json!({"title": "a"}));
    }

    #[test]
    fn test_body_decoder_form() {
        let request = HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("title=hello+world&tag=a&tag=b");
        let ctx = run(&BodyDecoder, request).unwrap();
        assert_eq!(ctx.body(), &json!({"title": "hello world", "tag": ["a", "b"]}));
    }

    #[test]
    fn test_body_decoder_defaults_to_empty_object() {
        let empty = HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/json");
        assert_eq!(run(&BodyDecoder, empty).unwrap().body(), &json!({}));

        let text = HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "text/plain")
            .with_body("hello");
        assert_eq!(run(&BodyDecoder, text).unwrap().body(), &json!({}));
    }

    #[test]
    fn test_body_decoder_invalid_json() {
        let request = HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/json")
            .with_body("{oops");
        let error = run(&BodyDecoder, request).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Json { .. }));
        assert!(
            error
                .to_string()
                .starts_with("Failed to decode JSON request body: Invalid JSON")
        );
    }

    #[test]
    fn test_body_decoder_rejects_scalar_json() {
        let request = HttpRequest::new(HttpMethod::Post, "/posts")
            .with_header("Content-Type", "application/json")
            .with_body("42");
        let error = run(&BodyDecoder, request).unwrap_err();
        assert_eq!(
            error.to_string(),
            "A JSON request body must be an object or an array, got number"
        );
    }

    #[test]
    fn test_error_stage_body_is_debug_trace() {
        let error = MockrestError::message("boom").context("in stage plural");
        let response = ErrorStage.respond(&error);

        assert_eq!(response.status(), HttpStatusCode::InternalServerError);
        assert_eq!(
            response.body().as_string().unwrap(),
            "boom\n└─ in stage plural\n"
        );
    }
}
