use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use mockrest_base::pal::http::{HttpMethod, HttpResponse, HttpStatusCode};
use mockrest_base::{ErrorKind, FilePath, MockrestError, MockrestResult, PalHandle, ResultExt};

use crate::config::Options;
use crate::router::{QueryParams, RenderContext};

/* 📖 # Why an explicit rule table for template keys?

Which template renders a response depends only on the verb and on how many
segments the path has (`/posts` is a listing, `/posts/1` a single record). The
rules are listed as data so the lookup has exactly two outcomes: a key, or "no
rule for this shape". A missing rule and a rule whose key has no configured
template are reported as different faults.
*/

/// Logical template slot derived from verb and path depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Post,
    GetAll,
    Get,
    Put,
    Delete,
}

impl TemplateKey {
    /// The key as written in the options' template table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::GetAll => "GET-ALL",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Depth {
    Exactly(usize),
    AtLeast(usize),
}

impl Depth {
    fn admits(self, segments: usize) -> bool {
        match self {
            Depth::Exactly(n) => segments == n,
            Depth::AtLeast(n) => segments >= n,
        }
    }
}

// Segment counts include the empty segment before the leading slash: `/posts` has 2.
const TEMPLATE_RULES: &[(HttpMethod, Depth, TemplateKey)] = &[
    (HttpMethod::Post, Depth::AtLeast(2), TemplateKey::Post),
    (HttpMethod::Get, Depth::Exactly(2), TemplateKey::GetAll),
    (HttpMethod::Get, Depth::AtLeast(3), TemplateKey::Get),
    (HttpMethod::Put, Depth::AtLeast(3), TemplateKey::Put),
    (HttpMethod::Delete, Depth::AtLeast(3), TemplateKey::Delete),
];

/// Split a path into segments after stripping one trailing slash.
/// `/posts/1/` yields `["", "posts", "1"]`.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.strip_suffix('/').unwrap_or(path).split('/').collect()
}

/// The template key for a request shape, or None if no rule covers it.
pub fn template_key(method: HttpMethod, path: &str) -> Option<TemplateKey> {
    let segments = path_segments(path).len();
    TEMPLATE_RULES
        .iter()
        .find(|(rule_method, depth, _)| *rule_method == method && depth.admits(segments))
        .map(|(_, _, key)| *key)
}

/// Turns a finished render context into an HTTP response.
#[derive(Debug, Clone)]
pub struct Renderer {
    options: Arc<Options>,
    pal: PalHandle,
}

impl Renderer {
    pub fn new(options: Arc<Options>, pal: PalHandle) -> Self {
        Self { options, pal }
    }

    /// Render the context's result, as JSON(P) or through a template in hypermedia mode.
    ///
    /// The status defaults to 200 and headers set by handlers are carried over.
    /// A context without a result renders as an empty object.
    #[instrument(skip_all, fields(method = %ctx.method(), path = ctx.path()))]
    pub fn render(&self, ctx: &RenderContext) -> MockrestResult<HttpResponse> {
        let empty = Value::Object(Map::new());
        let data = ctx.data().unwrap_or(&empty);
        let status = ctx.status().unwrap_or(HttpStatusCode::Ok);

        let response = if self.options.hypermedia {
            self.render_template(ctx, data)?
                .with_status(status)
        } else {
            jsonp_response(ctx.query(), data, status)?
        };
        Ok(response.with_headers(ctx.response_headers()))
    }

    fn render_template(&self, ctx: &RenderContext, data: &Value) -> MockrestResult<HttpResponse> {
        let segments = path_segments(ctx.path());
        let resource = segments.get(1).copied().unwrap_or_default();
        let key = template_key(ctx.method(), ctx.path()).ok_or_else(|| {
            ErrorKind::NoTemplateRoute {
                method: ctx.method().to_string(),
                path: ctx.path().to_string(),
            }
        })?;
        let template_path = self.options.template_path(resource, key).ok_or_else(|| {
            ErrorKind::UnmappedTemplate {
                resource: resource.to_string(),
                template_key: key.to_string(),
            }
        })?;
        debug!(resource, %key, template_path, "rendering template");

        let source = self
            .pal
            .read_file_to_string(&FilePath::from(template_path))
            .with_context(|| format!("Failed to load template for {} {}", resource, key))?;
        let html = render_template_source(template_path, &source, data)?;
        Ok(HttpResponse::ok()
            .with_content_type("text/html; charset=utf-8")
            .with_body(html))
    }
}

fn render_template_source(name: &str, source: &str, top: &Value) -> MockrestResult<String> {
    let template_error = |e: minijinja::Error| -> Box<MockrestError> {
        ErrorKind::Template {
            path: name.to_string(),
            message: e.to_string(),
        }
        .into()
    };
    let mut env = minijinja::Environment::new();
    env.add_template(name, source).map_err(template_error)?;
    let template = env.get_template(name).map_err(template_error)?;
    template
        .render(minijinja::context! { top => top })
        .map_err(template_error)
}

/// Serialize `value` as pretty JSON, or as a JSONP call when the query has a `callback`.
pub fn jsonp_response(
    query: &QueryParams,
    value: &Value,
    status: HttpStatusCode,
) -> MockrestResult<HttpResponse> {
    let json = serde_json::to_string_pretty(value)?;
    let callback = query.get("callback").map(sanitize_callback);
    let response = match callback {
        Some(callback) if !callback.is_empty() => {
            let json = json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029");
            HttpResponse::ok()
                .with_content_type("text/javascript; charset=utf-8")
                .with_header("X-Content-Type-Options", "nosniff")
                .with_body(format!(
                    "/**/ typeof {0} === 'function' && {0}({1});",
                    callback, json
                ))
        }
        _ => HttpResponse::json(json),
    };
    Ok(response.with_status(status))
}

fn sanitize_callback(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
        .collect()
}
