/* 📖 # How is a request routed?

`RoutingSurface::build` inspects the document once and lays out an ordered list of
stages:

1. method override, body decoding
2. `GET /db`
3. nested resource resolution (`/posts/1/comments` -> `/comments?postId=1`)
4. one router per top-level key, mounted at `/{key}` (singular for objects,
   plural for arrays)
5. fallback: 404 `{}` if nothing attached a result, then render

Every request walks this list in order. A mounted stage only sees requests below its
prefix. Handlers attach a result to the `RenderContext`; the first stage that sets a
response ends the walk. Any error, including a panic inside a stage, is turned into
a 500 by the error stage, and the next request is served normally.
*/

mod context;
#[cfg(test)]
mod dispatch_tests;
mod middleware;
mod nested;
mod plural;
mod query;
mod singular;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, info_span};

use mockrest_base::pal::http::{HttpRequest, HttpResponse, HttpService};
use mockrest_base::{ErrorKind, MockrestError, MockrestResult, PalHandle};

use crate::config::Options;
use crate::document::{Document, EntryShape, classify};
use crate::render::Renderer;
use crate::store::{InMemoryStore, StoreHandle};

pub use context::{QueryParams, RenderContext};
pub use middleware::{BodyDecoder, DatabaseSnapshot, ErrorStage, Fallback, MethodOverride};
pub use nested::NestedResolver;
pub use plural::PluralRouter;
pub use singular::SingularRouter;

/// One step of the request pipeline.
pub trait Stage: std::fmt::Debug + Send + Sync + 'static {
    /// Short name used in logs and error context.
    fn name(&self) -> &str;

    /// Process the request. `path` is relative to the stage's mount prefix.
    fn handle(&self, ctx: &mut RenderContext, path: &str) -> MockrestResult<()>;
}

/// A stage together with the path prefix it is mounted under.
#[derive(Debug)]
pub struct Mount {
    prefix: Option<String>,
    stage: Box<dyn Stage>,
}

impl Mount {
    /// A stage that sees every request.
    pub fn global(stage: impl Stage) -> Self {
        Self {
            prefix: None,
            stage: Box::new(stage),
        }
    }

    /// A stage that sees requests at or below `prefix`.
    pub fn at(prefix: impl Into<String>, stage: impl Stage) -> Self {
        Self {
            prefix: Some(prefix.into()),
            stage: Box::new(stage),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The path relative to this mount, or None if the mount does not apply.
    fn local_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let Some(prefix) = &self.prefix else {
            return Some(path);
        };
        let rest = path.strip_prefix(prefix.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}

/// Which router serves a mounted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Singular,
    Plural,
}

/// A document key that got its own router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedResource {
    pub name: String,
    pub kind: ResourceKind,
}

/// Relative route inside a resource router.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Root,
    Item(String),
}

impl Route {
    fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            Some(Self::Root)
        } else if trimmed.contains('/') {
            None
        } else {
            let id = percent_encoding::percent_decode_str(trimmed)
                .decode_utf8_lossy()
                .into_owned();
            Some(Self::Item(id))
        }
    }
}

/// The route table built from a document, served as an [`HttpService`].
#[derive(Debug)]
pub struct RoutingSurface {
    store: StoreHandle,
    options: Arc<Options>,
    renderer: Arc<Renderer>,
    stages: Vec<Mount>,
    resources: Vec<MountedResource>,
    error_stage: ErrorStage,
}

impl RoutingSurface {
    /// Build the route table for the store's current document.
    ///
    /// Fails with an `UnsupportedEntry` configuration fault if a top-level entry
    /// is neither an object nor an array.
    pub fn build(store: StoreHandle, options: Options, pal: PalHandle) -> MockrestResult<Self> {
        let options = Arc::new(options);
        let store = store.with_id_field(&options.id);
        let renderer = Arc::new(Renderer::new(Arc::clone(&options), pal));

        let mut stages = vec![
            Mount::global(MethodOverride),
            Mount::global(BodyDecoder),
            Mount::at("/db", DatabaseSnapshot::new(store.clone())),
            Mount::global(NestedResolver::new(Arc::clone(&options))),
        ];
        let mut resources = Vec::new();

        store
            .for_each(|value, key| {
                let prefix = format!("/{}", key);
                let kind = match classify(value) {
                    EntryShape::Singleton => {
                        stages.push(Mount::at(prefix, SingularRouter::new(store.clone(), key)));
                        ResourceKind::Singular
                    }
                    EntryShape::Collection => {
                        stages.push(Mount::at(
                            prefix,
                            PluralRouter::new(store.clone(), key, Arc::clone(&options)),
                        ));
                        ResourceKind::Plural
                    }
                    EntryShape::Unsupported { type_name } => {
                        return Err(ErrorKind::UnsupportedEntry {
                            key: key.to_string(),
                            actual_type: type_name.to_string(),
                        }
                        .into());
                    }
                };
                info!(resource = key, ?kind, "mounted resource");
                resources.push(MountedResource {
                    name: key.to_string(),
                    kind,
                });
                Ok(())
            })
            .value()?;

        stages.push(Mount::global(Fallback::new(Arc::clone(&renderer))));

        Ok(Self {
            store,
            options,
            renderer,
            stages,
            resources,
            error_stage: ErrorStage,
        })
    }

    /// Build the route table for an in-memory document.
    pub fn from_document(
        document: Document,
        options: Options,
        pal: PalHandle,
    ) -> MockrestResult<Self> {
        Self::build(StoreHandle::new(InMemoryStore::new(document)), options, pal)
    }

    /// The store shared by all routers.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// The renderer used by the fallback stage.
    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Resources mounted at build time, in document order.
    pub fn resources(&self) -> &[MountedResource] {
        &self.resources
    }

    /// Mount an additional stage after the resource routers, before the fallback.
    pub fn mount(&mut self, mount: Mount) {
        let fallback_index = self.stages.len().saturating_sub(1);
        self.stages.insert(fallback_index, mount);
    }

    /// Run a request through the pipeline. Never fails: errors become 500 responses.
    pub fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let span = info_span!("request", method = %request.method(), path = request.path());
        let _guard = span.enter();
        let description = format!("{} {}", request.method(), request.url());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(request)))
            .unwrap_or_else(|payload| Err(panic_error(payload)));
        match outcome {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "request handled");
                response
            }
            Err(error) => self
                .error_stage
                .respond(&error.context(format!("while handling {}", description))),
        }
    }

    fn run_stages(&self, request: HttpRequest) -> MockrestResult<HttpResponse> {
        let mut ctx = RenderContext::from_request(request);
        for mount in &self.stages {
            let Some(local_path) = mount.local_path(ctx.path()).map(str::to_string) else {
                continue;
            };
            mount
                .stage
                .handle(&mut ctx, &local_path)
                .map_err(|e| Box::new(e.context(format!("in stage {}", mount.stage.name()))))?;
            if let Some(response) = ctx.take_response() {
                return Ok(response);
            }
        }
        Err(mockrest_base::err!("No stage produced a response"))
    }
}

impl HttpService for RoutingSurface {
    fn handle_request(&self, request: HttpRequest) -> MockrestResult<HttpResponse> {
        Ok(self.dispatch(request))
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> Box<MockrestError> {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    mockrest_base::err!("Handler panicked: {}", message)
}
