use serde_json::Value;
use tracing::debug;

use mockrest_base::MockrestResult;
use mockrest_base::pal::http::{HttpMethod, HttpStatusCode};

use crate::document::json_type_name;
use crate::store::StoreHandle;

use super::{RenderContext, Route, Stage};

/// Routes for a single object entry, mounted at `/{name}`. Only the root path is served.
#[derive(Debug)]
pub struct SingularRouter {
    store: StoreHandle,
    name: String,
}

impl SingularRouter {
    pub fn new(store: StoreHandle, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
        }
    }

    fn object_body(&self, ctx: &RenderContext) -> MockrestResult<Value> {
        match ctx.body() {
            body @ Value::Object(_) => Ok(body.clone()),
            other => Err(mockrest_base::err!(
                "The body for \"{}\" must be a JSON object, got {}",
                self.name,
                json_type_name(other)
            )),
        }
    }

    fn replace(&self, ctx: &mut RenderContext) -> MockrestResult<()> {
        let body = self.object_body(ctx)?;
        self.store.set(&self.name, body)?;
        debug!(resource = self.name, "replaced object");
        Ok(())
    }

    fn merge(&self, ctx: &mut RenderContext) -> MockrestResult<()> {
        let Value::Object(patch) = self.object_body(ctx)? else {
            return Ok(());
        };
        self.store.mutate(|document| {
            match document.get_mut(&self.name) {
                Some(Value::Object(fields)) => fields.extend(patch),
                _ => {
                    document.insert(self.name.clone(), Value::Object(patch));
                }
            }
            Ok(())
        })?;
        debug!(resource = self.name, "merged object");
        Ok(())
    }
}

impl Stage for SingularRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, ctx: &mut RenderContext, path: &str) -> MockrestResult<()> {
        if Route::parse(path) != Some(Route::Root) {
            return Ok(());
        }
        match ctx.method() {
            HttpMethod::Get => {}
            HttpMethod::Post => {
                self.replace(ctx)?;
                ctx.set_status(HttpStatusCode::Created);
            }
            HttpMethod::Put => self.replace(ctx)?,
            HttpMethod::Patch => self.merge(ctx)?,
            _ => return Ok(()),
        }
        if let Some(current) = self.store.get(&self.name) {
            ctx.set_data(current);
        }
        Ok(())
    }
}
