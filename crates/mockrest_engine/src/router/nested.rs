use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use mockrest_base::MockrestResult;
use mockrest_base::pal::http::HttpMethod;

use crate::config::Options;

use super::{RenderContext, Stage};

/// Rewrites `/{parent}/{parentId}/{resource}` onto the child collection.
///
/// `GET /posts/1/comments` becomes `GET /comments?postId=1`, and
/// `POST /posts/1/comments` becomes `POST /comments` with `postId` set in the body.
#[derive(Debug)]
pub struct NestedResolver {
    options: Arc<Options>,
}

impl NestedResolver {
    pub fn new(options: Arc<Options>) -> Self {
        Self { options }
    }
}

impl Stage for NestedResolver {
    fn name(&self) -> &str {
        "nested"
    }

    fn handle(&self, ctx: &mut RenderContext, path: &str) -> MockrestResult<()> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let [parent, parent_id, resource] = segments.as_slice() else {
            return Ok(());
        };
        let foreign_key = self.options.foreign_key_for(parent);
        let parent_id = percent_encoding::percent_decode_str(parent_id)
            .decode_utf8_lossy()
            .into_owned();
        let target = format!("/{}", resource);

        match ctx.method() {
            HttpMethod::Get => {
                debug!(foreign_key, parent_id, target, "resolving nested read");
                ctx.pin_filter(foreign_key, parent_id);
            }
            HttpMethod::Post => {
                debug!(foreign_key, parent_id, target, "resolving nested create");
                if let Value::Object(body) = ctx.body_mut() {
                    body.insert(foreign_key, foreign_key_value(&parent_id));
                }
            }
            _ => return Ok(()),
        }
        ctx.set_path(target);
        Ok(())
    }
}

fn foreign_key_value(parent_id: &str) -> Value {
    parent_id
        .parse::<i64>()
        .map_or_else(|_| Value::String(parent_id.to_string()), Value::from)
}
