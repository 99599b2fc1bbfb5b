use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use mockrest_base::MockrestResult;
use mockrest_base::pal::http::{HttpMethod, HttpStatusCode};

use crate::config::Options;
use crate::inflect;
use crate::store::StoreHandle;
use crate::store::identity::{IdentityStore, find_record, id_string, same_id};

use super::{RenderContext, Route, Stage, query};

/// CRUD routes for a collection (an array of records), mounted at `/{name}`.
#[derive(Debug)]
pub struct PluralRouter {
    store: StoreHandle,
    name: String,
    options: Arc<Options>,
}

impl PluralRouter {
    pub fn new(store: StoreHandle, name: &str, options: Arc<Options>) -> Self {
        Self {
            store,
            name: name.to_string(),
            options,
        }
    }

    fn list(&self, ctx: &mut RenderContext) -> MockrestResult<()> {
        let Some(records) = self.store.read(|document| document.collection(&self.name).cloned())
        else {
            return Ok(());
        };
        let mut records = query::list(records, ctx)?;
        for record in &mut records {
            self.inline_relations(record, ctx);
        }
        ctx.set_data(Value::Array(records));
        Ok(())
    }

    fn show(&self, ctx: &mut RenderContext, id: &str) {
        if let Some(mut record) = self.store.find_by_id(&self.name, id) {
            self.inline_relations(&mut record, ctx);
            ctx.set_data(record);
        }
    }

    fn create(&self, ctx: &mut RenderContext) -> MockrestResult<()> {
        let record = self.store.insert(&self.name, ctx.body().clone())?;
        let id = record
            .get(self.store.id_field())
            .map(id_string)
            .unwrap_or_default();
        let location = format!(
            "{}{}/{}",
            ctx.base_url(),
            ctx.original_path().trim_end_matches('/'),
            id
        );
        debug!(collection = self.name, id, "created record");
        ctx.set_response_header("Access-Control-Expose-Headers", "Location");
        ctx.set_response_header("Location", location);
        ctx.set_status(HttpStatusCode::Created);
        ctx.set_data(record);
        Ok(())
    }

    fn update(&self, ctx: &mut RenderContext, id: &str, merge: bool) -> MockrestResult<()> {
        let body = ctx.body().clone();
        let updated = if merge {
            self.store.update_by_id(&self.name, id, body)?
        } else {
            self.store.replace_by_id(&self.name, id, body)?
        };
        if let Some(record) = updated {
            ctx.set_data(record);
        }
        Ok(())
    }

    fn destroy(&self, ctx: &mut RenderContext, id: &str) -> MockrestResult<()> {
        let removed = self.store.remove_by_id(&self.name, id)?;
        let dependents = self.store.remove_dependents(&self.options)?;
        debug!(collection = self.name, id, dependents, "removed record");
        if removed.is_some() {
            ctx.set_data(serde_json::json!({}));
        }
        Ok(())
    }

    /// Apply `_embed` (child collections) and `_expand` (parent records) to a record.
    fn inline_relations(&self, record: &mut Value, ctx: &RenderContext) {
        let id_field = self.store.id_field();
        let Some(id) = record.get(id_field).cloned() else {
            return;
        };
        let embeds = ctx.query().get_all("_embed");
        let expands = ctx.query().get_all("_expand");
        if embeds.is_empty() && expands.is_empty() {
            return;
        }
        let foreign_key = self.options.foreign_key_for(&self.name);

        self.store.read(|document| {
            let Value::Object(fields) = record else {
                return;
            };
            for child in &embeds {
                if let Some(children) = document.collection(child) {
                    let matching = children
                        .iter()
                        .filter(|c| c.get(&foreign_key).is_some_and(|fk| same_id(fk, &id)))
                        .cloned()
                        .collect();
                    fields.insert(child.to_string(), Value::Array(matching));
                }
            }
            for parent in &expands {
                let parent_key = format!("{}{}", parent, self.options.foreign_key_suffix);
                let Some(parents) = document.collection(&inflect::plural(parent)) else {
                    continue;
                };
                let found = fields
                    .get(&parent_key)
                    .and_then(|parent_id| find_record(parents, id_field, &id_string(parent_id)))
                    .cloned();
                if let Some(found) = found {
                    fields.insert(parent.to_string(), found);
                }
            }
        });
    }
}

impl Stage for PluralRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, ctx: &mut RenderContext, path: &str) -> MockrestResult<()> {
        let Some(route) = Route::parse(path) else {
            return Ok(());
        };
        match (ctx.method(), route) {
            (HttpMethod::Get, Route::Root) => self.list(ctx)?,
            (HttpMethod::Post, Route::Root) => self.create(ctx)?,
            (HttpMethod::Get, Route::Item(id)) => self.show(ctx, &id),
            (HttpMethod::Put, Route::Item(id)) => self.update(ctx, &id, false)?,
            (HttpMethod::Patch, Route::Item(id)) => self.update(ctx, &id, true)?,
            (HttpMethod::Delete, Route::Item(id)) => self.destroy(ctx, &id)?,
            _ => {}
        }
        Ok(())
    }
}
