//! In-memory state store backing stateful routes.
//!
//! Collections are named, ordered sequences of free-form records. Every
//! operation takes the store's single coarse lock, so a `create` always sees
//! the committed result of concurrent creates and the id-uniqueness invariant
//! holds without caller coordination.

use super::context::{ExecContext, Record, StateOutcome};
use crate::config::{StatefulAction, StatefulSpec};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("item not found in collection")]
    NotFound,
    #[error("item already exists")]
    Conflict,
    #[error("record is missing the id field")]
    BadInput,
}

/// Process-scoped store; survives configuration reloads.
#[derive(Debug, Default)]
pub struct StateStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
}

/// Records are matched on the string projection of their id field, so a JSON
/// number 10 and the path segment "10" compare equal.
fn project(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one CRUD action and record its outcome on the context.
    pub fn apply(&self, spec: &StatefulSpec, ctx: &mut ExecContext) -> Result<(), StateError> {
        let mut collections = self.collections.lock();
        let col = collections.entry(spec.collection.clone()).or_default();
        let id_field = spec.id_field();

        let outcome = ctx.state.get_or_insert_with(StateOutcome::default);

        match spec.action {
            StatefulAction::Create => {
                let item = ctx.body.clone();
                let id = item.get(id_field).ok_or(StateError::BadInput)?;
                let id = project(id);

                if col
                    .iter()
                    .any(|existing| existing.get(id_field).map(project).as_deref() == Some(id.as_str()))
                {
                    return Err(StateError::Conflict);
                }

                col.push(item.clone());
                outcome.created = Some(item);
                outcome.list = Some(col.clone());
            }

            StatefulAction::List => {
                outcome.list = Some(col.clone());
            }

            StatefulAction::Get => {
                let id = ctx.path.get(id_field).map(String::as_str).unwrap_or("");
                let found = col
                    .iter()
                    .find(|item| item.get(id_field).map(project).as_deref() == Some(id))
                    .ok_or(StateError::NotFound)?;
                outcome.item = Some(found.clone());
            }

            StatefulAction::Update => {
                let id = ctx.path.get(id_field).map(String::as_str).unwrap_or("");
                let found = col
                    .iter_mut()
                    .find(|item| item.get(id_field).map(project).as_deref() == Some(id))
                    .ok_or(StateError::NotFound)?;
                for (k, v) in &ctx.body {
                    found.insert(k.clone(), v.clone());
                }
                outcome.updated = Some(found.clone());
            }

            StatefulAction::Delete => {
                let id = ctx.path.get(id_field).map(String::as_str).unwrap_or("");
                let before = col.len();
                col.retain(|item| item.get(id_field).map(project).as_deref() != Some(id));
                if col.len() == before {
                    return Err(StateError::NotFound);
                }
                outcome.list = Some(col.clone());
            }
        }

        Ok(())
    }
}
