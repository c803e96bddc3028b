//! Relational key to document identifier remapping.
//!
//! A [`RemapContext`] is created per migration run and passed explicitly to
//! every transformer, so concurrent runs (tests included) never share state.

use std::collections::{HashMap, HashSet};

use mongodb::bson::oid::ObjectId;
use tracing::debug;

use crate::core::EntityType;
use crate::error::{MigrateError, Result};

/// Mapping from relational primary key to generated identifier for one
/// entity type.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    ids: HashMap<i64, ObjectId>,
}

impl RemapTable {
    /// Identifier for a key, if allocated.
    pub fn get(&self, key: i64) -> Option<ObjectId> {
        self.ids.get(&key).copied()
    }

    /// Whether `id` was generated by this table.
    pub fn contains_id(&self, id: &ObjectId) -> bool {
        self.ids.values().any(|v| v == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Per-run remapping state for every entity type.
#[derive(Debug, Default)]
pub struct RemapContext {
    tables: HashMap<EntityType, RemapTable>,
    complete: HashSet<EntityType>,
}

impl RemapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier for `(entity, key)`, generating one on first use.
    ///
    /// Idempotent: the same pair always yields the same identifier.
    pub fn allocate(&mut self, entity: EntityType, key: i64) -> ObjectId {
        *self
            .tables
            .entry(entity)
            .or_default()
            .ids
            .entry(key)
            .or_insert_with(ObjectId::new)
    }

    /// Identifier previously allocated for `(entity, key)`.
    ///
    /// Fails with `UnresolvedReference` when nothing was allocated; `field`
    /// names the referencing document field for the report.
    pub fn resolve(&self, entity: EntityType, key: i64, field: &str) -> Result<ObjectId> {
        self.tables
            .get(&entity)
            .and_then(|t| t.get(key))
            .ok_or_else(|| MigrateError::UnresolvedReference {
                entity: entity.to_string(),
                key,
                field: field.to_string(),
            })
    }

    /// Mark an entity's table as complete; it is read-only from here on.
    pub fn mark_complete(&mut self, entity: EntityType) {
        debug!(
            "Remap table for {} complete ({} keys)",
            entity,
            self.table(entity).map(RemapTable::len).unwrap_or(0)
        );
        self.complete.insert(entity);
    }

    /// Whether the entity's transformer has processed every source row.
    pub fn is_complete(&self, entity: EntityType) -> bool {
        self.complete.contains(&entity)
    }

    /// Fail unless every entity in `deps` is complete.
    ///
    /// A failure here means a transformer is about to run before one of its
    /// reference targets: an ordering bug, not a data problem.
    pub fn ensure_complete(&self, entity: EntityType, deps: &[EntityType]) -> Result<()> {
        match deps.iter().find(|dep| !self.is_complete(**dep)) {
            Some(dep) => Err(MigrateError::UnresolvedReference {
                entity: dep.to_string(),
                key: 0,
                field: format!("{} (remap table not complete)", entity),
            }),
            None => Ok(()),
        }
    }

    /// Remap table for an entity, if any key was allocated.
    pub fn table(&self, entity: EntityType) -> Option<&RemapTable> {
        self.tables.get(&entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_idempotent() {
        let mut ctx = RemapContext::new();
        let first = ctx.allocate(EntityType::Client, 7);
        let second = ctx.allocate(EntityType::Client, 7);
        assert_eq!(first, second);
        assert_eq!(ctx.table(EntityType::Client).unwrap().len(), 1);
    }

    #[test]
    fn test_keys_scoped_per_entity() {
        let mut ctx = RemapContext::new();
        let client = ctx.allocate(EntityType::Client, 1);
        let advisor = ctx.allocate(EntityType::Advisor, 1);
        assert_ne!(client, advisor);
    }

    #[test]
    fn test_resolve_before_allocate_fails() {
        let ctx = RemapContext::new();
        let err = ctx
            .resolve(EntityType::Client, 7, "cliente_ref")
            .unwrap_err();
        match err {
            MigrateError::UnresolvedReference { entity, key, field } => {
                assert_eq!(entity, "client");
                assert_eq!(key, 7);
                assert_eq!(field, "cliente_ref");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_after_allocate() {
        let mut ctx = RemapContext::new();
        let id = ctx.allocate(EntityType::Product, 3);
        assert_eq!(ctx.resolve(EntityType::Product, 3, "producto_ref").unwrap(), id);
        assert!(ctx.table(EntityType::Product).unwrap().contains_id(&id));
    }

    #[test]
    fn test_ensure_complete() {
        let mut ctx = RemapContext::new();
        ctx.allocate(EntityType::Client, 1);
        assert!(ctx
            .ensure_complete(EntityType::Sale, &[EntityType::Client])
            .is_err());
        ctx.mark_complete(EntityType::Client);
        assert!(ctx
            .ensure_complete(EntityType::Sale, &[EntityType::Client])
            .is_ok());
        // An empty source table still completes its remap table.
        ctx.mark_complete(EntityType::Advisor);
        assert!(ctx.is_complete(EntityType::Advisor));
        assert!(ctx.table(EntityType::Advisor).is_none());
    }
}
