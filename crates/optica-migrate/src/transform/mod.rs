//! Entity transformers: relational rows in, target documents out.
//!
//! Every transformer follows the same shape:
//!
//! 1. take the entity's primary rows from [`SourceTables`]
//! 2. group each declared child table by foreign key (linear in child rows)
//! 3. per primary row: build scalar fields, embedded lists and references
//! 4. allocate the row's identifier and return the documents
//!
//! Row-level failures (unresolved required reference, missing lookup row,
//! malformed row) are caught at the row boundary: the row is dropped and
//! recorded in [`TransformOutput::skipped`], and the transformer continues.
//! The identifier is allocated only once the document built successfully, so
//! a dropped row never leaves an identifier for others to point at.

mod catalogs;
mod clinical;
mod inventory;
mod organizations;
mod people;
mod sales;
mod scheduling;

use std::collections::{HashMap, HashSet};

use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{EntityType, SourceRow};
use crate::error::{MigrateError, Result};
use crate::relationships::{ChildRule, EntitySpec, Requirement};
use crate::remap::RemapContext;

pub use catalogs::CatalogsTransformer;
pub use clinical::ExamTransformer;
pub use inventory::{ProductTransformer, SupplyTransformer};
pub use organizations::{LabTransformer, SupplierTransformer};
pub use people::{AdvisorTransformer, ClientTransformer, SpecialistTransformer};
pub use sales::{ReturnTransformer, SaleTransformer};
pub use scheduling::AppointmentTransformer;

/// Turns the rows of one entity type into documents.
pub trait Transformer: Send + Sync {
    /// Declared relationships of the entity this transformer produces.
    fn spec(&self) -> &'static EntitySpec;

    /// Transform every primary row.
    ///
    /// References are resolved against `ctx`, which must already hold the
    /// complete remap tables of every dependency.
    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput>;
}

/// Transformer for an entity type.
pub fn transformer_for(entity: EntityType) -> Box<dyn Transformer> {
    match entity {
        EntityType::Catalogs => Box::new(CatalogsTransformer),
        EntityType::Client => Box::new(ClientTransformer),
        EntityType::Advisor => Box::new(AdvisorTransformer),
        EntityType::Specialist => Box::new(SpecialistTransformer),
        EntityType::Supplier => Box::new(SupplierTransformer),
        EntityType::Lab => Box::new(LabTransformer),
        EntityType::Supply => Box::new(SupplyTransformer),
        EntityType::Product => Box::new(ProductTransformer),
        EntityType::Appointment => Box::new(AppointmentTransformer),
        EntityType::Exam => Box::new(ExamTransformer),
        EntityType::Sale => Box::new(SaleTransformer),
        EntityType::Return => Box::new(ReturnTransformer),
    }
}

/// A primary row that was dropped from the output.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRow {
    pub entity: EntityType,
    /// Relational key, when it could be read.
    pub key: Option<i64>,
    pub reason: String,
}

/// Documents produced by one transformer run.
#[derive(Debug)]
pub struct TransformOutput {
    pub entity: EntityType,
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedRow>,
}

impl TransformOutput {
    pub fn new(entity: EntityType) -> Self {
        Self {
            entity,
            documents: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

// =============================================================================
// Source tables
// =============================================================================

/// Rows of every table one transformer needs, keyed by table name.
#[derive(Debug, Default)]
pub struct SourceTables {
    tables: HashMap<String, Vec<SourceRow>>,
}

impl SourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table's rows.
    pub fn insert(&mut self, table: impl Into<String>, rows: Vec<SourceRow>) {
        self.tables.insert(table.into(), rows);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, table: impl Into<String>, rows: Vec<SourceRow>) -> Self {
        self.insert(table, rows);
        self
    }

    /// Rows of a table that was loaded.
    pub fn rows(&self, table: &str) -> Result<&[SourceRow]> {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| MigrateError::source(table, "table was not loaded"))
    }

    /// Group a child table by its foreign key, preserving source order.
    pub fn children(&self, rule: &ChildRule) -> Result<Children<'_>> {
        let mut groups: HashMap<i64, Vec<&SourceRow>> = HashMap::new();
        for row in self.rows(rule.table)? {
            match row.opt_int(rule.foreign_key) {
                Some(fk) => groups.entry(fk).or_default().push(row),
                None => debug!("{}: row without {} ignored", rule.table, rule.foreign_key),
            }
        }
        Ok(Children { groups })
    }

    /// Index a table by a key column. The first row per key wins.
    pub fn lookup(&self, table: &'static str, key: &str) -> Result<Lookup<'_>> {
        let mut rows: HashMap<i64, &SourceRow> = HashMap::new();
        for row in self.rows(table)? {
            if let Some(k) = row.opt_int(key) {
                rows.entry(k).or_insert(row);
            }
        }
        Ok(Lookup { table, rows })
    }
}

/// Child rows grouped by parent key.
#[derive(Debug)]
pub struct Children<'a> {
    groups: HashMap<i64, Vec<&'a SourceRow>>,
}

impl<'a> Children<'a> {
    /// All children of a parent; empty when it has none.
    pub fn of(&self, parent: i64) -> &[&'a SourceRow] {
        self.groups.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first child of a parent, for at-most-one relationships.
    pub fn one(&self, parent: i64) -> Option<&'a SourceRow> {
        self.of(parent).first().copied()
    }
}

/// A table indexed by key.
#[derive(Debug)]
pub struct Lookup<'a> {
    table: &'static str,
    rows: HashMap<i64, &'a SourceRow>,
}

impl<'a> Lookup<'a> {
    /// Row for a key; a miss drops the row being transformed.
    pub fn get(&self, key: i64) -> Result<&'a SourceRow> {
        self.rows
            .get(&key)
            .copied()
            .ok_or_else(|| MigrateError::MissingLookup {
                table: self.table.to_string(),
                key,
            })
    }

    /// Row referenced by `column` of `row`.
    pub fn get_by(&self, row: &SourceRow, column: &str) -> Result<&'a SourceRow> {
        self.get(row.require_int(column)?)
    }
}

// =============================================================================
// Shared row driver
// =============================================================================

/// Run `build` over every primary row of `spec`.
///
/// `build` returns the document body; `_id` is allocated and prepended here
/// only when the body built successfully.
pub(crate) fn transform_rows<F>(
    spec: &'static EntitySpec,
    tables: &SourceTables,
    ctx: &mut RemapContext,
    mut build: F,
) -> Result<TransformOutput>
where
    F: FnMut(&SourceRow, i64, &RemapContext) -> Result<Document>,
{
    let table = spec
        .source_table
        .ok_or_else(|| MigrateError::Config(format!("{} has no source table", spec.entity)))?;
    let rows = tables.rows(table)?;

    let mut output = TransformOutput::new(spec.entity);
    output.documents.reserve(rows.len());
    let mut seen: HashSet<i64> = HashSet::with_capacity(rows.len());

    for row in rows {
        let result = row.key(spec.key_column).and_then(|key| {
            if !seen.insert(key) {
                return Err(MigrateError::invalid_row(
                    table,
                    format!("duplicate {} {}", spec.key_column, key),
                ));
            }
            build(row, key, ctx).map(|body| (key, body))
        });

        match result {
            Ok((key, body)) => {
                let id = ctx.allocate(spec.entity, key);
                output.documents.push(with_id(id, body));
            }
            Err(e) if e.is_row_level() => {
                let key = row.key(spec.key_column).ok();
                warn!("{}: skipping row {:?}: {}", spec.entity, key, e);
                output.skipped.push(SkippedRow {
                    entity: spec.entity,
                    key,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    debug!(
        "{}: {} documents, {} rows skipped",
        spec.entity,
        output.documents.len(),
        output.skipped.len()
    );
    Ok(output)
}

fn with_id(id: ObjectId, body: Document) -> Document {
    let mut document = doc! { "_id": id };
    document.extend(body);
    document
}

/// Resolve the reference rule `field` of `spec` from `row` into `target`.
///
/// Required: a NULL or unallocated key fails the row. Optional: a NULL or
/// unallocated key leaves the field absent.
pub(crate) fn set_reference(
    target: &mut Document,
    spec: &EntitySpec,
    field: &str,
    row: &SourceRow,
    ctx: &RemapContext,
) -> Result<()> {
    let rule = spec.reference(field)?;
    let key = match row.opt_int(rule.column) {
        Some(key) => key,
        None if rule.requirement == Requirement::Required => {
            return Err(MigrateError::invalid_row(
                row.table(),
                format!("required reference column {} is null", rule.column),
            ))
        }
        None => return Ok(()),
    };

    match ctx.resolve(rule.target, key, rule.field) {
        Ok(id) => {
            target.insert(rule.field, id);
            Ok(())
        }
        Err(e) if rule.requirement == Requirement::Required => Err(e),
        Err(_) => {
            debug!(
                "{}: optional {} -> {} key {} not migrated, omitted",
                spec.entity, rule.field, rule.target, key
            );
            Ok(())
        }
    }
}
