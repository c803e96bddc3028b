//! Dependency-ordered loading.
//!
//! The order is derived mechanically from the reference rules in
//! [`crate::relationships`]: an entity runs only after every entity it
//! references has been transformed and committed. Each entity's documents
//! are inserted as soon as its transformer finishes.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::{DocumentSink, EntityType, SourceReader};
use crate::error::{MigrateError, Result};
use crate::relationships::{self, EntitySpec, RELATIONSHIPS};
use crate::remap::RemapContext;
use crate::transform::{transformer_for, SkippedRow, SourceTables, TransformOutput};

/// Reference graph over a set of entity declarations.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    specs: Vec<&'static EntitySpec>,
}

impl DependencyGraph {
    /// Build a graph, rejecting inconsistent declarations.
    pub fn new(specs: &[&'static EntitySpec]) -> Result<Self> {
        relationships::validate(specs)?;
        Ok(Self {
            specs: specs.to_vec(),
        })
    }

    /// Graph of the built-in declaration.
    pub fn builtin() -> Result<Self> {
        Self::new(&RELATIONSHIPS)
    }

    /// Entity types referenced by `entity`.
    pub fn dependencies(&self, entity: EntityType) -> Vec<EntityType> {
        self.specs
            .iter()
            .find(|s| s.entity == entity)
            .map(|s| s.dependencies())
            .unwrap_or_default()
    }

    /// Linear order in which every entity follows the entities it references.
    ///
    /// Ties are broken by declaration order so the result is deterministic.
    pub fn topological_order(&self) -> Result<Vec<EntityType>> {
        let n = self.specs.len();
        let index_of = |entity: EntityType| self.specs.iter().position(|s| s.entity == entity);

        // in_degree[i]: unresolved dependencies of node i.
        // dependents[j]: nodes that reference node j.
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, spec) in self.specs.iter().enumerate() {
            for dep in spec.dependencies() {
                if let Some(j) = index_of(dep) {
                    in_degree[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(self.specs[i].entity);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < n {
            let remaining: Vec<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
            return Err(MigrateError::CyclicDependency(self.find_cycle(&remaining)));
        }
        Ok(order)
    }

    /// Walk dependencies among `remaining` nodes until one repeats.
    fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
        let Some(&start) = remaining.first() else {
            return Vec::new();
        };
        let mut path: Vec<usize> = vec![start];
        let mut current = start;
        loop {
            let next = self.specs[current]
                .dependencies()
                .into_iter()
                .filter_map(|dep| self.specs.iter().position(|s| s.entity == dep))
                .find(|j| remaining.contains(j));
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.specs[i].entity.to_string())
                    .collect();
                cycle.push(self.specs[next].entity.to_string());
                return cycle;
            }
            path.push(next);
            current = next;
        }
        path.iter()
            .map(|&i| self.specs[i].entity.to_string())
            .collect()
    }
}

/// Outcome of loading one entity type.
#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity: EntityType,
    pub collection: String,
    /// Primary source rows read (documents built for the lookup bundle).
    pub source_rows: usize,
    pub documents_inserted: u64,
    pub skipped: Vec<SkippedRow>,
    pub duration_ms: u64,
}

/// Runs transformers in dependency order and commits their output.
#[derive(Debug, Clone)]
pub struct Loader {
    order: Vec<EntityType>,
    batch_size: usize,
}

impl Loader {
    /// Loader over the built-in declaration.
    pub fn new(batch_size: usize) -> Result<Self> {
        let order = DependencyGraph::builtin()?.topological_order()?;
        debug!("Load order: {:?}", order);
        Ok(Self::with_order(order, batch_size))
    }

    /// Loader with an explicit order. The order is still checked at run time:
    /// an entity whose dependencies have not run fails before reading.
    pub fn with_order(order: Vec<EntityType>, batch_size: usize) -> Self {
        Self {
            order,
            batch_size: batch_size.max(1),
        }
    }

    pub fn order(&self) -> &[EntityType] {
        &self.order
    }

    /// Transform and insert every entity in order.
    pub async fn run(
        &self,
        source: &dyn SourceReader,
        sink: &dyn DocumentSink,
        ctx: &mut RemapContext,
    ) -> Result<Vec<EntityReport>> {
        let mut reports = Vec::with_capacity(self.order.len());
        for entity in &self.order {
            reports.push(self.load_entity(*entity, source, sink, ctx).await?);
        }
        Ok(reports)
    }

    /// Transform one entity without writing anything.
    pub async fn transform_entity(
        &self,
        entity: EntityType,
        source: &dyn SourceReader,
        ctx: &mut RemapContext,
    ) -> Result<(usize, TransformOutput)> {
        let spec = relationships::spec_for(entity);
        ctx.ensure_complete(entity, &spec.dependencies())?;

        let mut tables = SourceTables::new();
        for table in spec.tables() {
            let rows = source.read_table(table).await?;
            debug!("{}: read {} rows from {}", entity, rows.len(), table);
            tables.insert(table, rows);
        }
        let source_rows = match spec.source_table {
            Some(table) => tables.rows(table)?.len(),
            None => 1,
        };

        let output = transformer_for(entity).transform(&tables, ctx)?;
        ctx.mark_complete(entity);
        Ok((source_rows, output))
    }

    async fn load_entity(
        &self,
        entity: EntityType,
        source: &dyn SourceReader,
        sink: &dyn DocumentSink,
        ctx: &mut RemapContext,
    ) -> Result<EntityReport> {
        let started = Instant::now();
        let collection = relationships::spec_for(entity).collection;
        info!("{}: migrating into {}", entity, collection);

        let (source_rows, output) = self.transform_entity(entity, source, ctx).await?;
        let TransformOutput {
            documents, skipped, ..
        } = output;

        let mut inserted = 0u64;
        let mut documents = documents.into_iter().peekable();
        while documents.peek().is_some() {
            let batch: Vec<_> = documents.by_ref().take(self.batch_size).collect();
            inserted += sink.bulk_insert(collection, batch).await?;
        }

        if !skipped.is_empty() {
            warn!("{}: {} rows skipped", entity, skipped.len());
        }
        info!(
            "{}: completed ({} documents from {} rows)",
            entity, inserted, source_rows
        );

        Ok(EntityReport {
            entity,
            collection: collection.to_string(),
            source_rows,
            documents_inserted: inserted,
            skipped,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::{fixtures, MemorySink, MemorySource};
    use crate::relationships::{
        ReferenceRule, Requirement, ADVISORS, CLIENTS, LABS, PRODUCTS, SALES, SUPPLIERS, SUPPLIES,
    };

    #[test]
    fn test_builtin_order_is_topological() {
        let graph = DependencyGraph::builtin().unwrap();
        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), EntityType::ALL.len());
        for (pos, entity) in order.iter().enumerate() {
            for dep in graph.dependencies(*entity) {
                let dep_pos = order.iter().position(|e| *e == dep).unwrap();
                assert!(dep_pos < pos, "{entity} runs before its dependency {dep}");
            }
        }
    }

    #[test]
    fn test_builtin_order_is_declaration_order() {
        let order = DependencyGraph::builtin().unwrap().topological_order().unwrap();
        assert_eq!(order, EntityType::ALL.to_vec());
    }

    #[test]
    fn test_ties_broken_by_declaration_order() {
        let graph = DependencyGraph::new(&[
            &SALES, &CLIENTS, &ADVISORS, &SUPPLIERS, &LABS, &SUPPLIES, &PRODUCTS,
        ])
        .unwrap();
        let order = graph.topological_order().unwrap();
        assert_eq!(
            order,
            vec![
                EntityType::Client,
                EntityType::Advisor,
                EntityType::Supplier,
                EntityType::Lab,
                EntityType::Supply,
                EntityType::Product,
                EntityType::Sale,
            ]
        );
    }

    #[test]
    fn test_cycle_detected() {
        static A: EntitySpec = EntitySpec {
            entity: EntityType::Sale,
            source_table: Some("Compra"),
            key_column: "id_compra",
            collection: "ventas",
            children: &[],
            lookups: &[],
            references: &[ReferenceRule {
                field: "devolucion_ref",
                column: "id_devolucion",
                via: None,
                target: EntityType::Return,
                requirement: Requirement::Optional,
            }],
        };
        static B: EntitySpec = EntitySpec {
            entity: EntityType::Return,
            source_table: Some("Devolucion"),
            key_column: "id_devolucion",
            collection: "devoluciones",
            children: &[],
            lookups: &[],
            references: &[ReferenceRule {
                field: "venta_ref",
                column: "id_compra",
                via: None,
                target: EntityType::Sale,
                requirement: Requirement::Required,
            }],
        };
        let graph = DependencyGraph::new(&[&CLIENTS, &A, &B]).unwrap();
        match graph.topological_order().unwrap_err() {
            MigrateError::CyclicDependency(path) => {
                assert_eq!(path, vec!["sale", "return", "sale"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sales_before_clients_is_unresolved() {
        let source = fixtures::optica_source();
        let sink = MemorySink::new();
        let mut ctx = RemapContext::new();

        let wrong = Loader::with_order(vec![EntityType::Sale, EntityType::Client], 100);
        let err = wrong.run(&source, &sink, &mut ctx).await.unwrap_err();
        assert!(matches!(err, MigrateError::UnresolvedReference { .. }));
        assert_eq!(sink.count_sync("ventas"), 0);
    }

    #[tokio::test]
    async fn test_sale_succeeds_in_dependency_order() {
        let source = fixtures::optica_source();
        let sink = MemorySink::new();
        let mut ctx = RemapContext::new();

        let loader = Loader::new(100).unwrap();
        let reports = loader.run(&source, &sink, &mut ctx).await.unwrap();
        let sales = reports
            .iter()
            .find(|r| r.entity == EntityType::Sale)
            .unwrap();
        assert!(sales.skipped.is_empty());
        assert_eq!(sales.documents_inserted as usize, sales.source_rows);
        assert_eq!(sink.count_sync("ventas"), sales.source_rows);
    }

    #[tokio::test]
    async fn test_every_dependency_complete_before_entity_starts() {
        let source = fixtures::optica_source();
        let loader = Loader::new(100).unwrap();
        let mut ctx = RemapContext::new();
        for entity in loader.order() {
            for dep in relationships::spec_for(*entity).dependencies() {
                assert!(ctx.is_complete(dep));
            }
            loader.transform_entity(*entity, &source, &mut ctx).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let source = fixtures::optica_source();
        let sink = MemorySink::new();
        let mut ctx = RemapContext::new();

        let loader = Loader::with_order(vec![EntityType::Client], 1);
        let reports = loader.run(&source, &sink, &mut ctx).await.unwrap();
        assert_eq!(sink.insert_calls("clientes"), reports[0].source_rows);
    }

    #[tokio::test]
    async fn test_missing_table_is_fatal() {
        let source = MemorySource::new();
        let sink = MemorySink::new();
        let mut ctx = RemapContext::new();
        let loader = Loader::with_order(vec![EntityType::Client], 10);
        let err = loader.run(&source, &sink, &mut ctx).await.unwrap_err();
        assert!(matches!(err, MigrateError::SourceUnavailable { .. }));
    }
}
