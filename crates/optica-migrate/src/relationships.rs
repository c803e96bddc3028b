//! Embed-vs-reference policy for every migrated entity.
//!
//! The policy is data, not code: each [`EntitySpec`] lists the child tables
//! folded into the parent document, the lookup tables consulted by key, and
//! the references resolved through the remapper. The loader derives the
//! dependency graph from the reference rules and sorts it mechanically.

use crate::core::EntityType;
use crate::error::{MigrateError, Result};

/// How child rows are folded into the parent document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    /// Ordered list; empty when the parent has no children.
    List,
    /// At most one child; the field is omitted when there is none.
    One,
}

/// Whether an unresolved reference fails the row or is simply omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// A child table grouped by foreign key and embedded in the parent.
#[derive(Debug, Clone, Copy)]
pub struct ChildRule {
    pub table: &'static str,
    pub foreign_key: &'static str,
    pub field: &'static str,
    pub embedding: Embedding,
}

/// A small table indexed by its key and copied into documents by value.
#[derive(Debug, Clone, Copy)]
pub struct LookupRule {
    pub table: &'static str,
    pub key: &'static str,
}

/// A foreign key rewritten into a generated document identifier.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceRule {
    /// Document field receiving the identifier.
    pub field: &'static str,
    /// Relational column holding the foreign key.
    pub column: &'static str,
    /// Child table carrying the column, when it is not on the primary row.
    pub via: Option<&'static str>,
    pub target: EntityType,
    pub requirement: Requirement,
}

/// Everything the engine needs to know about one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntitySpec {
    pub entity: EntityType,
    /// Primary relational table; `None` for the lookup bundle.
    pub source_table: Option<&'static str>,
    pub key_column: &'static str,
    pub collection: &'static str,
    pub children: &'static [ChildRule],
    pub lookups: &'static [LookupRule],
    pub references: &'static [ReferenceRule],
}

impl EntitySpec {
    /// Every relational table the transformer reads, primary table first.
    pub fn tables(&self) -> Vec<&'static str> {
        let mut tables: Vec<&'static str> = Vec::new();
        let candidates = self
            .source_table
            .into_iter()
            .chain(self.children.iter().map(|c| c.table))
            .chain(self.lookups.iter().map(|l| l.table));
        for table in candidates {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        tables
    }

    /// Entity types this one references, without duplicates.
    pub fn dependencies(&self) -> Vec<EntityType> {
        let mut deps: Vec<EntityType> = Vec::new();
        for rule in self.references {
            if !deps.contains(&rule.target) {
                deps.push(rule.target);
            }
        }
        deps
    }

    /// Child rule by document field.
    pub fn child(&self, field: &str) -> Result<&ChildRule> {
        self.children
            .iter()
            .find(|c| c.field == field)
            .ok_or_else(|| undeclared(self.entity, "child", field))
    }

    /// Lookup rule by table.
    pub fn lookup(&self, table: &str) -> Result<&LookupRule> {
        self.lookups
            .iter()
            .find(|l| l.table == table)
            .ok_or_else(|| undeclared(self.entity, "lookup", table))
    }

    /// Reference rule by document field.
    pub fn reference(&self, field: &str) -> Result<&ReferenceRule> {
        self.references
            .iter()
            .find(|r| r.field == field)
            .ok_or_else(|| undeclared(self.entity, "reference", field))
    }
}

fn undeclared(entity: EntityType, kind: &str, name: &str) -> MigrateError {
    MigrateError::Config(format!("{} has no {} rule named {}", entity, kind, name))
}

const fn list(table: &'static str, foreign_key: &'static str, field: &'static str) -> ChildRule {
    ChildRule {
        table,
        foreign_key,
        field,
        embedding: Embedding::List,
    }
}

const fn one(table: &'static str, foreign_key: &'static str, field: &'static str) -> ChildRule {
    ChildRule {
        table,
        foreign_key,
        field,
        embedding: Embedding::One,
    }
}

const fn lookup(table: &'static str, key: &'static str) -> LookupRule {
    LookupRule { table, key }
}

const fn required(field: &'static str, column: &'static str, target: EntityType) -> ReferenceRule {
    ReferenceRule {
        field,
        column,
        via: None,
        target,
        requirement: Requirement::Required,
    }
}

const fn optional(field: &'static str, column: &'static str, target: EntityType) -> ReferenceRule {
    ReferenceRule {
        field,
        column,
        via: None,
        target,
        requirement: Requirement::Optional,
    }
}

// =============================================================================
// Lookup bundle and independent entities
// =============================================================================

pub static CATALOGS: EntitySpec = EntitySpec {
    entity: EntityType::Catalogs,
    source_table: None,
    key_column: "",
    collection: "catalogos",
    children: &[],
    lookups: &[
        lookup("Especialidad", "id_especialidad"),
        lookup("Motivo", "id_motivo"),
        lookup("TipoDiagnostico", "id_tipo_diagnostico"),
        lookup("MetodoPago", "id_metodo"),
        lookup("TipoSuministro", "id_tipo"),
        lookup("TipoProducto", "id_tipo"),
    ],
    references: &[],
};

pub static CLIENTS: EntitySpec = EntitySpec {
    entity: EntityType::Client,
    source_table: Some("Cliente"),
    key_column: "id_cliente",
    collection: "clientes",
    children: &[
        list("DireccionCliente", "id_cliente", "direcciones"),
        list("TelefonoCliente", "id_cliente", "telefonos"),
    ],
    lookups: &[],
    references: &[],
};

pub static ADVISORS: EntitySpec = EntitySpec {
    entity: EntityType::Advisor,
    source_table: Some("Asesor"),
    key_column: "id_asesor",
    collection: "asesores",
    children: &[
        list("TelefonoAsesor", "id_asesor", "telefonos"),
        list("EmailAsesor", "id_asesor", "emails"),
    ],
    lookups: &[],
    references: &[],
};

pub static SPECIALISTS: EntitySpec = EntitySpec {
    entity: EntityType::Specialist,
    source_table: Some("Especialista"),
    key_column: "id_especialista",
    collection: "especialistas",
    children: &[
        list("EspecialistaEspecialidad", "id_especialista", "especialidades"),
        list("TelefonoEspecialista", "id_especialista", "telefonos"),
        list("EmailEspecialista", "id_especialista", "emails"),
    ],
    lookups: &[lookup("Especialidad", "id_especialidad")],
    references: &[],
};

pub static SUPPLIERS: EntitySpec = EntitySpec {
    entity: EntityType::Supplier,
    source_table: Some("Proveedor"),
    key_column: "id_proveedor",
    collection: "proveedores",
    children: &[
        list("DireccionProveedor", "id_proveedor", "direcciones"),
        list("TelefonoProveedor", "id_proveedor", "telefonos"),
        list("EmailProveedor", "id_proveedor", "emails"),
    ],
    lookups: &[],
    references: &[],
};

pub static LABS: EntitySpec = EntitySpec {
    entity: EntityType::Lab,
    source_table: Some("Laboratorio"),
    key_column: "id_laboratorio",
    collection: "laboratorios",
    children: &[
        list("DireccionLaboratorio", "id_laboratorio", "direcciones"),
        list("TelefonoLaboratorio", "id_laboratorio", "telefonos"),
    ],
    lookups: &[],
    references: &[],
};

// =============================================================================
// Dependent entities
// =============================================================================

pub static SUPPLIES: EntitySpec = EntitySpec {
    entity: EntityType::Supply,
    source_table: Some("Suministro"),
    key_column: "id_suministro",
    collection: "suministros",
    children: &[],
    lookups: &[lookup("TipoSuministro", "id_tipo")],
    references: &[
        required("proveedor_ref", "id_proveedor", EntityType::Supplier),
        optional("laboratorio_ref", "id_laboratorio", EntityType::Lab),
    ],
};

pub static PRODUCTS: EntitySpec = EntitySpec {
    entity: EntityType::Product,
    source_table: Some("Producto"),
    key_column: "id_producto",
    collection: "productos",
    children: &[],
    lookups: &[lookup("TipoProducto", "id_tipo")],
    references: &[optional("suministro_ref", "id_suministro", EntityType::Supply)],
};

pub static APPOINTMENTS: EntitySpec = EntitySpec {
    entity: EntityType::Appointment,
    source_table: Some("Cita"),
    key_column: "id_cita",
    collection: "citas",
    children: &[],
    lookups: &[lookup("Motivo", "id_motivo")],
    references: &[
        required("cliente_ref", "id_cliente", EntityType::Client),
        optional("asesor_ref", "id_asesor", EntityType::Advisor),
        optional("especialista_ref", "id_especialista", EntityType::Specialist),
    ],
};

pub static EXAMS: EntitySpec = EntitySpec {
    entity: EntityType::Exam,
    source_table: Some("ExamenVista"),
    key_column: "id_examen",
    collection: "examenes",
    children: &[
        one("Diagnostico", "id_examen", "diagnostico"),
        // Keyed by the diagnosis, nested inside it.
        one("FormulaMedica", "id_diagnostico", "formula"),
    ],
    lookups: &[lookup("TipoDiagnostico", "id_tipo_diagnostico")],
    references: &[
        required("cliente_ref", "id_cliente", EntityType::Client),
        required("especialista_ref", "id_especialista", EntityType::Specialist),
        optional("cita_ref", "id_cita", EntityType::Appointment),
    ],
};

pub static SALES: EntitySpec = EntitySpec {
    entity: EntityType::Sale,
    source_table: Some("Compra"),
    key_column: "id_compra",
    collection: "ventas",
    children: &[
        list("DetalleCompra", "id_compra", "items"),
        one("Factura", "id_compra", "numero_factura"),
    ],
    lookups: &[
        lookup("MetodoPago", "id_metodo"),
        lookup("Producto", "id_producto"),
    ],
    references: &[
        required("cliente_ref", "id_cliente", EntityType::Client),
        required("asesor_ref", "id_asesor", EntityType::Advisor),
        ReferenceRule {
            field: "producto_ref",
            column: "id_producto",
            via: Some("DetalleCompra"),
            target: EntityType::Product,
            requirement: Requirement::Required,
        },
    ],
};

pub static RETURNS: EntitySpec = EntitySpec {
    entity: EntityType::Return,
    source_table: Some("Devolucion"),
    key_column: "id_devolucion",
    collection: "devoluciones",
    children: &[],
    lookups: &[lookup("DetalleCompra", "id_detalle")],
    references: &[
        ReferenceRule {
            field: "venta_ref",
            column: "id_compra",
            via: Some("DetalleCompra"),
            target: EntityType::Sale,
            requirement: Requirement::Required,
        },
        optional("asesor_ref", "id_asesor", EntityType::Advisor),
    ],
};

/// The full declaration, in [`EntityType`] order.
pub static RELATIONSHIPS: [&EntitySpec; 12] = [
    &CATALOGS,
    &CLIENTS,
    &ADVISORS,
    &SPECIALISTS,
    &SUPPLIERS,
    &LABS,
    &SUPPLIES,
    &PRODUCTS,
    &APPOINTMENTS,
    &EXAMS,
    &SALES,
    &RETURNS,
];

/// Declared spec for an entity type.
pub fn spec_for(entity: EntityType) -> &'static EntitySpec {
    RELATIONSHIPS[entity as usize]
}

/// Check that a declaration is internally consistent.
///
/// Every entity appears once and every reference targets a declared,
/// remapped entity. Cycles are the loader's concern.
pub fn validate(specs: &[&EntitySpec]) -> Result<()> {
    for (i, spec) in specs.iter().enumerate() {
        if specs[..i].iter().any(|s| s.entity == spec.entity) {
            return Err(MigrateError::Config(format!(
                "{} is declared more than once",
                spec.entity
            )));
        }
        for rule in spec.references {
            let target = specs.iter().find(|s| s.entity == rule.target);
            match target {
                None => {
                    return Err(MigrateError::Config(format!(
                        "{}.{} references undeclared entity {}",
                        spec.entity, rule.field, rule.target
                    )))
                }
                Some(t) if !t.entity.is_remapped() => {
                    return Err(MigrateError::Config(format!(
                        "{}.{} references {}, which has no identifiers",
                        spec.entity, rule.field, rule.target
                    )))
                }
                Some(_) => {}
            }
            if let Some(via) = rule.via {
                let declared = spec.children.iter().any(|c| c.table == via)
                    || spec.lookups.iter().any(|l| l.table == via);
                if !declared {
                    return Err(undeclared(spec.entity, "table", via));
                }
            }
        }
    }
    Ok(())
}
