//! The fixed set of migrated entity types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every entity family the engine knows how to migrate.
///
/// Declaration order is the tie-break order used by the loader when two
/// entities have no dependency between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Singleton document aggregating the small lookup tables.
    Catalogs,
    Client,
    Advisor,
    Specialist,
    Supplier,
    Lab,
    /// Inventory intake record.
    Supply,
    /// Catalog item.
    Product,
    /// Scheduled event.
    Appointment,
    /// Composite clinical record (exam + diagnosis + prescription).
    Exam,
    /// Composite transaction record (purchase + lines + invoice).
    Sale,
    /// Returned line item.
    Return,
}

impl EntityType {
    /// All entity types in declaration order.
    pub const ALL: [EntityType; 12] = [
        EntityType::Catalogs,
        EntityType::Client,
        EntityType::Advisor,
        EntityType::Specialist,
        EntityType::Supplier,
        EntityType::Lab,
        EntityType::Supply,
        EntityType::Product,
        EntityType::Appointment,
        EntityType::Exam,
        EntityType::Sale,
        EntityType::Return,
    ];

    /// Stable lowercase name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            EntityType::Catalogs => "catalogs",
            EntityType::Client => "client",
            EntityType::Advisor => "advisor",
            EntityType::Specialist => "specialist",
            EntityType::Supplier => "supplier",
            EntityType::Lab => "lab",
            EntityType::Supply => "supply",
            EntityType::Product => "product",
            EntityType::Appointment => "appointment",
            EntityType::Exam => "exam",
            EntityType::Sale => "sale",
            EntityType::Return => "return",
        }
    }

    /// Whether documents of this type receive remapped identifiers.
    pub fn is_remapped(&self) -> bool {
        !matches!(self, EntityType::Catalogs)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
