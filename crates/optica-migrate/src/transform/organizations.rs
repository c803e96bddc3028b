//! Suppliers and laboratories.

use mongodb::bson::{doc, Document};

use crate::core::SourceRow;
use crate::error::Result;
use crate::relationships::{EntitySpec, LABS, SUPPLIERS};
use crate::remap::RemapContext;

use super::{transform_rows, SourceTables, TransformOutput, Transformer};

pub struct SupplierTransformer;

impl Transformer for SupplierTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &SUPPLIERS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let direcciones = tables.children(SUPPLIERS.child("direcciones")?)?;
        let telefonos = tables.children(SUPPLIERS.child("telefonos")?)?;
        let emails = tables.children(SUPPLIERS.child("emails")?)?;

        transform_rows(&SUPPLIERS, tables, ctx, |row, key, _| {
            let emails: Vec<Document> = emails
                .of(key)
                .iter()
                .map(|e| doc! { "email": e.bson("email"), "tipo": e.bson("tipo_email") })
                .collect();
            Ok(doc! {
                "nombre": row.bson("nombre_proveedor"),
                "contacto_principal": row.bson("contacto_principal"),
                "activo": row.flag("activo"),
                "direcciones": address_list(direcciones.of(key)),
                "telefonos": phone_list(telefonos.of(key)),
                "emails": emails,
            })
        })
    }
}

pub struct LabTransformer;

impl Transformer for LabTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &LABS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let direcciones = tables.children(LABS.child("direcciones")?)?;
        let telefonos = tables.children(LABS.child("telefonos")?)?;

        transform_rows(&LABS, tables, ctx, |row, key, _| {
            Ok(doc! {
                "nombre": row.bson("nombre_laboratorio"),
                "contacto_principal": row.bson("contacto_principal"),
                "activo": row.flag("activo"),
                "direcciones": address_list(direcciones.of(key)),
                "telefonos": phone_list(telefonos.of(key)),
            })
        })
    }
}

fn address_list(rows: &[&SourceRow]) -> Vec<Document> {
    rows.iter()
        .map(|d| {
            doc! {
                "calle": d.bson("calle"),
                "ciudad": d.bson("ciudad"),
                "estado": d.bson("estado"),
                "codigo_postal": d.bson("codigo_postal"),
                "pais": d.bson("pais"),
            }
        })
        .collect()
}

// Organization phones carry an extension instead of a type.
fn phone_list(rows: &[&SourceRow]) -> Vec<Document> {
    rows.iter()
        .map(|t| doc! { "numero": t.bson("telefono"), "extension": t.bson("extension") })
        .collect()
}
