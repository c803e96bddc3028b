//! Lookup bundle: the small reference tables as one document.

use mongodb::bson::{doc, Document};

use crate::core::SourceRow;
use crate::error::Result;
use crate::relationships::{EntitySpec, CATALOGS};
use crate::remap::RemapContext;

use super::{SourceTables, TransformOutput, Transformer};

/// Fixed identifier of the single catalog document.
pub const CATALOG_DOCUMENT_ID: &str = "catalogos_optica";

pub struct CatalogsTransformer;

impl CatalogsTransformer {
    fn entries<F>(tables: &SourceTables, table: &str, build: F) -> Result<Vec<Document>>
    where
        F: Fn(&SourceRow) -> Document,
    {
        Ok(tables.rows(table)?.iter().map(build).collect())
    }
}

impl Transformer for CatalogsTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &CATALOGS
    }

    fn transform(&self, tables: &SourceTables, _ctx: &mut RemapContext) -> Result<TransformOutput> {
        let especialidades = Self::entries(tables, "Especialidad", |r| {
            doc! {
                "nombre": r.bson("nombre_especialidad"),
                "descripcion": r.bson("descripcion"),
            }
        })?;
        let motivos = Self::entries(tables, "Motivo", |r| {
            doc! { "descripcion": r.bson("descripcion") }
        })?;
        let tipos_diagnostico = Self::entries(tables, "TipoDiagnostico", |r| {
            doc! {
                "nombre": r.bson("nombre_diagnostico"),
                "descripcion": r.bson("descripcion"),
            }
        })?;
        let metodos_pago = Self::entries(tables, "MetodoPago", |r| {
            doc! {
                "nombre": r.bson("nombre_metodo"),
                "activo": r.flag("activo"),
            }
        })?;
        let tipos_suministro = Self::entries(tables, "TipoSuministro", |r| {
            doc! {
                "nombre": r.bson("nombre_tipo"),
                "descripcion": r.bson("descripcion"),
            }
        })?;
        let tipos_producto = Self::entries(tables, "TipoProducto", |r| {
            doc! {
                "nombre": r.bson("nombre_tipo"),
                "categoria": r.bson("categoria"),
            }
        })?;

        let mut output = TransformOutput::new(CATALOGS.entity);
        output.documents.push(doc! {
            "_id": CATALOG_DOCUMENT_ID,
            "especialidades": especialidades,
            "motivos": motivos,
            "tipos_diagnostico": tipos_diagnostico,
            "metodos_pago": metodos_pago,
            "tipos_suministro": tipos_suministro,
            "tipos_producto": tipos_producto,
        });
        Ok(output)
    }
}
