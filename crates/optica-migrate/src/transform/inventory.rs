//! Supplies and products.

use mongodb::bson::doc;

use crate::error::Result;
use crate::relationships::{EntitySpec, PRODUCTS, SUPPLIES};
use crate::remap::RemapContext;

use super::{set_reference, transform_rows, SourceTables, TransformOutput, Transformer};

pub struct SupplyTransformer;

impl Transformer for SupplyTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &SUPPLIES
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let rule = SUPPLIES.lookup("TipoSuministro")?;
        let tipos = tables.lookup(rule.table, rule.key)?;

        transform_rows(&SUPPLIES, tables, ctx, |row, _, ctx| {
            let tipo = tipos.get_by(row, "id_tipo")?;
            let mut supply = doc! {
                "tipo": {
                    "nombre": tipo.bson("nombre_tipo"),
                    "descripcion": tipo.bson("descripcion"),
                },
                "cantidad": row.bson("cantidad"),
                "precio_unitario": row.number("precio_unitario"),
                "fecha_ingreso": row.timestamp("fecha_ingreso"),
                "numero_lote": row.bson("numero_lote"),
                "fecha_vencimiento": row.timestamp("fecha_vencimiento"),
            };
            set_reference(&mut supply, &SUPPLIES, "proveedor_ref", row, ctx)?;
            supply.insert("observaciones", row.text_or_empty("observaciones"));
            set_reference(&mut supply, &SUPPLIES, "laboratorio_ref", row, ctx)?;
            Ok(supply)
        })
    }
}

pub struct ProductTransformer;

impl Transformer for ProductTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &PRODUCTS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let rule = PRODUCTS.lookup("TipoProducto")?;
        let tipos = tables.lookup(rule.table, rule.key)?;

        transform_rows(&PRODUCTS, tables, ctx, |row, _, ctx| {
            let tipo = tipos.get_by(row, "id_tipo")?;
            let mut product = doc! {
                "nombre": row.bson("nombre_producto"),
                "codigo_barras": row.bson("codigo_barras"),
                "tipo": {
                    "nombre": tipo.bson("nombre_tipo"),
                    "categoria": tipo.bson("categoria"),
                },
                "marca": row.bson("marca"),
                "descripcion": row.bson("descripcion"),
                "precio_venta": row.number("precio_venta"),
                "stock": {
                    "actual": row.bson("stock"),
                    "minimo": row.bson("stock_minimo"),
                },
                "activo": row.flag("activo"),
                "fecha_creacion": row.timestamp("fecha_creacion"),
            };
            set_reference(&mut product, &PRODUCTS, "suministro_ref", row, ctx)?;
            Ok(product)
        })
    }
}
