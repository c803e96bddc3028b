//! Sales with embedded line items, and returns pointing back into them.

use std::collections::HashMap;

use mongodb::bson::{doc, Document};

use crate::error::Result;
use crate::relationships::{EntitySpec, RETURNS, SALES};
use crate::remap::RemapContext;

use super::{set_reference, transform_rows, SourceTables, TransformOutput, Transformer};

pub struct SaleTransformer;

impl Transformer for SaleTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &SALES
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let metodos = tables.lookup("MetodoPago", SALES.lookup("MetodoPago")?.key)?;
        let productos = tables.lookup("Producto", SALES.lookup("Producto")?.key)?;
        let detalles = tables.children(SALES.child("items")?)?;
        let facturas = tables.children(SALES.child("numero_factura")?)?;

        transform_rows(&SALES, tables, ctx, |row, key, ctx| {
            let metodo = metodos.get_by(row, "id_metodo")?;

            // Any unresolvable line item drops the whole sale.
            let items = detalles
                .of(key)
                .iter()
                .map(|detalle| {
                    let producto = productos.get_by(detalle, "id_producto")?;
                    let mut item = Document::new();
                    set_reference(&mut item, &SALES, "producto_ref", detalle, ctx)?;
                    item.insert(
                        "producto_info",
                        doc! {
                            "nombre": producto.bson("nombre_producto"),
                            "codigo_barras": producto.bson("codigo_barras"),
                        },
                    );
                    item.insert("cantidad", detalle.bson("cantidad"));
                    item.insert("precio_unitario", detalle.number("precio_unitario"));
                    item.insert("subtotal", detalle.number("subtotal"));
                    item.insert("descuento", detalle.number("descuento"));
                    item.insert("total", detalle.number("total"));
                    Ok(item)
                })
                .collect::<Result<Vec<Document>>>()?;

            let mut venta = doc! { "fecha_compra": row.timestamp("fecha_compra") };
            set_reference(&mut venta, &SALES, "cliente_ref", row, ctx)?;
            set_reference(&mut venta, &SALES, "asesor_ref", row, ctx)?;
            venta.insert(
                "metodo_pago",
                doc! {
                    "nombre": metodo.bson("nombre_metodo"),
                    "activo": metodo.flag("activo"),
                },
            );
            venta.insert("items", items);
            venta.insert("subtotal", row.number("subtotal"));
            venta.insert("descuento", row.number("descuento"));
            venta.insert("impuesto", row.number("impuesto"));
            venta.insert("total", row.number("total"));
            venta.insert("estado", row.bson("estado"));
            venta.insert("observaciones", row.text_or_empty("observaciones"));
            if let Some(factura) = facturas.one(key) {
                venta.insert("numero_factura", factura.bson("numero_factura"));
            }
            Ok(venta)
        })
    }
}

pub struct ReturnTransformer;

impl Transformer for ReturnTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &RETURNS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let rule = RETURNS.lookup("DetalleCompra")?;
        let detalles = tables.lookup(rule.table, rule.key)?;

        // Position of each line item within its sale, in source order: the
        // same order the sale transformer embeds them in.
        let mut positions: HashMap<i64, i64> = HashMap::new();
        let mut per_sale: HashMap<i64, i64> = HashMap::new();
        for detalle in tables.rows(rule.table)? {
            if let (Some(id), Some(sale)) = (detalle.opt_int(rule.key), detalle.opt_int("id_compra")) {
                let next = per_sale.entry(sale).or_insert(0);
                positions.entry(id).or_insert(*next);
                *next += 1;
            }
        }

        transform_rows(&RETURNS, tables, ctx, |row, _, ctx| {
            let detalle = detalles.get_by(row, rule.key)?;
            let mut devolucion = Document::new();
            set_reference(&mut devolucion, &RETURNS, "venta_ref", detalle, ctx)?;
            if let Some(index) = detalle.opt_int(rule.key).and_then(|id| positions.get(&id)) {
                devolucion.insert("item_index", *index);
            }
            devolucion.insert("fecha_devolucion", row.timestamp("fecha_devolucion"));
            devolucion.insert("cantidad_devuelta", row.bson("cantidad_devuelta"));
            devolucion.insert("motivo", row.bson("motivo"));
            devolucion.insert("estado", row.bson("estado"));
            devolucion.insert("monto_reembolso", row.number("monto_reembolso"));
            set_reference(&mut devolucion, &RETURNS, "asesor_ref", row, ctx)?;
            Ok(devolucion)
        })
    }
}
