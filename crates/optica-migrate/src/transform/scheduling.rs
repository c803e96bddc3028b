//! Appointments.

use mongodb::bson::doc;

use crate::error::Result;
use crate::relationships::{EntitySpec, APPOINTMENTS};
use crate::remap::RemapContext;

use super::{set_reference, transform_rows, SourceTables, TransformOutput, Transformer};

pub struct AppointmentTransformer;

impl Transformer for AppointmentTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &APPOINTMENTS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let rule = APPOINTMENTS.lookup("Motivo")?;
        let motivos = tables.lookup(rule.table, rule.key)?;

        transform_rows(&APPOINTMENTS, tables, ctx, |row, _, ctx| {
            let motivo = motivos.get_by(row, rule.key)?;
            let mut cita = doc! {
                "fecha_cita": row.timestamp("fecha_cita"),
                "hora_cita": row.bson("hora_cita"),
                "motivo": { "descripcion": motivo.bson("descripcion") },
            };
            set_reference(&mut cita, &APPOINTMENTS, "cliente_ref", row, ctx)?;
            cita.insert("estado", row.bson("estado"));
            cita.insert("observaciones", row.text_or_empty("observaciones"));
            cita.insert("fecha_creacion", row.timestamp("fecha_creacion"));
            set_reference(&mut cita, &APPOINTMENTS, "asesor_ref", row, ctx)?;
            set_reference(&mut cita, &APPOINTMENTS, "especialista_ref", row, ctx)?;
            Ok(cita)
        })
    }
}
