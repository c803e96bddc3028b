//! Eye exams with their diagnosis and prescription.
//!
//! Per-eye measurements are grouped under `ojo_derecho` / `ojo_izquierdo`.
//! A measurement that was not taken stays NULL rather than disappearing, so
//! every exam document has the same shape.

use mongodb::bson::{doc, Document};

use crate::core::SourceRow;
use crate::error::Result;
use crate::relationships::{EntitySpec, EXAMS};
use crate::remap::RemapContext;

use super::{set_reference, transform_rows, Children, Lookup, SourceTables, TransformOutput, Transformer};

pub struct ExamTransformer;

impl Transformer for ExamTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &EXAMS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let rule = EXAMS.lookup("TipoDiagnostico")?;
        let tipos = tables.lookup(rule.table, rule.key)?;
        let diagnosticos = tables.children(EXAMS.child("diagnostico")?)?;
        let formulas = tables.children(EXAMS.child("formula")?)?;

        transform_rows(&EXAMS, tables, ctx, |row, key, ctx| {
            let mut exam = doc! { "fecha_examen": row.timestamp("fecha_examen") };
            set_reference(&mut exam, &EXAMS, "cliente_ref", row, ctx)?;
            set_reference(&mut exam, &EXAMS, "especialista_ref", row, ctx)?;
            exam.insert(
                "examen",
                doc! {
                    "ojo_derecho": eye(row, "od"),
                    "ojo_izquierdo": eye(row, "oi"),
                    "adicion": row.number("adicion"),
                    "distancia_pupilar": row.number("distancia_pupilar"),
                    "observaciones": row.text_or_empty("observaciones"),
                },
            );
            set_reference(&mut exam, &EXAMS, "cita_ref", row, ctx)?;

            if let Some(diagnostico) = diagnosticos.one(key) {
                exam.insert("diagnostico", diagnosis(diagnostico, &tipos, &formulas)?);
            }
            Ok(exam)
        })
    }
}

fn eye(row: &SourceRow, side: &str) -> Document {
    doc! {
        "agudeza_visual": row.bson(&format!("agudeza_visual_{side}")),
        "esfera": row.number(&format!("esfera_{side}")),
        "cilindro": row.number(&format!("cilindro_{side}")),
        "eje": row.bson(&format!("eje_{side}")),
        "presion_intraocular": row.number(&format!("presion_intraocular_{side}")),
    }
}

fn diagnosis(
    diagnostico: &SourceRow,
    tipos: &Lookup<'_>,
    formulas: &Children<'_>,
) -> Result<Document> {
    let tipo = tipos.get_by(diagnostico, "id_tipo_diagnostico")?;
    let mut document = doc! {
        "tipo": {
            "nombre": tipo.bson("nombre_diagnostico"),
            "descripcion": tipo.bson("descripcion"),
        },
        "descripcion": diagnostico.bson("descripcion"),
        "fecha": diagnostico.timestamp("fecha_diagnostico"),
    };

    let formula = diagnostico
        .opt_int("id_diagnostico")
        .and_then(|id| formulas.one(id));
    if let Some(formula) = formula {
        document.insert(
            "formula",
            doc! {
                "descripcion": formula.bson("descripcion_formula"),
                "fecha_emision": formula.timestamp("fecha_emision"),
                "fecha_vencimiento": formula.timestamp("fecha_vencimiento"),
                "activa": formula.flag("activa"),
            },
        );
    }
    Ok(document)
}
