//! Clients, advisors and specialists: people with embedded contact data.

use mongodb::bson::{doc, Document};

use crate::core::SourceRow;
use crate::error::Result;
use crate::relationships::{EntitySpec, ADVISORS, CLIENTS, SPECIALISTS};
use crate::remap::RemapContext;

use super::{transform_rows, SourceTables, TransformOutput, Transformer};

pub struct ClientTransformer;

impl Transformer for ClientTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &CLIENTS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let direcciones = tables.children(CLIENTS.child("direcciones")?)?;
        let telefonos = tables.children(CLIENTS.child("telefonos")?)?;

        transform_rows(&CLIENTS, tables, ctx, |row, key, _| {
            let mut client = doc! {
                "nombre": row.bson("nombre"),
                "apellido": row.bson("apellido"),
                "email": row.bson("email"),
                "fecha_nacimiento": row.timestamp("fecha_nacimiento"),
                "activo": row.flag("activo"),
                "fecha_registro": row.timestamp("fecha_registro"),
            };
            if !row.value("numero_documento").is_null() {
                client.insert(
                    "documento",
                    doc! {
                        "tipo": row.bson("tipo_documento"),
                        "numero": row.bson("numero_documento"),
                    },
                );
            }

            let addresses: Vec<Document> = direcciones
                .of(key)
                .iter()
                .map(|d| {
                    doc! {
                        "tipo": d.bson("tipo_direccion"),
                        "calle": d.bson("calle"),
                        "ciudad": d.bson("ciudad"),
                        "estado": d.bson("estado"),
                        "codigo_postal": d.bson("codigo_postal"),
                        "pais": d.bson("pais"),
                        "es_principal": d.flag("es_principal"),
                    }
                })
                .collect();
            let phones: Vec<Document> = telefonos
                .of(key)
                .iter()
                .map(|t| {
                    doc! {
                        "numero": t.bson("telefono"),
                        "tipo": t.bson("tipo_telefono"),
                        "es_principal": t.flag("es_principal"),
                    }
                })
                .collect();
            client.insert("direcciones", addresses);
            client.insert("telefonos", phones);
            Ok(client)
        })
    }
}

pub struct AdvisorTransformer;

impl Transformer for AdvisorTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &ADVISORS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let telefonos = tables.children(ADVISORS.child("telefonos")?)?;
        let emails = tables.children(ADVISORS.child("emails")?)?;

        transform_rows(&ADVISORS, tables, ctx, |row, key, _| {
            Ok(doc! {
                "nombre": row.bson("nombre"),
                "apellido": row.bson("apellido"),
                "numero_documento": row.bson("numero_documento"),
                "fecha_contratacion": row.timestamp("fecha_contratacion"),
                "activo": row.flag("activo"),
                "telefonos": phone_list(telefonos.of(key)),
                "emails": email_list(emails.of(key)),
            })
        })
    }
}

pub struct SpecialistTransformer;

impl Transformer for SpecialistTransformer {
    fn spec(&self) -> &'static EntitySpec {
        &SPECIALISTS
    }

    fn transform(&self, tables: &SourceTables, ctx: &mut RemapContext) -> Result<TransformOutput> {
        let rule = SPECIALISTS.lookup("Especialidad")?;
        let especialidad = tables.lookup(rule.table, rule.key)?;
        let certificaciones = tables.children(SPECIALISTS.child("especialidades")?)?;
        let telefonos = tables.children(SPECIALISTS.child("telefonos")?)?;
        let emails = tables.children(SPECIALISTS.child("emails")?)?;

        transform_rows(&SPECIALISTS, tables, ctx, |row, key, _| {
            let especialidades = certificaciones
                .of(key)
                .iter()
                .map(|cert| {
                    let info = especialidad.get_by(cert, rule.key)?;
                    Ok(doc! {
                        "nombre": info.bson("nombre_especialidad"),
                        "descripcion": info.bson("descripcion"),
                        "fecha_certificacion": cert.timestamp("fecha_certificacion"),
                    })
                })
                .collect::<Result<Vec<Document>>>()?;

            Ok(doc! {
                "nombre": row.bson("nombre"),
                "apellido": row.bson("apellido"),
                "numero_licencia": row.bson("numero_licencia"),
                "numero_documento": row.bson("numero_documento"),
                "activo": row.flag("activo"),
                "especialidades": especialidades,
                "telefonos": phone_list(telefonos.of(key)),
                "emails": email_list(emails.of(key)),
            })
        })
    }
}

fn phone_list(rows: &[&SourceRow]) -> Vec<Document> {
    rows.iter()
        .map(|t| {
            doc! {
                "numero": t.bson("telefono"),
                "tipo": t.bson("tipo_telefono"),
            }
        })
        .collect()
}

fn email_list(rows: &[&SourceRow]) -> Vec<Document> {
    rows.iter()
        .map(|e| {
            doc! {
                "email": e.bson("email"),
                "tipo": e.bson("tipo_email"),
            }
        })
        .collect()
}
