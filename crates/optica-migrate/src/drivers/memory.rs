//! In-memory source and sink.
//!
//! [`MemorySink`] backs dry runs; both are used by the test suite in place of
//! live MySQL and MongoDB servers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::core::{DocumentSink, SourceReader, SourceRow};
use crate::error::{MigrateError, Result};

/// Source holding its tables in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, Vec<SourceRow>>,
    closed: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<SourceRow>) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }

    /// Copy of a table's rows; empty when the table does not exist.
    pub fn rows(&self, table: &str) -> Vec<SourceRow> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    /// How many times [`close`](SourceReader::close) was called.
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn read_table(&self, table: &str) -> Result<Vec<SourceRow>> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| MigrateError::source(table, "table does not exist"))
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        Ok(self.read_table(table).await?.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink storing documents per collection in insertion order.
#[derive(Debug, Default)]
pub struct MemorySink {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    insert_calls: Mutex<HashMap<String, usize>>,
    failing: HashSet<String>,
    closed: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: reject every insert into `collection`.
    #[must_use]
    pub fn failing_on(mut self, collection: impl Into<String>) -> Self {
        self.failing.insert(collection.into());
        self
    }

    /// Copy of a collection's documents.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        lock(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Document count without going through the async trait.
    pub fn count_sync(&self, collection: &str) -> usize {
        lock(&self.collections)
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of `bulk_insert` calls made for a collection.
    pub fn insert_calls(&self, collection: &str) -> usize {
        lock(&self.insert_calls)
            .get(collection)
            .copied()
            .unwrap_or(0)
    }

    /// How many times [`close`](DocumentSink::close) was called.
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

// A poisoned lock only means another test thread panicked mid-insert.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn clear_collection(&self, collection: &str) -> Result<u64> {
        let removed = lock(&self.collections)
            .remove(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }

    async fn bulk_insert(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        *lock(&self.insert_calls)
            .entry(collection.to_string())
            .or_insert(0) += 1;
        if self.failing.contains(collection) {
            return Err(MigrateError::sink(collection, "insert rejected"));
        }
        let inserted = documents.len() as u64;
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(inserted)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        Ok(self.count_sync(collection) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sample optical-store dataset covering every migrated table.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::MemorySource;
    use crate::core::{SourceRow, Value};
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32) -> Value {
        Value::DateTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
        )
    }

    fn money(cents: i64) -> Value {
        Value::Decimal(Decimal::new(cents, 2))
    }

    fn row(table: &str) -> SourceRow {
        SourceRow::new(table)
    }

    /// Row counts per collection produced from [`optica_source`].
    pub(crate) const EXPECTED_COUNTS: [(&str, u64); 12] = [
        ("catalogos", 1),
        ("clientes", 2),
        ("asesores", 2),
        ("especialistas", 1),
        ("proveedores", 2),
        ("laboratorios", 1),
        ("suministros", 2),
        ("productos", 2),
        ("citas", 2),
        ("examenes", 2),
        ("ventas", 2),
        ("devoluciones", 1),
    ];

    pub(crate) fn optica_source() -> MemorySource {
        MemorySource::new()
            // ----- lookup tables -----
            .with_table(
                "Especialidad",
                vec![
                    row("Especialidad")
                        .with("id_especialidad", 1)
                        .with("nombre_especialidad", "Optometría")
                        .with("descripcion", "Evaluación de la agudeza visual"),
                    row("Especialidad")
                        .with("id_especialidad", 2)
                        .with("nombre_especialidad", "Contactología")
                        .with("descripcion", "Adaptación de lentes de contacto"),
                ],
            )
            .with_table(
                "Motivo",
                vec![
                    row("Motivo").with("id_motivo", 1).with("descripcion", "Control anual"),
                    row("Motivo").with("id_motivo", 2).with("descripcion", "Visión borrosa"),
                ],
            )
            .with_table(
                "TipoDiagnostico",
                vec![
                    row("TipoDiagnostico")
                        .with("id_tipo_diagnostico", 1)
                        .with("nombre_diagnostico", "Miopía")
                        .with("descripcion", "Dificultad para ver de lejos"),
                    row("TipoDiagnostico")
                        .with("id_tipo_diagnostico", 2)
                        .with("nombre_diagnostico", "Astigmatismo")
                        .with("descripcion", "Curvatura irregular de la córnea"),
                ],
            )
            .with_table(
                "MetodoPago",
                vec![
                    row("MetodoPago")
                        .with("id_metodo", 1)
                        .with("nombre_metodo", "Efectivo")
                        .with("activo", 1),
                    row("MetodoPago")
                        .with("id_metodo", 2)
                        .with("nombre_metodo", "Tarjeta")
                        .with("activo", 1),
                ],
            )
            .with_table(
                "TipoSuministro",
                vec![
                    row("TipoSuministro")
                        .with("id_tipo", 1)
                        .with("nombre_tipo", "Lentes")
                        .with("descripcion", "Lentes oftálmicos"),
                    row("TipoSuministro")
                        .with("id_tipo", 2)
                        .with("nombre_tipo", "Monturas")
                        .with("descripcion", "Monturas metálicas y de acetato"),
                ],
            )
            .with_table(
                "TipoProducto",
                vec![
                    row("TipoProducto")
                        .with("id_tipo", 1)
                        .with("nombre_tipo", "Montura")
                        .with("categoria", "Accesorios"),
                    row("TipoProducto")
                        .with("id_tipo", 2)
                        .with("nombre_tipo", "Lente de contacto")
                        .with("categoria", "Lentes"),
                ],
            )
            // ----- clients -----
            .with_table(
                "Cliente",
                vec![
                    row("Cliente")
                        .with("id_cliente", 7)
                        .with("nombre", "Ana")
                        .with("apellido", "Gómez")
                        .with("email", "ana@correo.co")
                        .with("tipo_documento", "CC")
                        .with("numero_documento", "1020304050")
                        .with("fecha_nacimiento", date(1990, 5, 1))
                        .with("activo", 1)
                        .with("fecha_registro", datetime(2023, 1, 10, 9)),
                    row("Cliente")
                        .with("id_cliente", 8)
                        .with("nombre", "Luis")
                        .with("apellido", "Pérez")
                        .with("email", Value::Null)
                        .with("tipo_documento", Value::Null)
                        .with("numero_documento", Value::Null)
                        .with("fecha_nacimiento", date(1985, 11, 23))
                        .with("activo", 0)
                        .with("fecha_registro", datetime(2023, 2, 3, 15)),
                ],
            )
            .with_table(
                "DireccionCliente",
                vec![
                    row("DireccionCliente")
                        .with("id_direccion", 1)
                        .with("id_cliente", 7)
                        .with("tipo_direccion", "Casa")
                        .with("calle", "Calle 80 # 12-34")
                        .with("ciudad", "Bogotá")
                        .with("estado", "Cundinamarca")
                        .with("codigo_postal", "110111")
                        .with("pais", "Colombia")
                        .with("es_principal", 1),
                    row("DireccionCliente")
                        .with("id_direccion", 2)
                        .with("id_cliente", 7)
                        .with("tipo_direccion", "Trabajo")
                        .with("calle", "Avenida 6N # 23-10")
                        .with("ciudad", "Cali")
                        .with("estado", "Valle del Cauca")
                        .with("codigo_postal", "760001")
                        .with("pais", "Colombia")
                        .with("es_principal", 0),
                ],
            )
            .with_table(
                "TelefonoCliente",
                vec![
                    row("TelefonoCliente")
                        .with("id_telefono", 1)
                        .with("id_cliente", 7)
                        .with("telefono", "3001234567")
                        .with("tipo_telefono", "Móvil")
                        .with("es_principal", 1),
                    row("TelefonoCliente")
                        .with("id_telefono", 2)
                        .with("id_cliente", 8)
                        .with("telefono", "6015550000")
                        .with("tipo_telefono", "Fijo")
                        .with("es_principal", 1),
                ],
            )
            // ----- advisors -----
            .with_table(
                "Asesor",
                vec![
                    row("Asesor")
                        .with("id_asesor", 1)
                        .with("nombre", "Carlos")
                        .with("apellido", "Ruiz")
                        .with("numero_documento", "79111222")
                        .with("fecha_contratacion", date(2021, 3, 15))
                        .with("activo", 1),
                    row("Asesor")
                        .with("id_asesor", 2)
                        .with("nombre", "Marta")
                        .with("apellido", "Díaz")
                        .with("numero_documento", "52333444")
                        .with("fecha_contratacion", date(2022, 8, 1))
                        .with("activo", 1),
                ],
            )
            .with_table(
                "TelefonoAsesor",
                vec![row("TelefonoAsesor")
                    .with("id_telefono", 1)
                    .with("id_asesor", 1)
                    .with("telefono", "3109876543")
                    .with("tipo_telefono", "Móvil")],
            )
            .with_table(
                "EmailAsesor",
                vec![row("EmailAsesor")
                    .with("id_email", 1)
                    .with("id_asesor", 1)
                    .with("email", "carlos.ruiz@optica.co")
                    .with("tipo_email", "Trabajo")],
            )
            // ----- specialists -----
            .with_table(
                "Especialista",
                vec![row("Especialista")
                    .with("id_especialista", 1)
                    .with("nombre", "Laura")
                    .with("apellido", "Torres")
                    .with("numero_licencia", "LIC-0001")
                    .with("numero_documento", "1011122233")
                    .with("activo", 1)],
            )
            .with_table(
                "EspecialistaEspecialidad",
                vec![
                    row("EspecialistaEspecialidad")
                        .with("id_especialista", 1)
                        .with("id_especialidad", 1)
                        .with("fecha_certificacion", date(2015, 6, 30)),
                    row("EspecialistaEspecialidad")
                        .with("id_especialista", 1)
                        .with("id_especialidad", 2)
                        .with("fecha_certificacion", date(2018, 2, 14)),
                ],
            )
            .with_table(
                "TelefonoEspecialista",
                vec![row("TelefonoEspecialista")
                    .with("id_telefono", 1)
                    .with("id_especialista", 1)
                    .with("telefono", "3201112233")
                    .with("tipo_telefono", "Móvil")],
            )
            .with_table(
                "EmailEspecialista",
                vec![row("EmailEspecialista")
                    .with("id_email", 1)
                    .with("id_especialista", 1)
                    .with("email", "laura.torres@optica.co")
                    .with("tipo_email", "Trabajo")],
            )
            // ----- suppliers and labs -----
            .with_table(
                "Proveedor",
                vec![
                    row("Proveedor")
                        .with("id_proveedor", 1)
                        .with("nombre_proveedor", "Lentes Andinos")
                        .with("contacto_principal", "Jorge Salas")
                        .with("activo", 1),
                    row("Proveedor")
                        .with("id_proveedor", 2)
                        .with("nombre_proveedor", "Monturas del Sur")
                        .with("contacto_principal", "Paula Mora")
                        .with("activo", 1),
                ],
            )
            .with_table(
                "DireccionProveedor",
                vec![row("DireccionProveedor")
                    .with("id_direccion", 1)
                    .with("id_proveedor", 1)
                    .with("calle", "Carrera 7 # 45-10")
                    .with("ciudad", "Bogotá")
                    .with("estado", "Cundinamarca")
                    .with("codigo_postal", "110231")
                    .with("pais", "Colombia")],
            )
            .with_table(
                "TelefonoProveedor",
                vec![row("TelefonoProveedor")
                    .with("id_telefono", 1)
                    .with("id_proveedor", 1)
                    .with("telefono", "6017654321")
                    .with("extension", "101")],
            )
            .with_table(
                "EmailProveedor",
                vec![row("EmailProveedor")
                    .with("id_email", 1)
                    .with("id_proveedor", 1)
                    .with("email", "ventas@lentesandinos.co")
                    .with("tipo_email", "Ventas")],
            )
            .with_table(
                "Laboratorio",
                vec![row("Laboratorio")
                    .with("id_laboratorio", 1)
                    .with("nombre_laboratorio", "Visión Lab")
                    .with("contacto_principal", "Andrés Vega")
                    .with("activo", 1)],
            )
            .with_table(
                "DireccionLaboratorio",
                vec![row("DireccionLaboratorio")
                    .with("id_direccion", 1)
                    .with("id_laboratorio", 1)
                    .with("calle", "Calle 10 # 40-20")
                    .with("ciudad", "Medellín")
                    .with("estado", "Antioquia")
                    .with("codigo_postal", "050021")
                    .with("pais", "Colombia")],
            )
            .with_table(
                "TelefonoLaboratorio",
                vec![row("TelefonoLaboratorio")
                    .with("id_telefono", 1)
                    .with("id_laboratorio", 1)
                    .with("telefono", "6044440000")
                    .with("extension", Value::Null)],
            )
            // ----- inventory -----
            .with_table(
                "Suministro",
                vec![
                    row("Suministro")
                        .with("id_suministro", 1)
                        .with("id_tipo", 1)
                        .with("id_proveedor", 1)
                        .with("id_laboratorio", Value::Null)
                        .with("cantidad", 50)
                        .with("precio_unitario", money(4500000))
                        .with("fecha_ingreso", date(2024, 1, 15))
                        .with("numero_lote", "L-2024-001")
                        .with("fecha_vencimiento", date(2027, 1, 15))
                        .with("observaciones", Value::Null),
                    row("Suministro")
                        .with("id_suministro", 2)
                        .with("id_tipo", 2)
                        .with("id_proveedor", 2)
                        .with("id_laboratorio", 1)
                        .with("cantidad", 20)
                        .with("precio_unitario", money(8000000))
                        .with("fecha_ingreso", date(2024, 2, 1))
                        .with("numero_lote", "L-2024-002")
                        .with("fecha_vencimiento", Value::Null)
                        .with("observaciones", "Lote importado"),
                ],
            )
            .with_table(
                "Producto",
                vec![
                    row("Producto")
                        .with("id_producto", 1)
                        .with("nombre_producto", "Montura clásica")
                        .with("codigo_barras", "7700000000011")
                        .with("id_tipo", 1)
                        .with("marca", "Ray-Ban")
                        .with("descripcion", "Montura de acetato negra")
                        .with("precio_venta", money(25000000))
                        .with("stock", 12)
                        .with("stock_minimo", 3)
                        .with("activo", 1)
                        .with("fecha_creacion", datetime(2024, 2, 5, 10))
                        .with("id_suministro", 2),
                    row("Producto")
                        .with("id_producto", 2)
                        .with("nombre_producto", "Lente blando mensual")
                        .with("codigo_barras", "7700000000028")
                        .with("id_tipo", 2)
                        .with("marca", "Acuvue")
                        .with("descripcion", Value::Null)
                        .with("precio_venta", money(9000000))
                        .with("stock", 40)
                        .with("stock_minimo", 10)
                        .with("activo", 1)
                        .with("fecha_creacion", datetime(2024, 2, 6, 11))
                        .with("id_suministro", Value::Null),
                ],
            )
            // ----- scheduling and clinical -----
            .with_table(
                "Cita",
                vec![
                    row("Cita")
                        .with("id_cita", 1)
                        .with("id_cliente", 7)
                        .with("id_asesor", 1)
                        .with("id_especialista", 1)
                        .with("id_motivo", 1)
                        .with("fecha_cita", date(2024, 3, 4))
                        .with("hora_cita", NaiveTime::from_hms_opt(9, 30, 0).unwrap())
                        .with("estado", "Completada")
                        .with("observaciones", Value::Null)
                        .with("fecha_creacion", datetime(2024, 2, 28, 8)),
                    row("Cita")
                        .with("id_cita", 2)
                        .with("id_cliente", 8)
                        .with("id_asesor", Value::Null)
                        .with("id_especialista", 1)
                        .with("id_motivo", 2)
                        .with("fecha_cita", date(2024, 3, 5))
                        .with("hora_cita", NaiveTime::from_hms_opt(14, 0, 0).unwrap())
                        .with("estado", "Programada")
                        .with("observaciones", "Primera visita")
                        .with("fecha_creacion", datetime(2024, 3, 1, 12)),
                ],
            )
            .with_table(
                "ExamenVista",
                vec![
                    row("ExamenVista")
                        .with("id_examen", 1)
                        .with("id_cliente", 7)
                        .with("id_especialista", 1)
                        .with("id_cita", 1)
                        .with("fecha_examen", date(2024, 3, 4))
                        .with("agudeza_visual_od", "20/40")
                        .with("agudeza_visual_oi", "20/30")
                        .with("esfera_od", money(-125))
                        .with("esfera_oi", money(-100))
                        .with("cilindro_od", money(-50))
                        .with("cilindro_oi", Value::Null)
                        .with("eje_od", 180)
                        .with("eje_oi", Value::Null)
                        .with("presion_intraocular_od", money(1500))
                        .with("presion_intraocular_oi", money(1450))
                        .with("adicion", Value::Null)
                        .with("distancia_pupilar", money(6200))
                        .with("observaciones", "Control en un año"),
                    row("ExamenVista")
                        .with("id_examen", 2)
                        .with("id_cliente", 8)
                        .with("id_especialista", 1)
                        .with("id_cita", Value::Null)
                        .with("fecha_examen", date(2024, 3, 6))
                        .with("agudeza_visual_od", "20/20")
                        .with("agudeza_visual_oi", "20/20")
                        .with("distancia_pupilar", money(6400)),
                ],
            )
            .with_table(
                "Diagnostico",
                vec![row("Diagnostico")
                    .with("id_diagnostico", 1)
                    .with("id_examen", 1)
                    .with("id_tipo_diagnostico", 1)
                    .with("descripcion", "Miopía leve en ambos ojos")
                    .with("fecha_diagnostico", date(2024, 3, 4))],
            )
            .with_table(
                "FormulaMedica",
                vec![row("FormulaMedica")
                    .with("id_formula", 1)
                    .with("id_diagnostico", 1)
                    .with("descripcion_formula", "Lentes monofocales antirreflejo")
                    .with("fecha_emision", date(2024, 3, 4))
                    .with("fecha_vencimiento", date(2025, 3, 4))
                    .with("activa", 1)],
            )
            // ----- sales -----
            .with_table(
                "Compra",
                vec![
                    row("Compra")
                        .with("id_compra", 1)
                        .with("id_cliente", 7)
                        .with("id_asesor", 1)
                        .with("id_metodo", 2)
                        .with("fecha_compra", datetime(2024, 3, 4, 11))
                        .with("subtotal", money(34000000))
                        .with("descuento", money(1000000))
                        .with("impuesto", money(6270000))
                        .with("total", money(39270000))
                        .with("estado", "Pagada")
                        .with("observaciones", Value::Null),
                    row("Compra")
                        .with("id_compra", 2)
                        .with("id_cliente", 8)
                        .with("id_asesor", 2)
                        .with("id_metodo", 1)
                        .with("fecha_compra", datetime(2024, 3, 6, 16))
                        .with("subtotal", money(9000000))
                        .with("descuento", money(0))
                        .with("impuesto", money(1710000))
                        .with("total", money(10710000))
                        .with("estado", "Pagada")
                        .with("observaciones", "Pago en efectivo"),
                ],
            )
            .with_table(
                "DetalleCompra",
                vec![
                    row("DetalleCompra")
                        .with("id_detalle", 1)
                        .with("id_compra", 1)
                        .with("id_producto", 1)
                        .with("cantidad", 1)
                        .with("precio_unitario", money(25000000))
                        .with("subtotal", money(25000000))
                        .with("descuento", money(1000000))
                        .with("total", money(24000000)),
                    row("DetalleCompra")
                        .with("id_detalle", 2)
                        .with("id_compra", 1)
                        .with("id_producto", 2)
                        .with("cantidad", 1)
                        .with("precio_unitario", money(9000000))
                        .with("subtotal", money(9000000))
                        .with("descuento", money(0))
                        .with("total", money(9000000)),
                    row("DetalleCompra")
                        .with("id_detalle", 3)
                        .with("id_compra", 2)
                        .with("id_producto", 2)
                        .with("cantidad", 1)
                        .with("precio_unitario", money(9000000))
                        .with("subtotal", money(9000000))
                        .with("descuento", money(0))
                        .with("total", money(9000000)),
                ],
            )
            .with_table(
                "Factura",
                vec![row("Factura")
                    .with("id_factura", 1)
                    .with("id_compra", 1)
                    .with("numero_factura", "F-0001")
                    .with("fecha_emision", datetime(2024, 3, 4, 11))],
            )
            .with_table(
                "Devolucion",
                vec![row("Devolucion")
                    .with("id_devolucion", 1)
                    .with("id_detalle", 2)
                    .with("id_asesor", 1)
                    .with("fecha_devolucion", date(2024, 3, 10))
                    .with("cantidad_devuelta", 1)
                    .with("motivo", "Molestia al usar")
                    .with("estado", "Aprobada")
                    .with("monto_reembolso", money(9000000))],
            )
    }
}
