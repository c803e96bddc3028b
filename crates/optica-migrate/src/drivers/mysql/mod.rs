//! MySQL/MariaDB source driver.
//!
//! [`MysqlReader`] reads whole tables into [`SourceRow`](crate::core::SourceRow)s,
//! tagging each row with its single integer primary key when the table has one.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod reader;

pub use reader::MysqlReader;
