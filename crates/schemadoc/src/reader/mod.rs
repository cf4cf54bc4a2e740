//! Schema metadata readers.
//!
//! A [`MetadataReader`] answers four questions about a source database:
//! which tables exist, how each is described, its columns and its
//! constraints. [`Connector`] turns [`ConnectionParams`] into a reader.

use serde::Serialize;

use crate::connection::ConnectionParams;
use crate::error::ReaderError;

#[cfg(feature = "oracle")]
pub mod oracle;
pub mod sqlite;

pub use sqlite::SqliteMetadataReader;

/// One column of a table, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub length: Option<u32>,
    pub nullable: bool,
    pub default: Option<String>,
    /// 1-based position within the table.
    pub position: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    Other(String),
}

impl ConstraintKind {
    /// Maps a data-dictionary constraint code (`P`, `R`, `U`, `C`, ...).
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "P" => ConstraintKind::PrimaryKey,
            "R" => ConstraintKind::ForeignKey,
            "U" => ConstraintKind::Unique,
            "C" => ConstraintKind::Check,
            other => ConstraintKind::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ConstraintKind::PrimaryKey => "P",
            ConstraintKind::ForeignKey => "R",
            ConstraintKind::Unique => "U",
            ConstraintKind::Check => "C",
            ConstraintKind::Other(code) => code,
        }
    }
}

/// A table constraint with all of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintInfo {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub condition: Option<String>,
    /// Referenced table and columns for foreign keys, e.g. `customers(id)`.
    pub references: Option<String>,
}

impl ConstraintInfo {
    /// Text for the "Details" cell of the constraints grid.
    pub fn details(&self) -> String {
        match self.kind {
            ConstraintKind::PrimaryKey => format!("Primary Key: {}", self.columns.join(", ")),
            ConstraintKind::ForeignKey => match &self.references {
                Some(target) => format!(
                    "Foreign Key: {} references {}",
                    self.columns.join(", "),
                    target
                ),
                None => format!("Foreign Key: {}", self.columns.join(", ")),
            },
            ConstraintKind::Check => {
                format!("Check: {}", self.condition.as_deref().unwrap_or_default())
            }
            ConstraintKind::Unique => format!("Unique: {}", self.columns.join(", ")),
            ConstraintKind::Other(_) => self.condition.clone().unwrap_or_default(),
        }
    }
}

/// One data-dictionary row: a constraint paired with one of its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRow {
    pub name: String,
    pub code: String,
    pub condition: Option<String>,
    pub column: Option<String>,
    pub references: Option<String>,
}

/// Groups per-column rows into constraints.
///
/// NOT NULL checks are dropped (the column grid already shows
/// nullability). Primary keys are listed after all other constraints.
pub fn collapse_constraints(rows: Vec<ConstraintRow>) -> Vec<ConstraintInfo> {
    let mut others: Vec<ConstraintInfo> = Vec::new();
    let mut primary: Vec<ConstraintInfo> = Vec::new();

    for row in rows {
        let kind = ConstraintKind::from_code(&row.code);
        if kind == ConstraintKind::Check
            && row
                .condition
                .as_deref()
                .is_some_and(|c| c.to_ascii_uppercase().contains("IS NOT NULL"))
        {
            continue;
        }

        let bucket = if kind == ConstraintKind::PrimaryKey {
            &mut primary
        } else {
            &mut others
        };
        match bucket.iter_mut().find(|c| c.name == row.name) {
            Some(existing) => {
                if let Some(column) = row.column {
                    existing.columns.push(column);
                }
            }
            None => bucket.push(ConstraintInfo {
                name: row.name,
                kind,
                columns: row.column.into_iter().collect(),
                condition: row.condition,
                references: row.references,
            }),
        }
    }

    others.extend(primary);
    others
}

/// Read-only access to a source database's schema.
pub trait MetadataReader {
    /// Table names, sorted.
    fn list_tables(&self) -> Result<Vec<String>, ReaderError>;

    /// Table description, empty when none is recorded.
    fn table_comment(&self, table: &str) -> Result<String, ReaderError>;

    /// Columns ordered by position.
    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ReaderError>;

    fn constraints(&self, table: &str) -> Result<Vec<ConstraintInfo>, ReaderError>;
}

/// Opens a [`MetadataReader`] for a set of connection parameters.
pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn MetadataReader>, ReaderError>;
}

/// SQLite files are read with rusqlite; Oracle sources need the `oracle`
/// feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn MetadataReader>, ReaderError> {
        match params {
            ConnectionParams::Sqlite { path } => Ok(Box::new(SqliteMetadataReader::open(path)?)),
            #[cfg(feature = "oracle")]
            _ => Ok(Box::new(oracle::OracleMetadataReader::connect(params)?)),
            #[cfg(not(feature = "oracle"))]
            _ => Err(ReaderError::DriverUnavailable(params.kind().as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, code: &str, condition: Option<&str>, column: Option<&str>) -> ConstraintRow {
        ConstraintRow {
            name: name.to_string(),
            code: code.to_string(),
            condition: condition.map(str::to_string),
            column: column.map(str::to_string),
            references: None,
        }
    }

    #[test]
    fn test_collapse_groups_primary_key_columns_last() {
        let collapsed = collapse_constraints(vec![
            row("ORDER_PK", "P", None, Some("ORDER_ID")),
            row("ORDER_PK", "P", None, Some("LINE_NO")),
            row("ORDER_FK", "R", None, Some("CUSTOMER_ID")),
        ]);

        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].name, "ORDER_FK");
        assert_eq!(collapsed[1].kind, ConstraintKind::PrimaryKey);
        assert_eq!(collapsed[1].columns, vec!["ORDER_ID", "LINE_NO"]);
        assert_eq!(collapsed[1].details(), "Primary Key: ORDER_ID, LINE_NO");
    }

    #[test]
    fn test_collapse_drops_not_null_checks() {
        let collapsed = collapse_constraints(vec![
            row("SYS_C001", "C", Some("\"ID\" IS NOT NULL"), Some("ID")),
            row("QTY_POSITIVE", "C", Some("qty > 0"), Some("QTY")),
        ]);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].details(), "Check: qty > 0");
    }

    #[test]
    fn test_details_per_kind() {
        let mut fk = row("FK", "R", None, Some("CUSTOMER_ID"));
        fk.references = Some("customers(id)".to_string());
        let collapsed = collapse_constraints(vec![
            fk,
            row("UQ", "U", None, Some("EMAIL")),
            row("V1", "V", Some("WITH CHECK OPTION"), None),
        ]);
        assert_eq!(
            collapsed[0].details(),
            "Foreign Key: CUSTOMER_ID references customers(id)"
        );
        assert_eq!(collapsed[1].details(), "Unique: EMAIL");
        assert_eq!(collapsed[2].kind.code(), "V");
        assert_eq!(collapsed[2].details(), "WITH CHECK OPTION");
    }

    #[cfg(not(feature = "oracle"))]
    #[test]
    fn test_default_connector_without_oracle_driver() {
        let params =
            ConnectionParams::parse_connection_string("scott/tiger@db:1521/ORCL").unwrap();
        let err = DefaultConnector.connect(&params).err().unwrap();
        assert!(matches!(err, ReaderError::DriverUnavailable("connection_string")));
    }
}
