//! Metadata reader for SQLite database files.
//!
//! SQLite has no comment catalog, so descriptions come from `--` comments
//! kept in the stored `CREATE TABLE` text: comment lines before the first
//! column describe the table, a trailing comment describes its column.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{collapse_constraints, ColumnInfo, ConstraintInfo, ConstraintRow, MetadataReader};
use crate::error::ReaderError;
use crate::sanitize::redact_path;

static RE_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:\bCONSTRAINT\s+["`\[]?([\w$]+)["`\]]?\s+)?\bCHECK\s*\("#).unwrap()
});

pub struct SqliteMetadataReader {
    conn: Connection,
}

impl SqliteMetadataReader {
    /// Opens an existing database file read-only.
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        if !path.is_file() {
            return Err(ReaderError::SourceMissing(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| ReaderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Opened SQLite source {}", redact_path(path));
        Ok(Self { conn })
    }

    /// Wraps an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn table_sql(&self, table: &str) -> Result<String, ReaderError> {
        let sql: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |r| r.get(0),
            )
            .optional()?;
        match sql {
            Some(ddl) => Ok(ddl.unwrap_or_default()),
            None => Err(ReaderError::TableNotFound(table.to_string())),
        }
    }
}

/// Splits `VARCHAR(255)` into `("VARCHAR", Some(255))`. Types with
/// precision and scale are kept whole.
fn split_type(declared: &str) -> (String, Option<u32>) {
    let declared = declared.trim();
    if let (Some(open), true) = (declared.find('('), declared.ends_with(')')) {
        if let Ok(length) = declared[open + 1..declared.len() - 1].trim().parse::<u32>() {
            return (declared[..open].trim().to_string(), Some(length));
        }
    }
    (declared.to_string(), None)
}

fn strip_identifier_quotes(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']' | '\''))
}

/// Table description and per-column (lowercased name) comments.
fn ddl_comments(ddl: &str) -> (String, HashMap<String, String>) {
    let mut table_comment: Vec<&str> = Vec::new();
    let mut column_comments = HashMap::new();
    let Some(open) = ddl.find('(') else {
        return (String::new(), column_comments);
    };

    let mut seen_column = false;
    for line in ddl[open + 1..].lines() {
        let (code, comment) = match line.split_once("--") {
            Some((code, comment)) => (code.trim(), comment.trim()),
            None => (line.trim(), ""),
        };
        if code.is_empty() {
            if !seen_column && !comment.is_empty() {
                table_comment.push(comment);
            }
            continue;
        }
        seen_column = true;
        if comment.is_empty() {
            continue;
        }
        if let Some(first) = code.split_whitespace().next() {
            let name = strip_identifier_quotes(first.trim_end_matches(','));
            column_comments.insert(name.to_ascii_lowercase(), comment.to_string());
        }
    }

    (table_comment.join(" "), column_comments)
}

fn strip_line_comments(ddl: &str) -> String {
    ddl.lines()
        .map(|line| line.split_once("--").map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `CHECK (...)` clauses as `(constraint name, condition)`.
fn check_clauses(ddl: &str) -> Vec<(Option<String>, String)> {
    let ddl = strip_line_comments(ddl);
    let mut clauses = Vec::new();

    for caps in RE_CHECK.captures_iter(&ddl) {
        let Some(whole) = caps.get(0) else { continue };
        let mut depth = 1usize;
        let mut in_string = false;
        let mut end = None;
        for (offset, ch) in ddl[whole.end()..].char_indices() {
            match ch {
                '\'' => in_string = !in_string,
                '(' if !in_string => depth += 1,
                ')' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(whole.end() + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        if let Some(end) = end {
            let condition = ddl[whole.end()..end].split_whitespace().collect::<Vec<_>>().join(" ");
            clauses.push((caps.get(1).map(|m| m.as_str().to_string()), condition));
        }
    }

    clauses
}

impl MetadataReader for SqliteMetadataReader {
    fn list_tables(&self) -> Result<Vec<String>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn table_comment(&self, table: &str) -> Result<String, ReaderError> {
        let ddl = self.table_sql(table)?;
        Ok(ddl_comments(&ddl).0)
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ReaderError> {
        let ddl = self.table_sql(table)?;
        let (_, comments) = ddl_comments(&ddl);

        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map(params![table], |r| {
                let cid: u32 = r.get(0)?;
                let name: String = r.get(1)?;
                let declared: String = r.get(2)?;
                let not_null: bool = r.get(3)?;
                let default: Option<String> = r.get(4)?;
                let pk: u32 = r.get(5)?;
                Ok((cid, name, declared, not_null, default, pk))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(cid, name, declared, not_null, default, pk)| {
                let (data_type, length) = split_type(&declared);
                let description = comments
                    .get(&name.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_default();
                ColumnInfo {
                    name,
                    data_type,
                    length,
                    nullable: !not_null && pk == 0,
                    default,
                    position: cid + 1,
                    description,
                }
            })
            .collect();
        Ok(columns)
    }

    fn constraints(&self, table: &str) -> Result<Vec<ConstraintInfo>, ReaderError> {
        let ddl = self.table_sql(table)?;
        let mut rows = Vec::new();

        for (idx, (name, condition)) in check_clauses(&ddl).into_iter().enumerate() {
            rows.push(ConstraintRow {
                name: name.unwrap_or_else(|| format!("ck_{}_{}", table, idx + 1)),
                code: "C".to_string(),
                condition: Some(condition),
                column: None,
                references: None,
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, \"table\", \"from\", \"to\"
             FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let fk_columns = stmt
            .query_map(params![table], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (id, target, from, _) in &fk_columns {
            let targets: Vec<&str> = fk_columns
                .iter()
                .filter(|(other, ..)| other == id)
                .filter_map(|(_, _, _, to)| to.as_deref())
                .collect();
            let references = if targets.is_empty() {
                target.clone()
            } else {
                format!("{}({})", target, targets.join(", "))
            };
            rows.push(ConstraintRow {
                name: format!("fk_{}_{}", table, id),
                code: "R".to_string(),
                condition: None,
                column: Some(from.clone()),
                references: Some(references),
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT name FROM pragma_index_list(?1)
             WHERE \"unique\" = 1 AND origin IN ('u', 'c') ORDER BY name",
        )?;
        let unique_indexes = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut index_columns = self
            .conn
            .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        for index in unique_indexes {
            let columns = index_columns
                .query_map(params![index], |r| r.get::<_, Option<String>>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for column in columns.into_iter().flatten() {
                rows.push(ConstraintRow {
                    name: index.clone(),
                    code: "U".to_string(),
                    condition: None,
                    column: Some(column),
                    references: None,
                });
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
        )?;
        let pk_columns = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for column in pk_columns {
            rows.push(ConstraintRow {
                name: format!("pk_{}", table),
                code: "P".to_string(),
                condition: None,
                column: Some(column),
                references: None,
            });
        }

        Ok(collapse_constraints(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ConstraintKind;

    const SCHEMA: &str = "
CREATE TABLE customers ( -- Registered customers
    id INTEGER PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE, -- Login address
    name TEXT
);
CREATE TABLE orders (
    -- Customer orders
    -- One row per checkout
    id INTEGER NOT NULL,
    line_no INTEGER NOT NULL,
    customer_id INTEGER REFERENCES customers(id), -- Buyer
    qty INTEGER DEFAULT 1 CHECK (qty > 0),
    status TEXT NOT NULL DEFAULT 'new',
    amount DECIMAL(10,2),
    PRIMARY KEY (id, line_no),
    CONSTRAINT status_known CHECK (status IN ('new', 'paid (partial)', 'shipped'))
);
";

    fn reader() -> SqliteMetadataReader {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        SqliteMetadataReader::from_connection(conn)
    }

    #[test]
    fn test_list_tables_sorted() {
        assert_eq!(reader().list_tables().unwrap(), vec!["customers", "orders"]);
    }

    #[test]
    fn test_table_comments() {
        let reader = reader();
        assert_eq!(reader.table_comment("customers").unwrap(), "Registered customers");
        assert_eq!(
            reader.table_comment("orders").unwrap(),
            "Customer orders One row per checkout"
        );
    }

    #[test]
    fn test_unknown_table() {
        let err = reader().columns("nope").unwrap_err();
        assert!(matches!(err, ReaderError::TableNotFound(t) if t == "nope"));
    }

    #[test]
    fn test_columns() {
        let columns = reader().columns("customers").unwrap();
        assert_eq!(columns.len(), 3);

        let email = &columns[1];
        assert_eq!(email.name, "email");
        assert_eq!(email.data_type, "VARCHAR");
        assert_eq!(email.length, Some(255));
        assert!(!email.nullable);
        assert_eq!(email.position, 2);
        assert_eq!(email.description, "Login address");

        assert!(!columns[0].nullable, "primary key column");
        assert!(columns[2].nullable);
        assert_eq!(columns[2].description, "");
    }

    #[test]
    fn test_columns_defaults_and_wide_types() {
        let columns = reader().columns("orders").unwrap();
        let status = columns.iter().find(|c| c.name == "status").unwrap();
        assert_eq!(status.default.as_deref(), Some("'new'"));
        let amount = columns.iter().find(|c| c.name == "amount").unwrap();
        assert_eq!(amount.data_type, "DECIMAL(10,2)");
        assert_eq!(amount.length, None);
        let customer = columns.iter().find(|c| c.name == "customer_id").unwrap();
        assert_eq!(customer.description, "Buyer");
    }

    #[test]
    fn test_constraints() {
        let constraints = reader().constraints("orders").unwrap();
        let names: Vec<&str> = constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ck_orders_1", "status_known", "fk_orders_0", "pk_orders"]);

        assert_eq!(constraints[0].details(), "Check: qty > 0");
        assert_eq!(
            constraints[1].details(),
            "Check: status IN ('new', 'paid (partial)', 'shipped')"
        );
        assert_eq!(
            constraints[2].details(),
            "Foreign Key: customer_id references customers(id)"
        );
        assert_eq!(constraints[3].kind, ConstraintKind::PrimaryKey);
        assert_eq!(constraints[3].details(), "Primary Key: id, line_no");
    }

    #[test]
    fn test_unique_constraint() {
        let constraints = reader().constraints("customers").unwrap();
        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].kind, ConstraintKind::Unique);
        assert_eq!(constraints[0].columns, vec!["email"]);
        assert_eq!(constraints[1].details(), "Primary Key: id");
    }

    #[test]
    fn test_split_type() {
        assert_eq!(split_type("VARCHAR2(30)"), ("VARCHAR2".to_string(), Some(30)));
        assert_eq!(split_type("INTEGER"), ("INTEGER".to_string(), None));
        assert_eq!(split_type(""), (String::new(), None));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteMetadataReader::open(&dir.path().join("absent.db")).err().unwrap();
        assert!(matches!(err, ReaderError::SourceMissing(_)));
    }

    #[test]
    fn test_open_file_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.db");
        Connection::open(&path).unwrap().execute_batch(SCHEMA).unwrap();

        let reader = SqliteMetadataReader::open(&path).unwrap();
        assert_eq!(reader.list_tables().unwrap().len(), 2);
        assert!(reader.conn.execute("DELETE FROM customers", []).is_err());
    }
}
