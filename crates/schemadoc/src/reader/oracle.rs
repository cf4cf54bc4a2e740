//! Metadata reader for Oracle schemas, using the `user_*` data dictionary
//! views of the connected account.

use oracle::Connection;
use secrecy::ExposeSecret;

use super::{collapse_constraints, ColumnInfo, ConstraintInfo, ConstraintRow, MetadataReader};
use crate::connection::ConnectionParams;
use crate::error::ReaderError;

pub struct OracleMetadataReader {
    conn: Connection,
}

impl OracleMetadataReader {
    pub fn connect(params: &ConnectionParams) -> Result<Self, ReaderError> {
        let (Some(credentials), Some(connect_string)) =
            (params.credentials(), params.oracle_connect_string())
        else {
            return Err(ReaderError::DriverUnavailable(params.kind().as_str()));
        };
        let conn = Connection::connect(
            &credentials.username,
            credentials.password.expose_secret(),
            &connect_string,
        )?;
        log::info!(
            "Connected to Oracle as {} ({} connection)",
            credentials.username,
            params.kind()
        );
        Ok(Self { conn })
    }
}

impl MetadataReader for OracleMetadataReader {
    fn list_tables(&self) -> Result<Vec<String>, ReaderError> {
        let rows = self
            .conn
            .query_as::<String>("SELECT table_name FROM user_tables ORDER BY table_name", &[])?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn table_comment(&self, table: &str) -> Result<String, ReaderError> {
        let mut rows = self.conn.query_as::<Option<String>>(
            "SELECT comments FROM user_tab_comments WHERE table_name = :1",
            &[&table],
        )?;
        match rows.next() {
            Some(row) => Ok(row?.unwrap_or_default()),
            None => Ok(String::new()),
        }
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ReaderError> {
        let rows = self.conn.query_as::<(
            String,
            String,
            Option<u32>,
            String,
            Option<String>,
            u32,
            Option<String>,
        )>(
            "SELECT c.column_name, c.data_type, c.data_length, c.nullable,
                    c.data_default, c.column_id, cc.comments
             FROM user_tab_columns c
             LEFT JOIN user_col_comments cc
               ON c.table_name = cc.table_name AND c.column_name = cc.column_name
             WHERE c.table_name = :1
             ORDER BY c.column_id",
            &[&table],
        )?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, data_type, length, nullable, default, position, comments) = row?;
            columns.push(ColumnInfo {
                name,
                data_type,
                length,
                nullable: nullable == "Y",
                default: default.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
                position,
                description: comments.unwrap_or_default(),
            });
        }
        Ok(columns)
    }

    fn constraints(&self, table: &str) -> Result<Vec<ConstraintInfo>, ReaderError> {
        let rows = self.conn.query_as::<(String, String, Option<String>, Option<String>)>(
            "SELECT c.constraint_name, c.constraint_type, c.search_condition, cc.column_name
             FROM user_constraints c
             LEFT JOIN user_cons_columns cc ON c.constraint_name = cc.constraint_name
             WHERE c.table_name = :1
             ORDER BY c.constraint_name, cc.position",
            &[&table],
        )?;

        let mut constraint_rows = Vec::new();
        for row in rows {
            let (name, code, condition, column) = row?;
            constraint_rows.push(ConstraintRow {
                name,
                code,
                condition,
                column,
                references: None,
            });
        }
        Ok(collapse_constraints(constraint_rows))
    }
}
