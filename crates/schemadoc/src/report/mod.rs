//! Report assembly: schema metadata in, `.docx` document out.

pub mod docx;
pub mod progress;

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info_span;

use crate::error::ReportError;
use crate::reader::{ColumnInfo, ConstraintInfo, MetadataReader};

pub use docx::{DocxBuilder, DOCX_MIME_TYPE};
pub use progress::{LogProgress, NoopProgress, ProgressError, ProgressReporter};

pub const REPORT_TITLE: &str = "Database Documentation";
pub const FILENAME_PREFIX: &str = "database_documentation_";

const COLUMN_HEADERS: [&str; 7] = [
    "Name",
    "Data Type",
    "Length",
    "Nullable",
    "Default",
    "Position",
    "Description",
];
const CONSTRAINT_HEADERS: [&str; 3] = ["Name", "Type", "Details"];
const TOC_INSTRUCTION: &str = r#"TOC \o "1-3" \h \z \u"#;
const TOC_PLACEHOLDER: &str = "Right-click to update the table of contents.";

/// A finished report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutput {
    pub path: PathBuf,
    /// File name inside the output directory.
    pub filename: String,
    /// Number of tables documented.
    pub tables: u64,
}

/// Narrows the database's table listing to a selection.
///
/// `None` or an empty selection keeps every table. Otherwise the listing
/// order is kept and unknown names are skipped with a warning.
pub fn select_tables(
    available: Vec<String>,
    selected: Option<&[String]>,
) -> Result<Vec<String>, ReportError> {
    let tables = match selected {
        Some(selected) if !selected.is_empty() => {
            for name in selected {
                if !available.contains(name) {
                    log::warn!("Selected table '{}' does not exist, skipping", name);
                }
            }
            available
                .into_iter()
                .filter(|t| selected.contains(t))
                .collect()
        }
        _ => available,
    };

    if tables.is_empty() {
        return Err(ReportError::NoTables);
    }
    Ok(tables)
}

/// Creates `database_documentation_<timestamp>.docx` in `dir`, suffixed
/// `_1`, `_2`, ... when the name is taken.
///
/// The file is created with `create_new`, so two runs finishing in the
/// same second never receive the same name.
pub fn reserve_output_file(dir: &Path, timestamp: &str) -> Result<(File, String), ReportError> {
    let base = format!("{FILENAME_PREFIX}{timestamp}");
    let mut candidate = format!("{base}.docx");
    let mut n = 1;
    loop {
        let path = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                candidate = format!("{base}_{n}.docx");
                n += 1;
            }
            Err(source) => return Err(ReportError::WriteFile { path, source }),
        }
    }
}

fn column_row(column: &ColumnInfo) -> Vec<String> {
    vec![
        column.name.clone(),
        column.data_type.clone(),
        column.length.map(|l| l.to_string()).unwrap_or_default(),
        if column.nullable { "Yes" } else { "No" }.to_string(),
        column.default.clone().unwrap_or_default(),
        column.position.to_string(),
        column.description.clone(),
    ]
}

fn constraint_row(constraint: &ConstraintInfo) -> Vec<String> {
    vec![
        constraint.name.clone(),
        constraint.kind.code().to_string(),
        constraint.details(),
    ]
}

/// Walks the metadata of the selected tables and writes the document,
/// reporting each milestone to the injected [`ProgressReporter`].
pub struct ReportAssembler<'a> {
    reader: &'a dyn MetadataReader,
    progress: &'a dyn ProgressReporter,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(reader: &'a dyn MetadataReader, progress: &'a dyn ProgressReporter) -> Self {
        Self { reader, progress }
    }

    pub fn generate(
        &self,
        service_label: &str,
        output_dir: &Path,
        selected: Option<&[String]>,
    ) -> Result<ReportOutput, ReportError> {
        let tables = select_tables(self.reader.list_tables()?, selected)?;
        let total = tables.len() as u64;

        let _span = info_span!("report", tables = total).entered();
        log::info!("Documenting {} tables of {}", total, service_label);

        let mut doc = DocxBuilder::new();

        {
            let _step = info_span!("title_page").entered();
            doc.heading(REPORT_TITLE, 0)?;
            doc.centered(service_label, 32)?;
            doc.centered(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string(), 24)?;
            doc.page_break()?;
        }
        self.progress.report("Created title page", 0, total)?;

        {
            let _step = info_span!("table_of_contents").entered();
            doc.heading("Table of Contents", 1)?;
            doc.field(TOC_INSTRUCTION, TOC_PLACEHOLDER)?;
            doc.page_break()?;
        }
        self.progress.report("Created table of contents", 0, total)?;

        for (i, table) in tables.iter().enumerate() {
            let index = i as u64 + 1;
            self.progress.report(
                &format!("Processing table {}/{}: {}", index, total, table),
                index,
                total,
            )?;
            let _step = info_span!("document_table", table = %table).entered();
            self.document_table(&mut doc, table)?;
        }

        std::fs::create_dir_all(output_dir).map_err(|source| ReportError::CreateDirectory {
            path: output_dir.to_path_buf(),
            source,
        })?;
        self.progress.report("Saving document...", total, total)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (file, filename) = reserve_output_file(output_dir, &timestamp)?;
        let path = output_dir.join(&filename);
        {
            let _step = info_span!("save").entered();
            if let Err(e) = doc.write_package(file, &path) {
                if let Err(remove_err) = std::fs::remove_file(&path) {
                    log::warn!("Failed to remove partial document {}: {}", filename, remove_err);
                }
                return Err(e);
            }
        }
        log::info!("Saved documentation to {}", filename);

        self.progress.report("Documentation completed", total, total)?;

        Ok(ReportOutput {
            path,
            filename,
            tables: total,
        })
    }

    fn document_table(&self, doc: &mut DocxBuilder, table: &str) -> Result<(), ReportError> {
        let description = self.reader.table_comment(table)?;
        let columns = self.reader.columns(table)?;
        let constraints = self.reader.constraints(table)?;

        doc.heading(table, 1)?;
        if !description.is_empty() {
            doc.paragraph(&description)?;
        }

        let rows: Vec<Vec<String>> = columns.iter().map(column_row).collect();
        doc.table(&COLUMN_HEADERS, &rows)?;
        doc.paragraph("")?;

        if !constraints.is_empty() {
            doc.heading("Constraints", 2)?;
            let rows: Vec<Vec<String>> = constraints.iter().map(constraint_row).collect();
            doc.table(&CONSTRAINT_HEADERS, &rows)?;
            doc.paragraph("")?;
        }

        doc.page_break()
    }
}
