//! Minimal WordprocessingML (`.docx`) writer.
//!
//! The document body is streamed through a quick-xml writer; the fixed
//! package parts (styles, settings, relationships) are static. The
//! finished package is written with `zip`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ReportError;

/// MIME type of `.docx` files.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Usable page width in twips (US Letter minus one-inch margins).
const TEXT_WIDTH: u32 = 9360;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings" Target="settings.xml"/></Relationships>"#;

// Word refreshes fields (the table of contents) when the file is opened.
const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:updateFields w:val="true"/></w:settings>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="20"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120"/></w:pPr></w:pPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="center"/><w:spacing w:before="2400" w:after="480"/></w:pPr><w:rPr><w:b/><w:sz w:val="56"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:color w:val="1F3864"/><w:sz w:val="32"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="80"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:color w:val="2F5496"/><w:sz w:val="26"/></w:rPr></w:style>
<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders><w:tblCellMar><w:left w:w="108" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>
</w:styles>"#;

/// Paragraph style for headings: level 0 is the document title.
fn heading_style(level: u8) -> &'static str {
    match level {
        0 => "Title",
        1 => "Heading1",
        _ => "Heading2",
    }
}

fn xml_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Xml(e.to_string())
}

/// Builds the body of a word-processing document.
pub struct DocxBuilder {
    writer: Writer<Vec<u8>>,
}

impl Default for DocxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ReportError> {
        let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(elem)).map_err(xml_err)
    }

    fn end(&mut self, name: &str) -> Result<(), ReportError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ReportError> {
        let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(elem)).map_err(xml_err)
    }

    fn run(&mut self, text: &str, bold: bool, size: Option<u32>) -> Result<(), ReportError> {
        self.start("w:r", &[])?;
        if bold || size.is_some() {
            self.start("w:rPr", &[])?;
            if bold {
                self.empty("w:b", &[])?;
            }
            if let Some(size) = size {
                let size = size.to_string();
                self.empty("w:sz", &[("w:val", size.as_str())])?;
            }
            self.end("w:rPr")?;
        }
        self.start("w:t", &[("xml:space", "preserve")])?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)?;
        self.end("w:t")?;
        self.end("w:r")
    }

    fn paragraph_with(
        &mut self,
        style: Option<&str>,
        centered: bool,
        text: &str,
        bold: bool,
        size: Option<u32>,
    ) -> Result<(), ReportError> {
        self.start("w:p", &[])?;
        if style.is_some() || centered {
            self.start("w:pPr", &[])?;
            if let Some(style) = style {
                self.empty("w:pStyle", &[("w:val", style)])?;
            }
            if centered {
                self.empty("w:jc", &[("w:val", "center")])?;
            }
            self.end("w:pPr")?;
        }
        if !text.is_empty() {
            self.run(text, bold, size)?;
        }
        self.end("w:p")
    }

    pub fn heading(&mut self, text: &str, level: u8) -> Result<(), ReportError> {
        self.paragraph_with(Some(heading_style(level)), level == 0, text, false, None)
    }

    pub fn paragraph(&mut self, text: &str) -> Result<(), ReportError> {
        self.paragraph_with(None, false, text, false, None)
    }

    /// Centered paragraph; `half_points` is the font size (24 = 12pt).
    pub fn centered(&mut self, text: &str, half_points: u32) -> Result<(), ReportError> {
        self.paragraph_with(None, true, text, false, Some(half_points))
    }

    pub fn page_break(&mut self) -> Result<(), ReportError> {
        self.start("w:p", &[])?;
        self.start("w:r", &[])?;
        self.empty("w:br", &[("w:type", "page")])?;
        self.end("w:r")?;
        self.end("w:p")
    }

    /// Inserts a field (e.g. `TOC \o "1-3"`) with placeholder text that
    /// Word replaces when fields are updated.
    pub fn field(&mut self, instruction: &str, placeholder: &str) -> Result<(), ReportError> {
        self.start("w:p", &[])?;

        self.start("w:r", &[])?;
        self.empty("w:fldChar", &[("w:fldCharType", "begin")])?;
        self.end("w:r")?;

        self.start("w:r", &[])?;
        self.start("w:instrText", &[("xml:space", "preserve")])?;
        self.writer
            .write_event(Event::Text(BytesText::new(instruction)))
            .map_err(xml_err)?;
        self.end("w:instrText")?;
        self.end("w:r")?;

        self.start("w:r", &[])?;
        self.empty("w:fldChar", &[("w:fldCharType", "separate")])?;
        self.end("w:r")?;

        self.run(placeholder, false, None)?;

        self.start("w:r", &[])?;
        self.empty("w:fldChar", &[("w:fldCharType", "end")])?;
        self.end("w:r")?;

        self.end("w:p")
    }

    /// Grid table with a bold header row; every cell is centered.
    pub fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) -> Result<(), ReportError> {
        let cols = headers.len().max(1) as u32;
        let col_width = (TEXT_WIDTH / cols).to_string();

        self.start("w:tbl", &[])?;
        self.start("w:tblPr", &[])?;
        self.empty("w:tblStyle", &[("w:val", "TableGrid")])?;
        self.empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")])?;
        self.end("w:tblPr")?;

        self.start("w:tblGrid", &[])?;
        for _ in headers {
            self.empty("w:gridCol", &[("w:w", col_width.as_str())])?;
        }
        self.end("w:tblGrid")?;

        self.start("w:tr", &[])?;
        for header in headers {
            self.cell(header, true, &col_width)?;
        }
        self.end("w:tr")?;

        for row in rows {
            self.start("w:tr", &[])?;
            for cell in row {
                self.cell(cell, false, &col_width)?;
            }
            self.end("w:tr")?;
        }

        self.end("w:tbl")
    }

    fn cell(&mut self, text: &str, bold: bool, width: &str) -> Result<(), ReportError> {
        self.start("w:tc", &[])?;
        self.start("w:tcPr", &[])?;
        self.empty("w:tcW", &[("w:w", width), ("w:type", "dxa")])?;
        self.end("w:tcPr")?;
        self.paragraph_with(None, true, text, bold, None)?;
        self.end("w:tc")
    }

    /// Complete `word/document.xml` for the body written so far.
    fn document_xml(self) -> Result<Vec<u8>, ReportError> {
        let body = self.writer.into_inner();

        let mut doc = Writer::new(Vec::with_capacity(body.len() + 512));
        doc.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err)?;
        let root = BytesStart::new("w:document")
            .with_attributes([("xmlns:w", W_NS), ("xmlns:r", R_NS)]);
        doc.write_event(Event::Start(root)).map_err(xml_err)?;
        doc.write_event(Event::Start(BytesStart::new("w:body")))
            .map_err(xml_err)?;

        let mut out = doc.into_inner();
        out.extend_from_slice(&body);
        out.extend_from_slice(
            br#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        );
        Ok(out)
    }

    /// Packages the document and writes it to `path`, replacing any
    /// existing file.
    pub fn save(self, path: &Path) -> Result<(), ReportError> {
        let file = File::create(path).map_err(|source| ReportError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_package(file, path)
    }

    /// Packages the document into an already opened `file`. `path` is only
    /// used in errors.
    pub fn write_package(self, file: File, path: &Path) -> Result<(), ReportError> {
        let document = self.document_xml()?;
        let write_err = |source| ReportError::WriteFile {
            path: path.to_path_buf(),
            source,
        };

        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, &[u8]); 6] = [
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", PACKAGE_RELS.as_bytes()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
            ("word/styles.xml", STYLES.as_bytes()),
            ("word/settings.xml", SETTINGS.as_bytes()),
            ("word/document.xml", document.as_slice()),
        ];
        for (name, bytes) in parts {
            zip.start_file(name, options)?;
            zip.write_all(bytes).map_err(write_err)?;
        }
        zip.finish()?;
        Ok(())
    }
}
