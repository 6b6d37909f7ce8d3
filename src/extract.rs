//! Plain-text extraction from uploaded study material (.txt, .pdf, .docx).

use std::io::{Cursor, Read};

use quick_xml::{events::Event, Reader};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
  #[error("Unsupported file format")]
  Unsupported,
  #[error("pdf: {0}")]
  Pdf(String),
  #[error("docx: {0}")]
  Docx(String),
}

/// Pick the extractor from the file extension (case-insensitive).
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
  let ext = file_name
    .rsplit_once('.')
    .map(|(_, e)| e.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "txt" => Ok(String::from_utf8_lossy(bytes).into_owned()),
    "pdf" => pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string())),
    "docx" => docx_text(bytes),
    _ => Err(ExtractError::Unsupported),
  }
}

fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
  let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
  let mut xml = String::new();
  archive
    .by_name("word/document.xml")
    .map_err(|e| ExtractError::Docx(e.to_string()))?
    .read_to_string(&mut xml)
    .map_err(|e| ExtractError::Docx(e.to_string()))?;
  document_xml_text(&xml)
}

/// Collect the contents of `<w:t>` runs; a closed `<w:p>` ends a paragraph,
/// `<w:tab/>` and `<w:br/>` map to a tab and a newline.
pub fn document_xml_text(xml: &str) -> Result<String, ExtractError> {
  let docx_err = |e: quick_xml::Error| ExtractError::Docx(e.to_string());
  let mut reader = Reader::from_str(xml);
  let mut out = String::new();
  let mut in_run_text = false;
  loop {
    match reader.read_event().map_err(docx_err)? {
      Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
      Event::End(e) => match e.name().as_ref() {
        b"w:t" => in_run_text = false,
        b"w:p" => out.push('\n'),
        _ => {}
      },
      Event::Empty(e) => match e.name().as_ref() {
        b"w:tab" => out.push('\t'),
        b"w:br" | b"w:p" => out.push('\n'),
        _ => {}
      },
      Event::Text(t) if in_run_text => out.push_str(&t.unescape().map_err(docx_err)?),
      Event::Eof => break,
      _ => {}
    }
  }
  Ok(out.trim_end().to_string())
}
