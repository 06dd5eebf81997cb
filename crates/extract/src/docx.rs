use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::ExtractError;

/// Main body part inside the OOXML package.
const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the raw text of a `.docx` document held in memory.
///
/// Paragraphs (`w:p`) and explicit breaks become newlines, tabs become `\t`,
/// everything else except text runs (`w:t`) is dropped.
pub(crate) fn extract_text(path: &Path, bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::failed(path, e))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractError::failed(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::failed(path, e))?;

    document_text(&xml).map_err(|e| ExtractError::failed(path, e))
}

fn document_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim_end().to_owned())
}
