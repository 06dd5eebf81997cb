//! Fixed instruction templates, one per file kind.

use filekeep_core::FileKind;

const IMPORTANCE_HINT: &str = "Give more importance to identity documents, invoices, \
certificates, contracts and official letters.";

const TEXT_PROMPT: &str = "Return a JSON object ONLY. Do NOT include any other text. \
The JSON object must have a 'summary' key with a summary of this text document and an \
'importanceScore' key with an integer score from 1 to 10.";

const PDF_PROMPT: &str = "Return a JSON object ONLY. Do NOT include any other text. \
The JSON object must have a 'summary' key with a summary of this PDF document and an \
'importanceScore' key with an integer score from 1 to 10.";

const DOCUMENT_PROMPT: &str = "Return a JSON object ONLY. Do NOT include any other text. \
The JSON object must have a 'summary' key with a summary of this Word document, highlighting \
its key themes, and an 'importanceScore' key with an integer score from 1 to 10.";

const IMAGE_PROMPT: &str = "Return a JSON object ONLY. Do NOT include any other text. \
The JSON object must have a 'description' key describing this image, an 'assessment' key \
assessing how relevant the image is to keep, and an 'importanceScore' key with an integer \
score from 1 to 10.";

/// Instruction sent alongside content of the given kind.
pub fn prompt_for(kind: FileKind) -> String {
    let base = match kind {
        FileKind::Text => TEXT_PROMPT,
        FileKind::Pdf => PDF_PROMPT,
        FileKind::Document => DOCUMENT_PROMPT,
        FileKind::Image => IMAGE_PROMPT,
    };
    format!("{base} {IMPORTANCE_HINT}")
}
