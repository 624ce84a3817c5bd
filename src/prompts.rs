//! Built-in signatures used by the extractors.
//!
//! Every prompt the crate sends lives here as a [`Signature`]: the
//! instructions, the input fields and the output field descriptions. Tests
//! can inspect them without a model.

use crate::signature::{FieldKind, Signature};

/// Instructions for whole-document extraction.
pub const DOCUMENT_INSTRUCTIONS: &str = "Extract structured data from document and return as JSON format. \
Example: {\"patient_name\": \"John Doe\", \"age\": 30, \"lab_results\": {\"glucose\": \"95 mg/dL\"}}";

/// Instructions for single-page extraction.
pub const PAGE_INSTRUCTIONS: &str = "Extract structured data from a single page and return as JSON format. \
Example: {\"patient_name\": \"John Doe\", \"lab_results\": {\"glucose\": \"95 mg/dL\"}}";

pub const DOCUMENT_OUTPUT_DESC: &str =
    "Extract all relevant data and return as valid JSON object only, no markdown formatting";

pub const PAGE_OUTPUT_DESC: &str =
    "Extract all relevant data from this page and return as valid JSON object only, no markdown formatting";

/// Name of the JSON output field shared by both extraction signatures.
pub const EXTRACTED_DATA: &str = "extracted_data";

/// `document_text: str, document_image: Image -> extracted_data: str`
pub fn document_extraction() -> Signature {
    Signature::new(DOCUMENT_INSTRUCTIONS)
        .input("document_text", FieldKind::Text)
        .input("document_image", FieldKind::Image)
        .output(EXTRACTED_DATA, FieldKind::Text, Some(DOCUMENT_OUTPUT_DESC))
}

/// `page_text: str, page_image: Image, page_number: int -> extracted_data: str`
pub fn page_extraction() -> Signature {
    Signature::new(PAGE_INSTRUCTIONS)
        .input("page_text", FieldKind::Text)
        .input("page_image", FieldKind::Image)
        .input("page_number", FieldKind::Integer)
        .output(EXTRACTED_DATA, FieldKind::Text, Some(PAGE_OUTPUT_DESC))
}

/// Text-only variant of [`document_extraction`], used when a document has
/// no page image to attach.
pub fn text_only_extraction() -> Signature {
    Signature::new(DOCUMENT_INSTRUCTIONS)
        .input("document_text", FieldKind::Text)
        .output(EXTRACTED_DATA, FieldKind::Text, Some(DOCUMENT_OUTPUT_DESC))
}

/// Tiny `text -> sentiment` signature for checking that a deployment answers.
pub fn connectivity_probe() -> Signature {
    Signature::new("Classify the sentiment of the text as positive, negative or neutral.")
        .input("text", FieldKind::Text)
        .output("sentiment", FieldKind::Text, None)
}

/// Probe input sent by `doc2json check`.
pub const PROBE_TEXT: &str = "This is a test message.";
