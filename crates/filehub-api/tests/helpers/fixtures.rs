//! Test fixtures: minimal PNG/PDF blobs and multipart forms.

use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;

/// Minimal valid 1x1 PNG bytes.
pub fn create_minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0x89, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// A PDF-looking blob of exactly `size` bytes.
pub fn create_test_pdf(size: usize) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    pdf.resize(size.max(pdf.len()), b' ');
    pdf.truncate(size);
    pdf
}

/// Multipart body with a single `file` field.
pub fn file_form(data: Vec<u8>, file_name: &str, content_type: &str) -> MultipartForm {
    let part = Part::bytes(Bytes::from(data))
        .file_name(file_name.to_string())
        .mime_type(content_type.to_string());
    MultipartForm::new().add_part("file", part)
}
