//! Content type detection for listed files.

use std::path::Path;
use tokio::io::AsyncReadExt;

const OCTET_STREAM: &str = "application/octet-stream";
/// Bytes read from the head of a file for magic-number detection
const SNIFF_LEN: u64 = 8192;

/// MIME type from the file name's extension.
pub fn from_extension(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// MIME type from magic bytes, if recognizable.
pub fn sniff(head: &[u8]) -> Option<String> {
    infer::get(head).map(|kind| kind.mime_type().to_string())
}

/// Sniff a stored file: magic bytes first, then the extension of `display_name`.
pub async fn sniff_file(path: &Path, display_name: &str) -> String {
    match read_head(path).await {
        Ok(head) => sniff(&head).unwrap_or_else(|| from_extension(display_name)),
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Could not read file head, falling back to extension"
            );
            from_extension(display_name)
        }
    }
}

async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut head).await?;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_from_extension() {
        assert_eq!(from_extension("report.PDF"), "application/pdf");
        assert_eq!(from_extension("photo.jpeg"), "image/jpeg");
        assert_eq!(from_extension("notes.txt"), "text/plain");
        assert_eq!(from_extension("no_extension"), OCTET_STREAM);
    }

    #[test]
    fn test_sniff_png_and_pdf() {
        assert_eq!(sniff(&PNG_HEADER).as_deref(), Some("image/png"));
        assert_eq!(sniff(b"%PDF-1.7\n").as_deref(), Some("application/pdf"));
        assert_eq!(sniff(b"hello"), None);
    }

    #[tokio::test]
    async fn test_sniff_prefers_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_image.pdf");
        tokio::fs::write(&path, PNG_HEADER).await.unwrap();
        assert_eq!(sniff_file(&path, "image.pdf").await, "image/png");

        let text = dir.path().join("t_notes.txt");
        tokio::fs::write(&text, b"plain words").await.unwrap();
        assert_eq!(sniff_file(&text, "notes.txt").await, "text/plain");
    }
}
