//! Content-type resolution for uploaded documents.
//!
//! Clients routinely upload with a missing or generic MIME type. The merge
//! policy keys on the exact string `application/pdf`, so the upload path
//! resolves a usable content type once, at ingest.

/// Resolve the content type for an uploaded document.
///
/// Order of preference:
/// 1. the claimed type, when it is specific;
/// 2. magic-byte detection over the decoded payload;
/// 3. extension-based fallback for text formats without magic bytes;
/// 4. `application/octet-stream`.
pub fn resolve_content_type(filename: &str, decoded: &[u8], claimed: &str) -> String {
    let claimed = claimed.trim();
    if !claimed.is_empty() && claimed != "application/octet-stream" {
        return claimed.to_string();
    }

    if let Some(kind) = infer::get(decoded) {
        return kind.mime_type().to_string();
    }

    if let Some(ext) = filename.rsplit('.').next() {
        if let Some(mime) = mime_from_extension(ext) {
            return mime.to_string();
        }
    }

    "application/octet-stream".to_string()
}

/// Extension fallback for common text formats `infer` cannot sniff.
fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "txt" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        "xml" => Some("application/xml"),
        "html" | "htm" => Some("text/html"),
        "md" => Some("text/markdown"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_claim_wins() {
        assert_eq!(
            resolve_content_type("scan.pdf", b"garbage", "application/pdf"),
            "application/pdf"
        );
    }

    #[test]
    fn test_magic_bytes_beat_generic_claim() {
        assert_eq!(
            resolve_content_type("upload.bin", b"%PDF-1.5 rest of file", "application/octet-stream"),
            "application/pdf"
        );
    }

    #[test]
    fn test_magic_bytes_beat_empty_claim() {
        let png = [0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(resolve_content_type("pic", &png, ""), "image/png");
    }

    #[test]
    fn test_extension_fallback_for_text() {
        assert_eq!(resolve_content_type("notes.txt", b"plain words", ""), "text/plain");
    }

    #[test]
    fn test_octet_stream_last_resort() {
        assert_eq!(
            resolve_content_type("mystery", &[0x00, 0x01, 0x02], ""),
            "application/octet-stream"
        );
    }
}
