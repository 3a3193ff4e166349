//! MIME detection and Base64 encoding for multimodal attachments.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use gchat_core::GchatError;
use std::path::Path;

/// Types Gemini accepts as inline data, checked before `mime_guess`.
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xml", "text/xml"),
    ("json", "application/json"),
    ("js", "text/javascript"),
    ("py", "text/x-python"),
    ("rs", "text/x-rust"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("pdf", "application/pdf"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
];

const FALLBACK_TYPE: &str = "text/plain";

/// Maps a file path to a MIME type by its extension.
///
/// The fixed table wins, then `mime_guess`; anything neither knows is
/// treated as `text/plain`.
pub fn detect_mime(path: &Path) -> String {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return FALLBACK_TYPE.to_string();
    };

    if let Some((_, mime)) = KNOWN_TYPES.iter().find(|(known, _)| *known == ext) {
        return mime.to_string();
    }

    mime_guess::from_ext(&ext)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_TYPE.to_string())
}

/// Reads the whole file and returns it as single-line standard Base64.
pub fn encode_base64(path: &Path) -> Result<String, GchatError> {
    let bytes = std::fs::read(path).map_err(|e| GchatError::Encoding {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(BASE64_STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixed_table() {
        assert_eq!(detect_mime(Path::new("notes.txt")), "text/plain");
        assert_eq!(detect_mime(Path::new("data.json")), "application/json");
        assert_eq!(detect_mime(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(detect_mime(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(detect_mime(Path::new("shot.png")), "image/png");
        assert_eq!(detect_mime(Path::new("paper.pdf")), "application/pdf");
    }

    #[test]
    fn test_unknown_extension_defaults_to_text_plain() {
        assert_eq!(detect_mime(Path::new("blob.zzzunknown")), "text/plain");
        assert_eq!(detect_mime(Path::new("Makefile")), "text/plain");
    }

    #[test]
    fn test_mime_guess_fills_gaps() {
        assert_eq!(detect_mime(Path::new("page.svg")), "image/svg+xml");
    }

    #[test]
    fn test_encode_base64_single_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world\nsecond line\n").unwrap();

        let encoded = encode_base64(&path).unwrap();
        assert_eq!(encoded, "aGVsbG8gd29ybGQKc2Vjb25kIGxpbmUK");
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_encode_missing_file_is_encoding_error() {
        let err = encode_base64(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, GchatError::Encoding { .. }));
    }
}
