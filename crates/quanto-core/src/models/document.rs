//! Uploaded documents awaiting analysis.

use std::fmt;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Accepted document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Png,
    Jpeg,
    Pdf,
}

impl DocumentKind {
    /// Map a file extension to a document kind (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }

    /// Detect the kind from the leading bytes of a file.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(DocumentKind::Pdf);
        }
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => Some(DocumentKind::Png),
            Ok(ImageFormat::Jpeg) => Some(DocumentKind::Jpeg),
            _ => None,
        }
    }

    /// Whether a path carries one of the accepted extensions.
    pub fn is_supported_path(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Png => write!(f, "PNG"),
            DocumentKind::Jpeg => write!(f, "JPEG"),
            DocumentKind::Pdf => write!(f, "PDF"),
        }
    }
}

/// A receipt file loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Display name, usually the file name.
    pub name: String,

    /// Verified document kind.
    pub kind: DocumentKind,

    /// Raw file content sent to the OCR service.
    pub bytes: Vec<u8>,

    /// File the document was read from, if any.
    pub source: Option<PathBuf>,
}

/// A submitted file that could not be loaded as a document.
#[derive(Debug)]
pub struct UnreadableDocument {
    pub name: String,
    pub error: DocumentError,
}

impl Document {
    /// Build a document from bytes, checking that the content matches the
    /// kind implied by the name's extension.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let name = name.into();
        let ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let kind = DocumentKind::from_extension(ext)
            .ok_or_else(|| DocumentError::Unsupported(name.clone()))?;

        if bytes.is_empty() {
            return Err(DocumentError::Empty(name));
        }

        if DocumentKind::sniff(&bytes) != Some(kind) {
            return Err(DocumentError::ContentMismatch {
                name,
                expected: kind.to_string(),
            });
        }

        Ok(Self {
            name,
            kind,
            bytes,
            source: None,
        })
    }

    /// Read a document from disk.
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|source| DocumentError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut document = Self::from_bytes(file_name(path), bytes)?;
        document.source = Some(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));
        Ok(document)
    }

    /// Like [`from_path`](Self::from_path), keeping the file name with the
    /// error so the failure can be reported against it.
    pub fn load(path: &Path) -> Result<Self, UnreadableDocument> {
        Self::from_path(path).map_err(|error| UnreadableDocument {
            name: file_name(path),
            error,
        })
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];

    #[test]
    fn test_extension_mapping() {
        assert_eq!(DocumentKind::from_extension("PNG"), Some(DocumentKind::Png));
        assert_eq!(DocumentKind::from_extension("jpg"), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::from_extension("jpeg"), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("tiff"), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(DocumentKind::sniff(b"%PDF-1.7\n"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::sniff(PNG_MAGIC), Some(DocumentKind::Png));
        assert_eq!(DocumentKind::sniff(JPEG_MAGIC), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::sniff(b"hello"), None);
    }

    #[test]
    fn test_from_bytes_accepts_matching_content() {
        let doc = Document::from_bytes("receipt.PDF", b"%PDF-1.4 ...".to_vec()).unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.name, "receipt.PDF");
    }

    #[test]
    fn test_from_bytes_rejects_mismatched_content() {
        let err = Document::from_bytes("receipt.png", b"%PDF-1.4".to_vec()).unwrap_err();
        assert!(matches!(err, DocumentError::ContentMismatch { .. }));
    }

    #[test]
    fn test_from_bytes_rejects_unsupported_and_empty() {
        assert!(matches!(
            Document::from_bytes("notes.txt", b"text".to_vec()),
            Err(DocumentError::Unsupported(_))
        ));
        assert!(matches!(
            Document::from_bytes("empty.jpg", Vec::new()),
            Err(DocumentError::Empty(_))
        ));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpeg");
        std::fs::write(&path, JPEG_MAGIC).unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.name, "scan.jpeg");
        assert_eq!(doc.kind, DocumentKind::Jpeg);
        assert_eq!(doc.len(), JPEG_MAGIC.len());
        assert_eq!(doc.source, Some(path.canonicalize().unwrap()));
    }

    #[test]
    fn test_load_keeps_name_of_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let failed = Document::load(&path).unwrap_err();
        assert_eq!(failed.name, "bad.png");
        assert_eq!(failed.error.to_string(), "bad.png does not look like a PNG file");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Document::from_path(Path::new("/nonexistent/receipt.png")).unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
    }
}
