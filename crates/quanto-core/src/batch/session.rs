//! Interactive session state: pending uploads and the last batch report.

use std::path::Path;

use tracing::debug;

use crate::models::document::Document;
use crate::models::receipt::ReceiptRecord;

use super::BatchReport;

/// State held between user actions.
///
/// Uploads stay pending across analyses. Each analysis replaces the stored
/// report; reports are never merged.
#[derive(Debug, Default)]
pub struct Session {
    uploads: Vec<Document>,
    report: Option<BatchReport>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to the pending uploads and return the name it is
    /// queued under.
    ///
    /// Adding the same file again replaces the earlier copy. A different
    /// file whose name is already taken is queued under its parent
    /// directory (`april/receipt.pdf`), or under a numbered name when that
    /// is taken too.
    pub fn add_upload(&mut self, mut document: Document) -> &str {
        if let Some(index) = self.uploads.iter().position(|d| same_upload(d, &document)) {
            debug!("Replacing upload {}", self.uploads[index].name);
            document.name = self.uploads[index].name.clone();
            self.uploads[index] = document;
            return &self.uploads[index].name;
        }

        document.name = self.unique_name(&document);
        self.uploads.push(document);
        let last = self.uploads.len() - 1;
        &self.uploads[last].name
    }

    fn unique_name(&self, document: &Document) -> String {
        let taken = |name: &str| self.uploads.iter().any(|d| d.name == name);
        if !taken(&document.name) {
            return document.name.clone();
        }

        let parent = document
            .source
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .and_then(|n| n.to_str());
        if let Some(parent) = parent {
            let qualified = format!("{}/{}", parent, document.name);
            if !taken(&qualified) {
                return qualified;
            }
        }

        let mut n = 2;
        loop {
            let candidate = format!("{} ({})", document.name, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Remove a pending upload by name.
    pub fn remove_upload(&mut self, name: &str) -> Option<Document> {
        let index = self.uploads.iter().position(|d| d.name == name)?;
        Some(self.uploads.remove(index))
    }

    /// Drop all pending uploads. The last report is kept.
    pub fn clear_uploads(&mut self) {
        self.uploads.clear();
    }

    pub fn uploads(&self) -> &[Document] {
        &self.uploads
    }

    /// Store a new report, returning the one it replaces.
    pub fn replace_report(&mut self, report: BatchReport) -> Option<BatchReport> {
        self.report.replace(report)
    }

    pub fn report(&self) -> Option<&BatchReport> {
        self.report.as_ref()
    }

    /// Records of the last batch, empty before the first analysis.
    pub fn records(&self) -> Vec<&ReceiptRecord> {
        self.report
            .as_ref()
            .map(|r| r.records().collect())
            .unwrap_or_default()
    }
}

/// Files are the same upload when they come from the same path; documents
/// built in memory match by name.
fn same_upload(a: &Document, b: &Document) -> bool {
    match (&a.source, &b.source) {
        (Some(a), Some(b)) => a == b,
        (None, None) => a.name == b.name,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::AnalyzedReceipt;
    use crate::models::config::FailurePolicy;
    use pretty_assertions::assert_eq;

    fn document(name: &str, body: &[u8]) -> Document {
        Document::from_bytes(name, body.to_vec()).unwrap()
    }

    fn write_receipt(dir: &Path, body: &[u8]) -> Document {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("receipt.pdf");
        std::fs::write(&path, body).unwrap();
        Document::from_path(&path).unwrap()
    }

    fn report_with(merchants: &[&str]) -> BatchReport {
        let mut report = BatchReport::empty(FailurePolicy::SkipAndReport);
        report.submitted = merchants.len();
        report.receipts = merchants
            .iter()
            .enumerate()
            .map(|(i, m)| AnalyzedReceipt {
                position: i + 1,
                name: format!("{}.pdf", m),
                record: ReceiptRecord {
                    merchant_name: Some(m.to_string()),
                    ..ReceiptRecord::default()
                },
            })
            .collect();
        report
    }

    #[test]
    fn test_new_batch_replaces_previous() {
        let mut session = Session::new();
        assert!(session.records().is_empty());

        assert!(session.replace_report(report_with(&["A", "B", "C"])).is_none());
        assert_eq!(session.records().len(), 3);

        let previous = session.replace_report(report_with(&["D"])).unwrap();
        assert_eq!(previous.receipts.len(), 3);
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].merchant_name.as_deref(), Some("D"));
    }

    #[test]
    fn test_uploads_deduplicated_by_name() {
        let mut session = Session::new();
        session.add_upload(document("a.pdf", b"%PDF-1.4 one"));
        session.add_upload(document("b.pdf", b"%PDF-1.4 two"));
        session.add_upload(document("a.pdf", b"%PDF-1.4 three"));

        assert_eq!(session.uploads().len(), 2);
        assert_eq!(session.uploads()[0].bytes, b"%PDF-1.4 three".to_vec());

        assert!(session.remove_upload("b.pdf").is_some());
        assert!(session.remove_upload("b.pdf").is_none());

        session.replace_report(report_with(&["A"]));
        session.clear_uploads();
        assert!(session.uploads().is_empty());
        assert!(session.report().is_some());
    }

    #[test]
    fn test_same_file_name_from_different_folders() {
        let root = tempfile::tempdir().unwrap();
        let march = write_receipt(&root.path().join("march"), b"%PDF-1.7 march");
        let april = write_receipt(&root.path().join("april"), b"%PDF-1.7 april");

        let mut session = Session::new();
        assert_eq!(session.add_upload(march.clone()), "receipt.pdf");
        assert_eq!(session.add_upload(april), "april/receipt.pdf");
        assert_eq!(session.uploads().len(), 2);

        // the same file again replaces its earlier copy
        assert_eq!(session.add_upload(march), "receipt.pdf");
        assert_eq!(session.uploads().len(), 2);

        assert!(session.remove_upload("april/receipt.pdf").is_some());
        let names: Vec<_> = session.uploads().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["receipt.pdf"]);
    }

    #[test]
    fn test_numbered_name_when_folder_name_is_taken() {
        let root = tempfile::tempdir().unwrap();
        let first = write_receipt(&root.path().join("a/shop"), b"%PDF-1.7 one");
        let second = write_receipt(&root.path().join("b/shop"), b"%PDF-1.7 two");
        let third = write_receipt(&root.path().join("c/shop"), b"%PDF-1.7 three");

        let mut session = Session::new();
        session.add_upload(first);
        session.add_upload(second);
        assert_eq!(session.add_upload(third), "receipt.pdf (2)");
        assert_eq!(session.uploads().len(), 3);
    }
}
