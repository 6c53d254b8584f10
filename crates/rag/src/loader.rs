//! Corpus loading and per-page text extraction.
//!
//! Walks the corpus directory, extracts text from each supported file, and
//! tags every extracted unit with its source path and page number. A file
//! that fails to extract is skipped and reported as a warning; one bad
//! file must never abort ingestion.

use crate::types::{LoadWarning, PageText};
use mediquery_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Load every supported document under `corpus_dir`.
///
/// Returns page-level text records in deterministic order (sorted by path,
/// then page number) plus the list of files that failed to extract.
/// A missing corpus directory yields zero documents without failing.
pub fn load_corpus(corpus_dir: &Path) -> AppResult<(Vec<PageText>, Vec<LoadWarning>)> {
    if !corpus_dir.exists() {
        tracing::warn!("Corpus directory {:?} not found", corpus_dir);
        return Ok((Vec::new(), Vec::new()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(corpus_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && is_supported(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    let mut pages = Vec::new();
    let mut warnings = Vec::new();

    for path in files {
        tracing::debug!("Loading {:?}", path);
        match load_file(&path) {
            Ok(mut file_pages) => pages.append(&mut file_pages),
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                warnings.push(LoadWarning {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Loaded {} pages from corpus ({} files skipped)",
        pages.len(),
        warnings.len()
    );

    Ok((pages, warnings))
}

/// Check whether a file's extension is a supported document kind.
fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("pdf") | Some("txt") | Some("md")
    )
}

/// Extract the pages of a single file.
fn load_file(path: &Path) -> AppResult<Vec<PageText>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => extract_pdf_pages(path),
        Some("txt") | Some("md") => extract_plain_text(path),
        _ => Ok(Vec::new()),
    }
}

/// Extract text per page from a PDF.
///
/// Pages whose extracted text is empty or whitespace are dropped.
fn extract_pdf_pages(path: &Path) -> AppResult<Vec<PageText>> {
    let doc = lopdf::Document::load(path).map_err(|e| AppError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut pages = Vec::new();
    for (&number, _) in doc.get_pages().iter() {
        let text = doc.extract_text(&[number]).map_err(|e| AppError::Load {
            path: path.to_path_buf(),
            message: format!("page {}: {}", number, e),
        })?;

        if text.trim().is_empty() {
            continue;
        }

        pages.push(PageText {
            document: path.to_path_buf(),
            page: number,
            text,
        });
    }

    Ok(pages)
}

/// Read a plain-text or markdown file as a single page 1.
fn extract_plain_text(path: &Path) -> AppResult<Vec<PageText>> {
    let text = std::fs::read_to_string(path).map_err(|e| AppError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![PageText {
        document: path.to_path_buf(),
        page: 1,
        text,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_yields_zero_documents() {
        let (pages, warnings) = load_corpus(Path::new("/nonexistent/corpus")).unwrap();
        assert!(pages.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_plain_text_single_page() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hydration guidance").unwrap();

        let (pages, warnings) = load_corpus(temp.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].text, "hydration guidance");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unsupported_extensions_are_ignored() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("image.png"), [0u8, 1, 2, 3]).unwrap();
        std::fs::write(temp.path().join("notes.txt"), "text").unwrap();

        let (pages, warnings) = load_corpus(temp.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_corrupted_pdf_is_skipped_with_warning() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("broken.pdf"), b"not a pdf at all").unwrap();
        std::fs::write(temp.path().join("valid.txt"), "still indexed").unwrap();

        let (pages, warnings) = load_corpus(temp.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "still indexed");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].path.ends_with("broken.pdf"));
    }

    #[test]
    fn test_empty_file_yields_zero_pages() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("empty.txt"), "   \n").unwrap();

        let (pages, warnings) = load_corpus(temp.path()).unwrap();
        assert!(pages.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_deterministic_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.txt"), "second").unwrap();
        std::fs::write(temp.path().join("a.txt"), "first").unwrap();

        let (pages, _) = load_corpus(temp.path()).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].document.ends_with("a.txt"));
        assert!(pages[1].document.ends_with("b.txt"));
    }
}
