mod common;

use common::{build_pdf, file_names};
use ragchat::error::OutlineError;
use ragchat::models::{SkipReason, SplitConfig};
use ragchat::services::{OutlineSurvey, PdfDocument, SplitOptions, split_document};
use tempfile::TempDir;

const BOOKMARKS: &[(&str, u32)] = &[
    ("Introduction", 0),
    ("Chapter 1: Setup", 2),
    ("Index", 5),
];

fn default_exclusions() -> Vec<String> {
    SplitConfig::default().exclude_titles
}

#[test]
fn test_outline_is_read_in_document_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.pdf");
    build_pdf(&path, 6, BOOKMARKS);

    let survey = OutlineSurvey::load(&path).unwrap();
    assert_eq!(survey.document.page_count(), 6);
    assert_eq!(survey.levels.len(), 1);
    assert_eq!(survey.levels[0].count, 3);
    assert_eq!(
        survey.levels[0].examples,
        vec!["Introduction", "Chapter 1: Setup", "Index"]
    );
    assert_eq!(survey.resolve_level(None).unwrap(), Some(0));
    assert!(matches!(
        survey.resolve_level(Some(2)),
        Err(OutlineError::UnknownLevel { level: 2, .. })
    ));
}

#[test]
fn test_split_three_bookmarks_into_two_chapters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.pdf");
    build_pdf(&path, 6, BOOKMARKS);
    let out = dir.path().join("out");

    let survey = OutlineSurvey::load(&path).unwrap();
    let options = SplitOptions {
        output_dir: Some(out.clone()),
        exclusions: default_exclusions(),
        keep_chapters: true,
    };
    let summary = split_document(&survey, 0, &options).unwrap();

    assert_eq!(
        summary.chapters_written,
        vec!["book Introduction.pdf", "Setup.pdf"]
    );
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].title, "Index");
    assert_eq!(summary.skipped[0].reason, SkipReason::Excluded);

    // The excluded "Index" chapter covers the last page only.
    assert_eq!(summary.original_pages, 6);
    assert_eq!(summary.merged_pages, 5);

    let intro = PdfDocument::open(&out.join("book Introduction.pdf")).unwrap();
    assert_eq!(intro.page_count(), 2);
    let setup = PdfDocument::open(&out.join("Setup.pdf")).unwrap();
    assert_eq!(setup.page_count(), 3);

    let merged = PdfDocument::open(&out.join("book.pdf")).unwrap();
    assert_eq!(merged.page_count(), 5);
    assert!(merged.outline().is_empty());

    // The source is untouched when writing elsewhere.
    assert_eq!(PdfDocument::open(&path).unwrap().page_count(), 6);
}

#[test]
fn test_split_in_place_replaces_source_and_removes_chapters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.pdf");
    build_pdf(&path, 6, BOOKMARKS);

    let survey = OutlineSurvey::load(&path).unwrap();
    let options = SplitOptions {
        output_dir: None,
        exclusions: default_exclusions(),
        keep_chapters: false,
    };
    let summary = split_document(&survey, 0, &options).unwrap();
    assert_eq!(summary.merged_pages, 5);

    assert_eq!(file_names(dir.path()), vec!["book.pdf"]);
    assert_eq!(PdfDocument::open(&path).unwrap().page_count(), 5);
}

#[test]
fn test_single_page_chapters_are_dropped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.pdf");
    build_pdf(&path, 5, &[("Origins", 0), ("Errata", 3), ("Appendix", 4)]);
    let out = dir.path().join("out");

    let survey = OutlineSurvey::load(&path).unwrap();
    let options = SplitOptions {
        output_dir: Some(out),
        exclusions: Vec::new(),
        keep_chapters: false,
    };
    let summary = split_document(&survey, 0, &options).unwrap();

    assert_eq!(summary.chapters_written, vec!["Origins.pdf"]);
    let reasons: Vec<SkipReason> = summary.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![SkipReason::SinglePage, SkipReason::SinglePage]);
    assert_eq!(summary.merged_pages, 3);
}

#[test]
fn test_document_without_outline_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.pdf");
    build_pdf(&path, 3, &[]);

    assert!(matches!(
        OutlineSurvey::load(&path),
        Err(OutlineError::NoOutline)
    ));
    assert_eq!(file_names(dir.path()), vec!["plain.pdf"]);
}

#[test]
fn test_everything_excluded_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.pdf");
    build_pdf(&path, 4, &[("Cover", 0), ("Index", 2)]);

    let survey = OutlineSurvey::load(&path).unwrap();
    let options = SplitOptions {
        output_dir: None,
        exclusions: default_exclusions(),
        keep_chapters: false,
    };
    assert!(matches!(
        split_document(&survey, 0, &options),
        Err(OutlineError::NothingToWrite)
    ));
    assert_eq!(PdfDocument::open(&path).unwrap().page_count(), 4);
}
