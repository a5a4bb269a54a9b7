//! Bookmark tree and chapter plans for outline-based PDF splitting.

use serde::Serialize;

/// A bookmark: title plus zero-based starting page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub title: String,
    pub page: u32,
}

impl OutlineEntry {
    pub fn new(title: impl Into<String>, page: u32) -> Self {
        Self {
            title: title.into(),
            page,
        }
    }
}

/// One node of the outline tree. A `Group` holds the children one level below the
/// entry that precedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineNode {
    Leaf(OutlineEntry),
    Group(Vec<OutlineNode>),
}

impl OutlineNode {
    pub fn leaf(title: impl Into<String>, page: u32) -> Self {
        OutlineNode::Leaf(OutlineEntry::new(title, page))
    }
}

/// Entry count and a few sample titles for one depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub level: usize,
    pub count: usize,
    pub examples: Vec<String>,
}

/// A chapter that will be written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterPlan {
    /// Title after the introduction rename.
    pub title: String,
    /// Sanitized, de-duplicated file stem.
    pub file_stem: String,
    /// First page, zero-based, inclusive.
    pub start_page: u32,
    /// Zero-based, exclusive.
    pub end_page: u32,
}

impl ChapterPlan {
    pub fn page_count(&self) -> u32 {
        self.end_page.saturating_sub(self.start_page)
    }

    pub fn pages(&self) -> std::ops::Range<u32> {
        self.start_page..self.end_page
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Excluded,
    SinglePage,
    EmptyRange,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Excluded => write!(f, "matches exclusion list"),
            SkipReason::SinglePage => write!(f, "single-page chapter"),
            SkipReason::EmptyRange => write!(f, "empty page range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub title: String,
    pub reason: SkipReason,
}

/// Result of planning a split: chapters in document order plus everything dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    pub document_name: String,
    pub page_count: u32,
    pub chapters: Vec<ChapterPlan>,
    pub skipped: Vec<SkippedEntry>,
}

impl SplitPlan {
    /// Zero-based pages kept across all chapters, ascending and unique.
    pub fn kept_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.chapters.iter().flat_map(|c| c.pages()).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

/// What the split command did with one input file.
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub source: String,
    pub level: usize,
    pub chapters_written: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
    pub merged_path: String,
    pub original_pages: u32,
    pub merged_pages: u32,
}
