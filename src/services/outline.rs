//! Outline partitioning: level survey, flatten-at-depth, title policy and chapter ranges.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    ChapterPlan, LevelSummary, OutlineEntry, OutlineNode, SkipReason, SkippedEntry, SplitPlan,
};

const EXAMPLES_PER_LEVEL: usize = 3;

static CHAPTER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:chapter|ch|section)\s*\d+(?:\.\d+)*\s*[-.:]?\s*|^\d+(?:\.\d+)*(?:[\s.\-:]+|\b)?",
    )
    .unwrap()
});

/// Depth-first walk of the tree, yielding `(depth, entry)` in document order.
pub fn walk(nodes: &[OutlineNode]) -> Vec<(usize, &OutlineEntry)> {
    let mut out = Vec::new();
    let mut stack = vec![(nodes.iter(), 0usize)];

    loop {
        let Some((iter, depth)) = stack.last_mut() else {
            break;
        };
        let depth = *depth;
        match iter.next() {
            Some(OutlineNode::Leaf(entry)) => out.push((depth, entry)),
            Some(OutlineNode::Group(children)) => stack.push((children.iter(), depth + 1)),
            None => {
                stack.pop();
            }
        }
    }

    out
}

/// Entry count and up to three sample titles per depth, shallowest first.
pub fn survey_levels(nodes: &[OutlineNode]) -> Vec<LevelSummary> {
    let mut levels: BTreeMap<usize, LevelSummary> = BTreeMap::new();

    for (depth, entry) in walk(nodes) {
        let summary = levels.entry(depth).or_insert_with(|| LevelSummary {
            level: depth,
            count: 0,
            examples: Vec::new(),
        });
        summary.count += 1;
        if summary.examples.len() < EXAMPLES_PER_LEVEL {
            summary.examples.push(entry.title.clone());
        }
    }

    levels.into_values().collect()
}

/// The level to split at without asking: level 0 when it is the only one.
pub fn auto_level(levels: &[LevelSummary]) -> Option<usize> {
    match levels {
        [only] if only.level == 0 => Some(0),
        _ => None,
    }
}

/// Entries exactly at `level`, in document order.
pub fn entries_at_level(nodes: &[OutlineNode], level: usize) -> Vec<OutlineEntry> {
    walk(nodes)
        .into_iter()
        .filter(|(depth, _)| *depth == level)
        .map(|(_, entry)| entry.clone())
        .collect()
}

fn normalize_once(title: &str) -> String {
    let stripped = CHAPTER_PREFIX.replace(title, "");
    let kept: String = stripped
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Comparison key for a title: numbering prefixes and punctuation removed, lowercased,
/// whitespace collapsed. Normalizing a normalized title returns it unchanged.
pub fn normalize_title(title: &str) -> String {
    let mut current = normalize_once(title);
    // Each pass can expose another prefix ("Chapter 1 - 2. Setup"); after the first pass a
    // change only ever removes a prefix, so this terminates.
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Title as a file stem: numbering prefix removed, only alphanumerics, spaces, `.` and `-`.
pub fn sanitize_chapter_title(title: &str) -> String {
    let stripped = CHAPTER_PREFIX.replace(title.trim(), "");
    let kept: String = stripped
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '.' || *c == '-')
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| c == '-' || c == '.' || c == ' ')
        .to_string()
}

/// Apply the chapter policy to `entries` and compute each surviving chapter's page range.
///
/// `document_name` is the source file stem and `exclusions` holds raw titles; both the
/// exclusions and the entry titles are compared in normalized form.
pub fn plan_chapters(
    document_name: &str,
    page_count: u32,
    entries: &[OutlineEntry],
    exclusions: &[String],
) -> SplitPlan {
    let excluded: HashSet<String> = exclusions.iter().map(|t| normalize_title(t)).collect();
    let mut used_stems: HashSet<String> = HashSet::from([document_name.to_lowercase()]);
    let mut plan = SplitPlan {
        document_name: document_name.to_string(),
        page_count,
        ..Default::default()
    };

    for (i, entry) in entries.iter().enumerate() {
        let mut title = entry.title.trim().to_string();
        if normalize_title(&title) == "introduction" {
            title = format!("{document_name} Introduction");
        }

        if excluded.contains(&normalize_title(&title)) {
            plan.skipped.push(SkippedEntry {
                title,
                reason: SkipReason::Excluded,
            });
            continue;
        }

        let start_page = entry.page.min(page_count);
        let end_page = entries
            .get(i + 1)
            .map_or(page_count, |next| next.page)
            .min(page_count);

        let reason = match end_page.saturating_sub(start_page) {
            0 => Some(SkipReason::EmptyRange),
            1 => Some(SkipReason::SinglePage),
            _ => None,
        };
        if let Some(reason) = reason {
            plan.skipped.push(SkippedEntry { title, reason });
            continue;
        }

        let mut stem = sanitize_chapter_title(&title);
        if stem.is_empty() {
            stem = format!("{document_name}_Part_{}", i + 1);
        }
        let file_stem = dedupe_stem(&stem, &mut used_stems);

        plan.chapters.push(ChapterPlan {
            title,
            file_stem,
            start_page,
            end_page,
        });
    }

    plan
}

fn dedupe_stem(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.to_string();
    let mut k = 2;
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{stem} ({k})");
        k += 1;
    }
    candidate
}
