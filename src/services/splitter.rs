//! Split a PDF into chapter files by its outline, then reassemble the kept chapters.

use std::path::{Path, PathBuf};

use crate::error::{OutlineError, PdfError};
use crate::models::{LevelSummary, OutlineNode, SplitPlan, SplitSummary};
use crate::services::outline::{auto_level, entries_at_level, plan_chapters, survey_levels};
use crate::services::pdf::PdfDocument;
use crate::utils::file_name_string;
use crate::{debug_event, log_event};

#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    /// Where chapter files and the merged document go; defaults to the source directory.
    pub output_dir: Option<PathBuf>,
    /// Raw titles to drop; compared after normalization.
    pub exclusions: Vec<String>,
    /// Leave the per-chapter files next to the merged document.
    pub keep_chapters: bool,
}

/// A loaded PDF together with its outline and per-level counts.
#[derive(Debug)]
pub struct OutlineSurvey {
    pub document: PdfDocument,
    pub outline: Vec<OutlineNode>,
    pub levels: Vec<LevelSummary>,
}

impl OutlineSurvey {
    /// Load `path` and survey its outline. A document without bookmarks is an error.
    pub fn load(path: &Path) -> Result<Self, OutlineError> {
        let document = PdfDocument::open(path)?;
        let outline = document.outline();
        if outline.is_empty() {
            return Err(OutlineError::NoOutline);
        }
        let levels = survey_levels(&outline);
        Ok(Self {
            document,
            outline,
            levels,
        })
    }

    pub fn available_levels(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.level).collect()
    }

    /// Validate an explicit level, or pick one automatically when that is unambiguous.
    /// `Ok(None)` means the caller has to choose.
    pub fn resolve_level(&self, requested: Option<usize>) -> Result<Option<usize>, OutlineError> {
        match requested {
            Some(level) if self.levels.iter().any(|l| l.level == level) => Ok(Some(level)),
            Some(level) => Err(OutlineError::UnknownLevel {
                level,
                available: self.available_levels(),
            }),
            None => Ok(auto_level(&self.levels)),
        }
    }

    pub fn plan(&self, level: usize, exclusions: &[String]) -> Result<SplitPlan, OutlineError> {
        let entries = entries_at_level(&self.outline, level);
        if entries.is_empty() {
            return Err(OutlineError::EmptyLevel(level));
        }
        Ok(plan_chapters(
            &self.document.stem(),
            self.document.page_count(),
            &entries,
            exclusions,
        ))
    }
}

/// Write each planned chapter, then the merged document under the original file name.
///
/// The source file is only ever replaced atomically, and only when the output directory is
/// its own directory.
pub fn split_document(
    survey: &OutlineSurvey,
    level: usize,
    options: &SplitOptions,
) -> Result<SplitSummary, OutlineError> {
    let document = &survey.document;
    let plan = survey.plan(level, &options.exclusions)?;
    if plan.is_empty() {
        return Err(OutlineError::NothingToWrite);
    }

    let output_dir = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => document
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    if !output_dir.as_os_str().is_empty() {
        std::fs::create_dir_all(&output_dir).map_err(PdfError::from)?;
    }

    let source_name = file_name_string(document.path());
    let merged_path = output_dir.join(&source_name);

    let mut written = Vec::with_capacity(plan.chapters.len());
    for chapter in &plan.chapters {
        let target = available_path(&output_dir, &chapter.file_stem, &merged_path);
        let pages: Vec<u32> = chapter.pages().collect();
        document.write_pages(&pages, &target)?;
        debug_event!(
            "split",
            "chapter",
            "{} pages {}..{} -> {}",
            chapter.title,
            chapter.start_page,
            chapter.end_page,
            target.display()
        );
        written.push(target);
    }

    let merged_pages = document.write_pages(&plan.kept_pages(), &merged_path)?;
    log_event!(
        "split",
        "merged",
        "{} ({} of {} pages)",
        merged_path.display(),
        merged_pages,
        plan.page_count
    );

    if !options.keep_chapters {
        for path in &written {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("[split] could not remove {}: {}", path.display(), e);
            }
        }
    }

    Ok(SplitSummary {
        source: source_name,
        level,
        chapters_written: written.iter().map(|p| file_name_string(p)).collect(),
        skipped: plan.skipped,
        merged_path: merged_path.display().to_string(),
        original_pages: plan.page_count,
        merged_pages,
    })
}

/// `<dir>/<stem>.pdf`, or `<stem> (k).pdf` when that name is taken on disk or reserved.
fn available_path(dir: &Path, stem: &str, reserved: &Path) -> PathBuf {
    let mut candidate = dir.join(format!("{stem}.pdf"));
    let mut k = 2;
    while candidate.exists() || candidate == reserved {
        candidate = dir.join(format!("{stem} ({k}).pdf"));
        k += 1;
    }
    candidate
}
