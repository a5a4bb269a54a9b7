//! Split command implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use walkdir::WalkDir;

use crate::cli::output::{Formatter, get_formatter};
use crate::error::OutlineError;
use crate::models::{Config, OutputFormat};
use crate::services::{OutlineSurvey, SplitOptions, split_document};
use crate::utils::{file_name_string, has_extension};

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// PDF files to split (defaults to every PDF in the data directory)
    pub paths: Vec<PathBuf>,

    /// Bookmark level to split at; prompts when several levels exist
    #[arg(long, short = 'l')]
    pub level: Option<usize>,

    /// Directory for the chapter files and the merged document
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Extra chapter titles to drop (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Keep the per-chapter files after merging
    #[arg(long)]
    pub keep_chapters: bool,

    /// Only print the bookmark levels of each document
    #[arg(long)]
    pub survey: bool,
}

pub async fn handle_split(args: SplitArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let files = if args.paths.is_empty() {
        collect_pdfs(&config.paths.data_dir)?
    } else {
        args.paths.clone()
    };

    if files.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No PDF files found in {}.",
                config.paths.data_dir.display()
            ))
        );
        return Ok(());
    }

    let mut exclusions = config.split.exclude_titles.clone();
    exclusions.extend(args.exclude.iter().cloned());
    let options = SplitOptions {
        output_dir: args.output.clone(),
        exclusions,
        keep_chapters: args.keep_chapters,
    };

    for path in &files {
        if verbose {
            eprintln!("Processing {}", path.display());
        }
        if let Err(e) = split_one(path, &args, &options, format, formatter.as_ref()) {
            eprintln!(
                "{}",
                formatter.format_error(&format!("{}: {}", path.display(), e))
            );
        }
    }

    Ok(())
}

fn split_one(
    path: &Path,
    args: &SplitArgs,
    options: &SplitOptions,
    format: OutputFormat,
    formatter: &dyn Formatter,
) -> Result<()> {
    let name = file_name_string(path);
    let survey = match OutlineSurvey::load(path) {
        Ok(survey) => survey,
        Err(OutlineError::NoOutline) => {
            println!(
                "{}",
                formatter.format_message(&format!(
                    "{name}: no bookmarks found, leaving the document unsplit."
                ))
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if args.survey {
        print!("{}", formatter.format_levels(&name, &survey.levels));
        if format == OutputFormat::Json {
            println!();
        }
        return Ok(());
    }

    let level = match survey.resolve_level(args.level)? {
        Some(level) => level,
        None if format == OutputFormat::Json => {
            anyhow::bail!(
                "several bookmark levels exist ({:?}); pass --level",
                survey.available_levels()
            );
        }
        None => {
            eprint!("{}", formatter.format_levels(&name, &survey.levels));
            match prompt_level(&name, &survey.available_levels())? {
                Some(level) => level,
                None => {
                    println!("{}", formatter.format_message("Cancelled."));
                    return Ok(());
                }
            }
        }
    };

    let summary = split_document(&survey, level, options)?;
    print!("{}", formatter.format_split_summary(&summary));
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

/// Ask on stdin until one of `levels` is entered. `None` on end of input.
fn prompt_level(name: &str, levels: &[usize]) -> Result<Option<usize>> {
    let first = levels.first().copied().unwrap_or(0);
    loop {
        eprint!("Enter the bookmark level to split '{name}' by (e.g., {first} for main chapters): ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        match parse_level(&input, levels) {
            Ok(level) => return Ok(Some(level)),
            Err(message) => eprintln!("{message}"),
        }
    }
}

fn parse_level(input: &str, levels: &[usize]) -> Result<usize, String> {
    let level: usize = input
        .trim()
        .parse()
        .map_err(|_| "Invalid input. Please enter a number.".to_string())?;
    if !levels.contains(&level) {
        return Err(format!("Invalid level. Please choose from {levels:?}."));
    }
    Ok(level)
}

fn collect_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() && has_extension(entry.path(), "pdf") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(" 1\n", &[0, 1]), Ok(1));
        assert!(parse_level("two", &[0, 1]).is_err());
        assert!(parse_level("3", &[0, 1]).unwrap_err().contains("[0, 1]"));
    }

    #[test]
    fn test_collect_pdfs_is_flat_and_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("Processed")).unwrap();
        std::fs::write(dir.path().join("Processed").join("c.pdf"), b"").unwrap();

        let files = collect_pdfs(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name_string(p)).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }
}
