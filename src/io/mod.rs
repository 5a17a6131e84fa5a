//! File I/O: reading input documents and persisting run artifacts.
//!
//! Artifacts are named `<id>.topic_index.json`, `<id>.analysis.json` and
//! `<id>.report.md` inside one output directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::core::{AggregatedAnalysis, Document, FinalReport, ImageAttachment, Page, TopicIndex};
use crate::error::IoError;

/// Extensions read as plain text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// Extensions read as page images, with their MIME type.
const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
];

enum InputKind {
    Text,
    Image(&'static str),
}

fn input_kind(path: &Path) -> Result<InputKind, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(InputKind::Text);
    }
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| InputKind::Image(mime))
        .ok_or_else(|| IoError::UnsupportedInput {
            path: path.to_path_buf(),
        })
}

fn read_text(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_page(path: &Path) -> Result<Page, IoError> {
    match input_kind(path)? {
        InputKind::Text => Ok(Page {
            text: Some(read_text(path)?),
            image: None,
        }),
        InputKind::Image(mime) => {
            let data = fs::read(path).map_err(|source| IoError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Page {
                text: None,
                image: Some(ImageAttachment::new(mime, data)),
            })
        }
    }
}

/// Reads input files into a document.
///
/// A single text file becomes a text document. Images, or several files,
/// become a paged document with one page per file in the given order.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedInput`] for unknown extensions and
/// [`IoError::Read`] when a file cannot be read.
pub fn read_document(paths: &[PathBuf], id: &str) -> Result<Document, IoError> {
    if let [single] = paths
        && matches!(input_kind(single)?, InputKind::Text)
    {
        return Ok(Document::from_text(id, read_text(single)?));
    }
    let pages = paths
        .iter()
        .map(|p| read_page(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Document::from_pages(id, pages))
}

/// Document identifier derived from a file name (its stem).
#[must_use]
pub fn document_id_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_id)
        .unwrap_or_else(|| "document".to_string())
}

/// Makes an identifier safe to use in a file name.
#[must_use]
pub fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Writes `contents` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`IoError::Write`] on failure.
pub fn write_file(path: &Path, contents: &str) -> Result<(), IoError> {
    let write_err = |source| IoError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, contents).map_err(write_err)
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<String, IoError> {
    serde_json::to_string_pretty(value).map_err(|source| IoError::Serialize {
        what: what.to_string(),
        source,
    })
}

/// Directory receiving run artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`. Nothing is created until a write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the topic index for `id`.
    #[must_use]
    pub fn topic_index_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.topic_index.json", sanitize_id(id)))
    }

    /// Path of the aggregated analysis for `id`.
    #[must_use]
    pub fn analysis_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.analysis.json", sanitize_id(id)))
    }

    /// Path of the report for `id`.
    #[must_use]
    pub fn report_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.report.md", sanitize_id(id)))
    }

    /// Writes a topic index as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if serialization or writing fails.
    pub fn write_topic_index(&self, id: &str, index: &TopicIndex) -> Result<PathBuf, IoError> {
        let path = self.topic_index_path(id);
        write_file(&path, &to_pretty_json(index, "topic index")?)?;
        debug!(path = %path.display(), topics = index.len(), "wrote topic index");
        Ok(path)
    }

    /// Writes the merged fields as a flat JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if serialization or writing fails.
    pub fn write_analysis(
        &self,
        id: &str,
        analysis: &AggregatedAnalysis,
    ) -> Result<PathBuf, IoError> {
        let path = self.analysis_path(id);
        write_file(&path, &to_pretty_json(&analysis.fields, "analysis")?)?;
        debug!(path = %path.display(), fields = analysis.fields.len(), "wrote analysis");
        Ok(path)
    }

    /// Writes the rendered report (header, narrative, footer).
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Write`] on failure.
    pub fn write_report(&self, id: &str, report: &FinalReport) -> Result<PathBuf, IoError> {
        let path = self.report_path(id);
        write_file(&path, &report.render())?;
        debug!(path = %path.display(), "wrote report");
        Ok(path)
    }
}
