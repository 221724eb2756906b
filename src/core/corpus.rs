//! Corpus and dataset records
//!
//! Line-delimited JSON in, line-delimited JSON out. A corpus file holds one
//! source [`Document`] per line; a variant dataset file holds one
//! [`Variant`] per line. Loading is tolerant: blank lines are ignored and
//! malformed lines are skipped with a warning rather than aborting the run.

use crate::core::transform::TransformKind;
use crate::core::validate::VariantStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// One source paper. Immutable once loaded; lives for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Source identifier, when the corpus provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Paper title.
    pub title: String,
    /// Raw full text.
    pub text: String,
    /// `file:line` trace back to the corpus record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Ground-truth reviewer ratings, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rates: Option<Vec<f64>>,
    /// Ground-truth accept/reject decision, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
}

impl Document {
    /// Stable identity used for sampling-pool bookkeeping and variant ids:
    /// the explicit id, else the source trace, else the title.
    pub fn key(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        if let Some(source) = &self.source {
            return source.clone();
        }
        self.title.clone()
    }
}

/// Raw corpus line. Field fallbacks mirror the corpora this pipeline is fed:
/// some exports use `latex` instead of `text`, some omit titles.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    latex: Option<String>,
    #[serde(default)]
    rates: Option<Vec<f64>>,
    #[serde(default)]
    decision: Option<String>,
}

/// One transformed copy of a document, as persisted in the variant dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    /// Unique id: `<document key>_<transform kind>`.
    pub id: String,
    /// Title annotated with the transform kind.
    pub title: String,
    /// Title of the owning document.
    pub original_title: String,
    /// The operation that produced this variant.
    pub transform_kind: TransformKind,
    /// The transformed text.
    pub text: String,
    /// Key of the owning document.
    pub document_id: String,
    /// Whether the transform found something to alter.
    #[serde(default = "default_matched")]
    pub matched: bool,
    /// Validator status at build time.
    #[serde(default)]
    pub status: VariantStatus,
    /// `file:line` trace back to the corpus record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Ground-truth reviewer ratings carried over from the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rates: Option<Vec<f64>>,
    /// Ground-truth decision carried over from the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
}

fn default_matched() -> bool {
    true
}

impl Variant {
    /// Build a variant record for `document` under `kind`.
    pub fn new(document: &Document, kind: TransformKind, text: String, matched: bool) -> Self {
        let document_id = document.key();
        Self {
            id: format!("{}_{}", document_id, kind),
            title: format!("{} [{}]", document.title, kind),
            original_title: document.title.clone(),
            transform_kind: kind,
            text,
            document_id,
            matched,
            status: VariantStatus::Success,
            source: document.source.clone(),
            rates: document.rates.clone(),
            decision: document.decision.clone(),
        }
    }
}

/// Errors reading or writing corpus/dataset files.
#[derive(Debug)]
pub enum CorpusError {
    /// Underlying file I/O failed.
    Io {
        path: String,
        source: std::io::Error,
    },
    /// The file parsed but contained no usable records.
    Empty { path: String },
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusError::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
            CorpusError::Empty { path } => write!(f, "no usable records in {}", path),
        }
    }
}

impl std::error::Error for CorpusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CorpusError::Io { source, .. } => Some(source),
            CorpusError::Empty { .. } => None,
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> CorpusError {
    CorpusError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Load a corpus from a line-delimited JSON file.
///
/// Malformed lines are skipped with a warning; an entirely unusable file is
/// an error.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>, CorpusError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let reader = BufReader::new(file);

    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let raw: RawRecord = match serde_json::from_str(trimmed) {
            Ok(raw) => raw,
            Err(e) => {
                skipped += 1;
                warn!(line = lineno + 1, error = %e, "skipping malformed corpus line");
                continue;
            }
        };

        let title = raw
            .title
            .or_else(|| raw.id.clone())
            .unwrap_or_else(|| format!("paper_{}", lineno + 1));
        let text = raw.text.or(raw.latex).unwrap_or_default();

        documents.push(Document {
            id: raw.id,
            title,
            text,
            source: Some(format!("{}:{}", path.display(), lineno + 1)),
            rates: raw.rates,
            decision: raw.decision,
        });
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "corpus contained malformed lines");
    }
    if documents.is_empty() {
        return Err(CorpusError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(documents)
}

/// Write variants to a line-delimited JSON dataset file, one per line.
pub fn save_variants(path: &Path, variants: &[Variant]) -> Result<(), CorpusError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
        }
    }
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut writer = BufWriter::new(file);
    for variant in variants {
        let line = serde_json::to_string(variant)
            .map_err(|e| io_err(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        writeln!(writer, "{}", line).map_err(|e| io_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))
}

/// Load a variant dataset written by [`save_variants`]. Malformed lines are
/// skipped with a warning.
pub fn load_variants(path: &Path) -> Result<Vec<Variant>, CorpusError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let reader = BufReader::new(file);

    let mut variants = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Variant>(trimmed) {
            Ok(variant) => variants.push(variant),
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed variant line");
            }
        }
    }

    if variants.is_empty() {
        return Err(CorpusError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(variants)
}
