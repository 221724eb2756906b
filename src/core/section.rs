//! Section Locator
//!
//! Finds the line range occupied by a named logical section of a paper.
//! Heading detection is heuristic: papers mix numbered headings
//! ("5. CONCLUSION"), bare all-caps headings ("ABSTRACT"), title case, and
//! trailing punctuation. The locator tolerates all of these but requires the
//! line to be a standalone heading, so the word "abstract" appearing
//! mid-sentence never matches.
//!
//! A section runs from its heading line to the next heading-like line, or to
//! the end of the document. The end-of-document case is an explicit sentinel
//! (`lines.len()`), not a regex end anchor - trailing sections such as
//! `references` are a known sharp edge for anchor-based matching.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of logical paper sections the pipeline knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Abstract,
    Introduction,
    Methods,
    Experiments,
    Conclusion,
    References,
    Formulas,
    Figures,
}

impl SectionKind {
    /// All section kinds, in document order.
    pub const ALL: [SectionKind; 8] = [
        SectionKind::Abstract,
        SectionKind::Introduction,
        SectionKind::Methods,
        SectionKind::Experiments,
        SectionKind::Conclusion,
        SectionKind::References,
        SectionKind::Formulas,
        SectionKind::Figures,
    ];

    /// Wire name used in transform-kind strings and dataset records.
    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Abstract => "abstract",
            SectionKind::Introduction => "introduction",
            SectionKind::Methods => "methods",
            SectionKind::Experiments => "experiments",
            SectionKind::Conclusion => "conclusion",
            SectionKind::References => "references",
            SectionKind::Formulas => "formulas",
            SectionKind::Figures => "figures",
        }
    }

    /// Heading pattern for this section's start line.
    ///
    /// Alias sets reflect what reviewers actually write: METHODOLOGY and
    /// APPROACH for methods, BIBLIOGRAPHY for references, an optional
    /// "AND FUTURE WORK" tail on conclusions.
    fn heading_pattern(&self) -> &'static Regex {
        match self {
            SectionKind::Abstract => &RE_ABSTRACT,
            SectionKind::Introduction => &RE_INTRODUCTION,
            SectionKind::Methods => &RE_METHODS,
            SectionKind::Experiments => &RE_EXPERIMENTS,
            SectionKind::Conclusion => &RE_CONCLUSION,
            SectionKind::References => &RE_REFERENCES,
            SectionKind::Formulas => &RE_FORMULAS,
            SectionKind::Figures => &RE_FIGURES,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown section name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl fmt::Display for UnknownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown section: '{}'", self.0)
    }
}

impl std::error::Error for UnknownSection {}

impl FromStr for SectionKind {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKind::ALL
            .iter()
            .find(|k| k.name() == s)
            .copied()
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

// A heading start line is: optional enumeration ("5.", "5.1", "A."), the
// section name (or an alias), optional ":" or "-", and nothing else.
macro_rules! heading_regex {
    ($body:literal) => {
        Lazy::new(|| {
            Regex::new(concat!(
                r"(?i)^\s*(?:\d+(?:\.\d+)*\.?\s*|[A-Za-z]\.\s*)?(?:",
                $body,
                r")\s*[:\-]?\s*$"
            ))
            .expect("static heading pattern must compile")
        })
    };
}

static RE_ABSTRACT: Lazy<Regex> = heading_regex!("ABSTRACT");
static RE_INTRODUCTION: Lazy<Regex> = heading_regex!("INTRODUCTION");
static RE_METHODS: Lazy<Regex> = heading_regex!(r"METHODS?|METHODOLOGY|APPROACH");
static RE_EXPERIMENTS: Lazy<Regex> = heading_regex!(r"EXPERIMENTS?|EXPERIMENTAL\s+RESULTS?");
static RE_CONCLUSION: Lazy<Regex> =
    heading_regex!(r"(?:CONCLUSIONS?|CONCLUDING\s+REMARKS?)(?:\s*(?:&|AND)\s+FUTURE\s+WORK)?");
static RE_REFERENCES: Lazy<Regex> = heading_regex!(r"REFERENCES?|BIBLIOGRAPHY");
static RE_FORMULAS: Lazy<Regex> = heading_regex!(r"FORMULAS?|EQUATIONS?");
static RE_FIGURES: Lazy<Regex> = heading_regex!(r"FIGURES?|LIST\s+OF\s+FIGURES");

/// A line that ends the preceding section: numbered heading or an all-caps
/// token run of at least three letters.
static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.?\s+[A-Z]").expect("static pattern must compile"));
static RE_CAPS_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[A-Z]{3,}[A-Z\s]*\s*[:\-]?\s*$").expect("static pattern must compile"));

/// Half-open line range `[start, end)` occupied by a section, including its
/// heading line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Index of the heading line.
    pub start: usize,
    /// Index one past the section's last line.
    pub end: usize,
}

impl SectionSpan {
    /// Number of lines covered, heading included.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True when the span covers no lines.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Returns true when the line terminates the section that precedes it.
pub fn is_heading_like(line: &str) -> bool {
    RE_NUMBERED_HEADING.is_match(line) || RE_CAPS_HEADING.is_match(line)
}

/// Locate `kind` in `text`.
///
/// Returns `None` when the document simply lacks this section - a legitimate
/// outcome, not an error. The returned span always satisfies
/// `start < end <= line_count`.
pub fn locate(text: &str, kind: SectionKind) -> Option<SectionSpan> {
    let lines: Vec<&str> = text.lines().collect();
    locate_in_lines(&lines, kind)
}

/// Line-slice variant of [`locate`] for callers that already split the text.
pub fn locate_in_lines(lines: &[&str], kind: SectionKind) -> Option<SectionSpan> {
    let pattern = kind.heading_pattern();
    let start = lines.iter().position(|line| pattern.is_match(line))?;

    // Scan forward for the next heading-like line; absolute end otherwise.
    let mut end = lines.len();
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if is_heading_like(line) {
            end = i;
            break;
        }
    }

    Some(SectionSpan { start, end })
}
