//! Run inputs

use crate::error::PipelineError;
use ra_schema::Mode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Candidate paper offered to the generator in topic mode
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidatePaper {
    /// Paper title
    pub title: String,
    /// Publication year (0 if unknown)
    #[serde(default)]
    pub year: i64,
    /// Landing page
    #[serde(default)]
    pub url: String,
    /// Abstract text
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
}

/// One request to the pipeline; the variant selects the mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunInput {
    /// Topic string plus optional candidate papers
    Topic {
        /// Research topic
        topic: String,
        /// Papers the generator may pick related works from
        #[serde(default)]
        candidates: Vec<CandidatePaper>,
    },
    /// Already-extracted paper text
    Pdf {
        /// Uploaded file name
        pdf_name: String,
        /// Extracted text with `[PAGE n]` tags
        text: String,
    },
}

impl RunInput {
    /// Topic-mode input without candidates
    #[inline]
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self::Topic {
            topic: topic.into(),
            candidates: Vec::new(),
        }
    }

    /// PDF-mode input
    #[inline]
    #[must_use]
    pub fn pdf(pdf_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Pdf {
            pdf_name: pdf_name.into(),
            text: text.into(),
        }
    }

    /// Build an input from a mode name and its primary text
    ///
    /// For `pdf` the text is the paper text and the file name is `input.pdf`.
    ///
    /// # Errors
    /// Returns [`PipelineError::UnsupportedMode`] for unknown modes.
    pub fn from_mode(mode: &str, text: impl Into<String>) -> Result<Self, PipelineError> {
        Ok(match mode.parse::<Mode>()? {
            Mode::Topic => Self::topic(text),
            Mode::Pdf => Self::pdf("input.pdf", text),
        })
    }

    /// With candidate papers (ignored for PDF inputs)
    #[must_use]
    pub fn with_candidates(mut self, papers: Vec<CandidatePaper>) -> Self {
        if let Self::Topic { candidates, .. } = &mut self {
            *candidates = papers;
        }
        self
    }

    /// Request mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Topic { .. } => Mode::Topic,
            Self::Pdf { .. } => Mode::Pdf,
        }
    }

    /// Reject inputs there is nothing to generate from
    ///
    /// # Errors
    /// Returns [`PipelineError::InvalidInput`] for a blank topic or blank text.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            Self::Topic { topic, .. } if topic.trim().is_empty() => {
                Err(PipelineError::InvalidInput("topic is empty".into()))
            }
            Self::Pdf { text, .. } if text.trim().is_empty() => {
                Err(PipelineError::InvalidInput("pdf text is empty".into()))
            }
            _ => Ok(()),
        }
    }

    /// Normalized summary embedded as `input` in the final payload
    #[must_use]
    pub fn summary(&self) -> Value {
        match self {
            Self::Topic { topic, .. } => json!({"mode": "topic", "topic": topic.trim()}),
            Self::Pdf { pdf_name, text } => json!({
                "mode": "pdf",
                "pdf_name": pdf_name,
                "chars": text.chars().count()
            }),
        }
    }
}
