//! Request modes and the schema versions bound to them

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Literature review seeded by a topic string
    Topic,
    /// Literature review seeded by an uploaded paper
    Pdf,
}

impl Mode {
    /// Schema version that payloads in this mode must satisfy
    #[inline]
    #[must_use]
    pub fn schema_version(self) -> SchemaVersion {
        match self {
            Mode::Topic => SchemaVersion::TopicV1,
            Mode::Pdf => SchemaVersion::PdfV1,
        }
    }

    /// Wire name of the mode
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Topic => "topic",
            Mode::Pdf => "pdf",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "topic" => Ok(Mode::Topic),
            "pdf" => Ok(Mode::Pdf),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

/// Unknown mode name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported mode: {0:?}")]
pub struct ModeParseError(pub String);

/// Named output schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Topic-mode schema
    #[serde(rename = "topic_v1")]
    TopicV1,
    /// PDF-mode schema (adds `target_paper`)
    #[serde(rename = "pdf_v1")]
    PdfV1,
}

impl SchemaVersion {
    /// All registered versions
    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::TopicV1, SchemaVersion::PdfV1];

    /// Registry name of the version
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SchemaVersion::TopicV1 => "topic_v1",
            SchemaVersion::PdfV1 => "pdf_v1",
        }
    }

    /// Mode the version belongs to
    #[inline]
    #[must_use]
    pub fn mode(self) -> Mode {
        match self {
            SchemaVersion::TopicV1 => Mode::Topic,
            SchemaVersion::PdfV1 => Mode::Pdf,
        }
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_is_case_insensitive() {
        assert_eq!("Topic".parse::<Mode>().unwrap(), Mode::Topic);
        assert_eq!(" pdf ".parse::<Mode>().unwrap(), Mode::Pdf);
        assert!("video".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_maps_to_schema_version() {
        assert_eq!(Mode::Topic.schema_version(), SchemaVersion::TopicV1);
        assert_eq!(Mode::Pdf.schema_version(), SchemaVersion::PdfV1);
        for version in SchemaVersion::ALL {
            assert_eq!(version.mode().schema_version(), version);
        }
    }

    #[test]
    fn schema_version_serializes_by_name() {
        let json = serde_json::to_string(&SchemaVersion::PdfV1).unwrap();
        assert_eq!(json, "\"pdf_v1\"");
    }
}
