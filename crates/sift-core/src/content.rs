use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the caller says the content is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentHint {
    Html,
    Text,
    Code,
    StructuredData,
    #[default]
    Unknown,
}

impl FromStr for ContentHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(Self::Html),
            "text" | "txt" | "plain" => Ok(Self::Text),
            "code" | "source" => Ok(Self::Code),
            "json" | "jsonl" | "structured" | "structured_data" => Ok(Self::StructuredData),
            "auto" | "unknown" | "" => Ok(Self::Unknown),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

impl fmt::Display for ContentHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Html => "html",
            Self::Text => "text",
            Self::Code => "code",
            Self::StructuredData => "structured_data",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The closed set of chunking strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Html,
    Text,
    Code,
    StructuredData,
}

impl ChunkStrategy {
    pub const ALL: [ChunkStrategy; 4] = [Self::Html, Self::Text, Self::Code, Self::StructuredData];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "text",
            Self::Code => "code",
            Self::StructuredData => "structured_data",
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload handed to the pipeline. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    body: String,
    hint: ContentHint,
    chars: usize,
}

impl ContentItem {
    pub fn new(body: impl Into<String>, hint: ContentHint) -> Self {
        let body = body.into();
        let chars = body.chars().count();
        Self { body, hint, chars }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn hint(&self) -> ContentHint {
        self.hint
    }

    /// Length in characters (Unicode scalar values).
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn byte_len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
