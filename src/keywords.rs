//! Emergency keyword set and matcher
//!
//! Matching is a case-insensitive substring search with no word-boundary
//! requirement, so "helper" matches the keyword "help". Over-matching is
//! accepted: a missed emergency costs more than a spurious alert.

use serde::{Deserialize, Serialize};

/// Errors from keyword set edits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordError {
    #[error("Keyword cannot be empty")]
    Empty,

    #[error("Keyword '{0}' already exists")]
    Duplicate(String),

    #[error("Keyword '{0}' not found")]
    NotFound(String),
}

/// An ordered set of lowercase trigger phrases.
///
/// Edits never mutate in place; they return the replacement set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    /// Build a set from raw phrases, normalising case and dropping blanks and duplicates
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalised: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = normalise(keyword.as_ref());
            if !keyword.is_empty() && !normalised.contains(&keyword) {
                normalised.push(keyword);
            }
        }
        Self {
            keywords: normalised,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        let keyword = normalise(keyword);
        self.keywords.iter().any(|k| *k == keyword)
    }

    /// Return a new set with `keyword` appended
    pub fn with_added(&self, keyword: &str) -> Result<Self, KeywordError> {
        let keyword = normalise(keyword);
        if keyword.is_empty() {
            return Err(KeywordError::Empty);
        }
        if self.keywords.contains(&keyword) {
            return Err(KeywordError::Duplicate(keyword));
        }

        let mut keywords = self.keywords.clone();
        keywords.push(keyword);
        Ok(Self { keywords })
    }

    /// Return a new set without `keyword`
    pub fn with_removed(&self, keyword: &str) -> Result<Self, KeywordError> {
        let keyword = normalise(keyword);
        if !self.keywords.contains(&keyword) {
            return Err(KeywordError::NotFound(keyword));
        }

        let keywords = self
            .keywords
            .iter()
            .filter(|k| **k != keyword)
            .cloned()
            .collect();
        Ok(Self { keywords })
    }

    pub fn into_vec(self) -> Vec<String> {
        self.keywords
    }
}

fn normalise(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Find the first keyword, in configured order, contained in `transcript`.
///
/// Called on every interim and final transcript update.
pub fn match_keyword<'a>(transcript: &str, keywords: &'a KeywordSet) -> Option<&'a str> {
    if transcript.is_empty() {
        return None;
    }

    let lower = transcript.to_lowercase();
    keywords
        .iter()
        .find(|keyword| lower.contains(&keyword.to_lowercase()))
}
