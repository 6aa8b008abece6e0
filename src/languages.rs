//! Language selection.

use std::{collections::BTreeSet, fmt};

use crate::prelude::*;

/// Language used when the caller doesn't ask for any.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language codes offered to users, with the Tesseract model that serves each.
pub const KNOWN_LANGUAGES: &[(&str, &str)] = &[
    ("en", "eng"),
    ("es", "spa"),
    ("fr", "fra"),
    ("de", "deu"),
    ("it", "ita"),
    ("pt", "por"),
    ("zh_sim", "chi_sim"),
    ("ja", "jpn"),
];

/// A normalized set of lowercase language codes. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageSet(BTreeSet<String>);

impl LanguageSet {
    /// Normalize user requests. Each entry may hold several comma-separated
    /// codes. Returns `None` if nothing usable was requested.
    ///
    /// Codes become model file names, so only ASCII letters, digits, `_` and
    /// `-` are accepted.
    pub fn from_requests<S: AsRef<str>>(requests: &[S]) -> Result<Option<Self>> {
        let codes = requests
            .iter()
            .flat_map(|r| r.as_ref().split(','))
            .map(|code| code.trim().to_lowercase())
            .filter(|code| !code.is_empty())
            .collect::<BTreeSet<_>>();
        if let Some(bad) = codes.iter().find(|code| !is_valid_code(code)) {
            return Err(anyhow!("invalid language code {:?}", bad));
        }
        if codes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self(codes)))
        }
    }

    /// Iterate over codes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Tesseract model names for this set, without duplicates. Codes we
    /// don't recognize are assumed to already be model names.
    pub fn tesseract_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = vec![];
        for model in self.iter().map(tesseract_model_for) {
            if !models.contains(&model) {
                models.push(model);
            }
        }
        models
    }
}

impl Default for LanguageSet {
    fn default() -> Self {
        Self(BTreeSet::from([DEFAULT_LANGUAGE.to_owned()]))
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes = self.iter().collect::<Vec<_>>();
        write!(f, "{}", codes.join(","))
    }
}

/// Can this code be used as part of a file name inside the model directory?
fn is_valid_code(code: &str) -> bool {
    code.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Map a front-end language code to a Tesseract model name.
pub fn tesseract_model_for(code: &str) -> &str {
    KNOWN_LANGUAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, model)| *model)
        .unwrap_or(code)
}
