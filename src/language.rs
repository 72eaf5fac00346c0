//! Translation targets and language-tag helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages offered as translation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Es,
    Fr,
    De,
    It,
    Pt,
    Ru,
    Zh,
    Ja,
    Ko,
}

impl TargetLanguage {
    /// All targets, in the order the picker lists them.
    pub const ALL: [TargetLanguage; 9] = [
        Self::Es,
        Self::Fr,
        Self::De,
        Self::It,
        Self::Pt,
        Self::Ru,
        Self::Zh,
        Self::Ja,
        Self::Ko,
    ];

    /// BCP 47 code passed to the translator.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Pt => "pt",
            Self::Ru => "ru",
            Self::Zh => "zh",
            Self::Ja => "ja",
            Self::Ko => "ko",
        }
    }

    /// English display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::De => "German",
            Self::It => "Italian",
            Self::Pt => "Portuguese",
            Self::Ru => "Russian",
            Self::Zh => "Chinese",
            Self::Ja => "Japanese",
            Self::Ko => "Korean",
        }
    }

    /// Parse either a code (`"es"`) or a label (`"Spanish"`), case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        Self::ALL.into_iter().find(|lang| {
            lang.code().eq_ignore_ascii_case(needle) || lang.label().eq_ignore_ascii_case(needle)
        })
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Compare two language tags by primary subtag, ignoring case.
///
/// `"en"`, `"EN"` and `"en-US"` all name the same language.
#[must_use]
pub fn same_primary_language(tag: &str, code: &str) -> bool {
    let primary = |t: &str| t.trim().split(['-', '_']).next().unwrap_or_default().to_owned();
    let lhs = primary(tag);
    !lhs.is_empty() && lhs.eq_ignore_ascii_case(&primary(code))
}

/// Length used for the summarize threshold, in Unicode scalar values.
#[must_use]
pub fn content_length(text: &str) -> usize {
    text.chars().count()
}
