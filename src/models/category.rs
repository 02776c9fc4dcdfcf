//! Semantic roles an audio file can play within a submission.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Closed set of file categories accepted by the intake form.
///
/// The serialized key doubles as the storage-name prefix, so renaming a
/// variant's key changes the bit-exact `{category}_V{n}{ext}` convention.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Vocals,
    Instrumental,
    Reference,
    LeadVocals,
    BgVocals,
    Adlibs,
    AdvInstrumental,
    AdvSfx,
    AdvReference,
    Master,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Vocals,
        Category::Instrumental,
        Category::Reference,
        Category::LeadVocals,
        Category::BgVocals,
        Category::Adlibs,
        Category::AdvInstrumental,
        Category::AdvSfx,
        Category::AdvReference,
        Category::Master,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Vocals => "vocals",
            Category::Instrumental => "instrumental",
            Category::Reference => "reference",
            Category::LeadVocals => "lead-vocals",
            Category::BgVocals => "bg-vocals",
            Category::Adlibs => "adlibs",
            Category::AdvInstrumental => "adv-instrumental",
            Category::AdvSfx => "adv-sfx",
            Category::AdvReference => "adv-reference",
            Category::Master => "master",
        }
    }

    /// Maximum number of files per submission, `None` when unlimited.
    pub fn limit(self) -> Option<usize> {
        match self {
            Category::Vocals | Category::LeadVocals | Category::BgVocals | Category::Adlibs => {
                Some(10)
            }
            Category::Reference | Category::AdvReference | Category::Master => Some(1),
            Category::Instrumental | Category::AdvInstrumental | Category::AdvSfx => None,
        }
    }

    /// Prefix the upload form puts on a file name when every file is sent
    /// under the single `files` field.
    ///
    /// Basic and advanced layouts share `instrumental_` and `reference_`,
    /// so a prefix alone does not identify the category.
    pub fn form_prefix(self) -> &'static str {
        match self {
            Category::Vocals => "vocals_",
            Category::Instrumental | Category::AdvInstrumental => "instrumental_",
            Category::Reference | Category::AdvReference => "reference_",
            Category::LeadVocals => "lead_",
            Category::BgVocals => "bg_",
            Category::Adlibs => "adlibs_",
            Category::AdvSfx => "sfx_",
            Category::Master => "master_",
        }
    }

    /// Category of a form-prefixed file name.
    ///
    /// `candidates` are the categories the selected service accepts and are
    /// matched by [`form_prefix`](Self::form_prefix) first; any other name
    /// falls back to a full `{category}_` key prefix.
    pub fn from_form_prefix(name: &str, candidates: &[Category]) -> Option<Category> {
        let lower = name.to_ascii_lowercase();
        candidates
            .iter()
            .copied()
            .find(|c| lower.starts_with(c.form_prefix()))
            .or_else(|| Category::from_filename_prefix(name))
    }

    /// Detect a category from a `{category}_` filename prefix.
    ///
    /// Longest keys are tried first so `adv-instrumental_` never matches
    /// as something shorter.
    pub fn from_filename_prefix(name: &str) -> Option<Category> {
        let lower = name.to_ascii_lowercase();
        let mut candidates = Category::ALL;
        candidates.sort_by_key(|c| std::cmp::Reverse(c.as_str().len()));
        candidates
            .into_iter()
            .find(|c| lower.starts_with(&format!("{}_", c.as_str())))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown file category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
