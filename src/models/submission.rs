//! The immutable request value handed from the HTTP layer to the intake core.

use crate::{errors::IntakeError, models::category::Category};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

/// Which service the customer is paying for.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Mixing,
    Mastering,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Mixing => "mixing",
            ServiceType::Mastering => "mastering",
        }
    }
}

impl FromStr for ServiceType {
    type Err = IntakeError;

    /// Accepts both the API keys and the labels the form displays.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mixing" => Ok(ServiceType::Mixing),
            "mastering" | "initial/re-mastering" => Ok(ServiceType::Mastering),
            other => Err(IntakeError::Validation(format!(
                "unknown service type `{other}`"
            ))),
        }
    }
}

/// Basic or advanced stem layout; only meaningful for mixing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    #[default]
    Basic,
    Advanced,
}

impl FromStr for UploadMode {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "basic" => Ok(UploadMode::Basic),
            "advanced" => Ok(UploadMode::Advanced),
            other => Err(IntakeError::Validation(format!(
                "unknown upload mode `{other}`"
            ))),
        }
    }
}

/// A file received from the form and spooled to local disk.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub category: Category,
    pub original_name: String,
    pub size_bytes: u64,
    pub spool_path: PathBuf,
}

/// Categories accepted for a service and upload mode.
pub fn categories_for(service: ServiceType, mode: UploadMode) -> &'static [Category] {
    match (service, mode) {
        (ServiceType::Mastering, _) => &[Category::Master],
        (ServiceType::Mixing, UploadMode::Basic) => {
            &[Category::Vocals, Category::Instrumental, Category::Reference]
        }
        (ServiceType::Mixing, UploadMode::Advanced) => &[
            Category::LeadVocals,
            Category::BgVocals,
            Category::Adlibs,
            Category::AdvInstrumental,
            Category::AdvSfx,
            Category::AdvReference,
        ],
    }
}

/// Everything one form submission carries.
#[derive(Clone, Debug)]
pub struct SubmissionRequest {
    pub service: ServiceType,
    pub mode: UploadMode,
    pub artist_name: String,
    pub email: String,
    pub phone: String,
    pub song_title: String,
    pub bpm: Option<String>,
    pub key: Option<String>,
    pub notes: Option<String>,
    pub payment_intent_id: Option<String>,
    pub files: Vec<IncomingFile>,
}

impl SubmissionRequest {
    /// Categories the selected service/mode accepts.
    pub fn allowed_categories(&self) -> &'static [Category] {
        categories_for(self.service, self.mode)
    }

    fn count(&self, category: Category) -> usize {
        self.files.iter().filter(|f| f.category == category).count()
    }

    /// Reject the request before anything is sent over the wire.
    ///
    /// Category limits are hard limits: exceeding one is an error, never
    /// an extra charge.
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.files.is_empty() {
            return Err(IntakeError::Validation("no files supplied".into()));
        }

        for (label, value) in [
            ("artistName", &self.artist_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("songTitle", &self.song_title),
        ] {
            if value.trim().is_empty() {
                return Err(IntakeError::Validation(format!("`{label}` is required")));
            }
        }

        let allowed = self.allowed_categories();
        for file in &self.files {
            if !allowed.contains(&file.category) {
                return Err(IntakeError::Validation(format!(
                    "category `{}` is not accepted for this service",
                    file.category
                )));
            }
            if file.size_bytes == 0 {
                return Err(IntakeError::Validation(format!(
                    "file `{}` is empty",
                    file.original_name
                )));
            }
        }

        for category in allowed {
            if let Some(limit) = category.limit() {
                let count = self.count(*category);
                if count > limit {
                    return Err(IntakeError::Validation(format!(
                        "file limit exceeded for `{category}`: {count} supplied, max {limit}"
                    )));
                }
            }
        }

        let satisfied = match (self.service, self.mode) {
            (ServiceType::Mastering, _) => self.count(Category::Master) >= 1,
            (ServiceType::Mixing, UploadMode::Basic) => {
                self.count(Category::Vocals) >= 1 && self.count(Category::Instrumental) >= 1
            }
            (ServiceType::Mixing, UploadMode::Advanced) => {
                let vocals = self.count(Category::LeadVocals)
                    + self.count(Category::BgVocals)
                    + self.count(Category::Adlibs);
                vocals > 0 && self.count(Category::AdvInstrumental) >= 1
            }
        };
        if !satisfied {
            return Err(IntakeError::Validation(
                "required files for the selected service are missing".into(),
            ));
        }

        Ok(())
    }
}
