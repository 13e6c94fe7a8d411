//! Domain types shared across the service and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Per-user profile. All fields are free-form text; the service only
/// requires them to be non-empty on save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub name: String,
    pub age: String,
    pub blood_group: String,
    pub date_of_birth: String,
    pub height: String,
    pub weight: String,
}

/// Profile fields as submitted by the user, before being bound to an
/// owning user id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub name: String,
    pub age: String,
    pub blood_group: String,
    pub date_of_birth: String,
    pub height: String,
    pub weight: String,
}

impl Profile {
    pub fn new(user_id: &str, fields: ProfileFields) -> Self {
        Profile {
            user_id: user_id.to_string(),
            name: fields.name,
            age: fields.age,
            blood_group: fields.blood_group,
            date_of_birth: fields.date_of_birth,
            height: fields.height,
            weight: fields.weight,
        }
    }

    /// Field values in declaration order, for blanket non-empty checks.
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("name", &self.name),
            ("age", &self.age),
            ("blood_group", &self.blood_group),
            ("date_of_birth", &self.date_of_birth),
            ("height", &self.height),
            ("weight", &self.weight),
        ]
    }
}

/// A user-defined grouping under which notes and files are organized.
///
/// Child entities (note rows, stored files) are keyed by `id`, never by
/// the display name, so renames and cross-user name collisions cannot
/// leak data between tenants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One free-text note per hospital.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub hospital_id: Uuid,
    pub user_id: String,
    pub note_text: String,
}

/// Fixed document classifications per hospital.
///
/// `randomFile` is accepted on input as a legacy alias for
/// `additionalFiles`; it is never emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileCategory {
    Prescription,
    LabReport,
    ScanningReport,
    #[serde(alias = "randomFile")]
    AdditionalFiles,
}

impl FileCategory {
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Prescription,
        FileCategory::LabReport,
        FileCategory::ScanningReport,
        FileCategory::AdditionalFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Prescription => "prescription",
            FileCategory::LabReport => "labReport",
            FileCategory::ScanningReport => "scanningReport",
            FileCategory::AdditionalFiles => "additionalFiles",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prescription" => Ok(FileCategory::Prescription),
            "labReport" => Ok(FileCategory::LabReport),
            "scanningReport" => Ok(FileCategory::ScanningReport),
            "additionalFiles" | "randomFile" => Ok(FileCategory::AdditionalFiles),
            other => Err(format!("unknown file category '{}'", other)),
        }
    }
}

/// A stored attachment, described entirely by its object-store entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub url: String,
}

/// Aggregate detail view for one hospital: its note plus the file
/// listing for every category (empty categories are present with an
/// empty list, matching the four-slot seed).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalDetail {
    pub note: String,
    pub files_by_category: BTreeMap<String, Vec<FileEntry>>,
}

impl HospitalDetail {
    /// An empty view with all four category slots seeded.
    pub fn empty() -> Self {
        let mut files_by_category = BTreeMap::new();
        for category in FileCategory::ALL {
            files_by_category.insert(category.as_str().to_string(), Vec::new());
        }
        HospitalDetail {
            note: String::new(),
            files_by_category,
        }
    }
}
