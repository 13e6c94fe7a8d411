//! Health Record Service - orchestrates the record store and the object
//! store into a consistent per-user aggregate and mediates all
//! mutations.
//!
//! Every write is followed by a full re-read of the affected hospital
//! view (invalidate-and-refetch), trading efficiency for the guarantee
//! that local and remote state cannot drift. Failures are terminal for
//! the triggering action: no retry, no rollback of multi-step
//! sequences.

pub mod cache;

pub use cache::HospitalCache;

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::blob::{sanitize_file_name, BlobBackend, BlobError, BlobStore};
use crate::model::{FileCategory, FileEntry, Hospital, HospitalDetail, Note, Profile, ProfileFields};
use crate::record::{from_row, to_row, Filter, MemoryRecordStore, RecordStore, StoreError};

pub const PROFILE_TABLE: &str = "profiles";
pub const HOSPITAL_TABLE: &str = "hospitals";
pub const NOTE_TABLE: &str = "notes";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
    #[error("Object store error: {0}")]
    Blob(#[from] BlobError),
}

pub struct HealthRecordService {
    records: Arc<dyn RecordStore>,
    files: BlobStore,
    avatars: BlobStore,
    cache: HospitalCache,
}

impl HealthRecordService {
    pub fn new(records: Arc<dyn RecordStore>, files: BlobStore, avatars: BlobStore) -> Self {
        HealthRecordService {
            records,
            files,
            avatars,
            cache: HospitalCache::new(),
        }
    }

    /// Fully in-memory service: memory record store with the schema's
    /// uniqueness constraints declared, memory-backed blob stores.
    pub async fn in_memory(public_base: &str) -> Result<Self, ServiceError> {
        let records = MemoryRecordStore::new();
        records.declare_unique(PROFILE_TABLE, &["user_id"]).await;
        records.declare_unique(HOSPITAL_TABLE, &["user_id", "name"]).await;
        records.declare_unique(NOTE_TABLE, &["hospital_id"]).await;

        let files = BlobStore::with_backend(&BlobBackend::Memory, "medical-files", public_base)?;
        let avatars = BlobStore::with_backend(&BlobBackend::Memory, "profile-images", public_base)?;
        Ok(HealthRecordService::new(Arc::new(records), files, avatars))
    }

    pub fn cache(&self) -> &HospitalCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Fetch-or-default: absence is first-time setup, not an error.
    pub async fn load_profile(&self, user_id: &str) -> Result<Option<Profile>, ServiceError> {
        let rows = self
            .records
            .select(PROFILE_TABLE, &Filter::new().eq("user_id", user_id))
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Upsert keyed on user id. Repeated identical saves leave exactly
    /// one stored row.
    pub async fn save_profile(
        &self,
        user_id: &str,
        fields: ProfileFields,
    ) -> Result<Profile, ServiceError> {
        let profile = Profile::new(user_id, fields);
        for (field, value) in profile.fields() {
            if value.trim().is_empty() {
                return Err(ServiceError::Validation(format!(
                    "Profile field '{}' must not be empty",
                    field
                )));
            }
        }

        self.records
            .upsert(PROFILE_TABLE, vec![to_row(&profile)?], "user_id")
            .await?;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Hospitals
    // ------------------------------------------------------------------

    /// Hospitals in store-insertion order.
    pub async fn list_hospitals(&self, user_id: &str) -> Result<Vec<Hospital>, ServiceError> {
        let rows = self
            .records
            .select(HOSPITAL_TABLE, &Filter::new().eq("user_id", user_id))
            .await?;
        rows.into_iter()
            .map(|row| from_row(row).map_err(ServiceError::from))
            .collect()
    }

    pub async fn add_hospital(&self, user_id: &str, name: &str) -> Result<Hospital, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation(
                "Hospital name must not be empty".to_string(),
            ));
        }

        // Friendly pre-check; correctness rests on the store's
        // (user_id, name) uniqueness constraint, not on this read.
        let existing = self
            .records
            .select(
                HOSPITAL_TABLE,
                &Filter::new().eq("user_id", user_id).eq("name", name),
            )
            .await?;
        if !existing.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Hospital '{}' already exists",
                name
            )));
        }

        let hospital = Hospital {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        match self
            .records
            .insert(HOSPITAL_TABLE, vec![to_row(&hospital)?])
            .await
        {
            Ok(()) => {}
            Err(StoreError::Constraint { .. }) => {
                return Err(ServiceError::Conflict(format!(
                    "Hospital '{}' already exists",
                    name
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.cache.seed(hospital.id);
        Ok(hospital)
    }

    /// Cascade delete: the hospital row, its note row, and its stored
    /// files all go, then the cached view is evicted.
    pub async fn delete_hospital(
        &self,
        user_id: &str,
        hospital_id: Uuid,
    ) -> Result<(), ServiceError> {
        let hospital = self.hospital_owned(user_id, hospital_id).await?;

        self.records
            .delete(
                HOSPITAL_TABLE,
                &Filter::new()
                    .eq("user_id", user_id)
                    .eq("id", hospital_id.to_string()),
            )
            .await?;
        self.records
            .delete(
                NOTE_TABLE,
                &Filter::new().eq("hospital_id", hospital_id.to_string()),
            )
            .await?;
        self.files
            .delete_prefix(&format!("{}/{}", user_id, hospital_id))
            .await?;

        self.cache.evict(hospital_id);
        debug!(hospital = %hospital.name, "hospital deleted with note and files");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hospital detail (note + files)
    // ------------------------------------------------------------------

    /// Detail read served from the cached view when one is present.
    /// On a miss, the note and per-category file listings are awaited
    /// concurrently and the result is applied to the cache only if no
    /// newer load was issued meanwhile.
    pub async fn load_hospital_detail(
        &self,
        user_id: &str,
        hospital_id: Uuid,
    ) -> Result<HospitalDetail, ServiceError> {
        self.hospital_owned(user_id, hospital_id).await?;

        if let Some(view) = self.cache.get(hospital_id) {
            return Ok(view);
        }

        let token = self.cache.begin_load(hospital_id);
        let (note, files) = tokio::join!(
            self.fetch_note(user_id, hospital_id),
            self.fetch_files(user_id, hospital_id)
        );
        let view = HospitalDetail {
            note: note?,
            files_by_category: files?,
        };

        if !self.cache.complete_load(hospital_id, token, view.clone()) {
            debug!(%hospital_id, token, "detail fetch superseded; cache left untouched");
        }
        Ok(view)
    }

    /// Idempotent upsert keyed on hospital id. The cached view is
    /// invalidated, then rebuilt by a full re-read.
    pub async fn save_note(
        &self,
        user_id: &str,
        hospital_id: Uuid,
        text: &str,
    ) -> Result<HospitalDetail, ServiceError> {
        self.hospital_owned(user_id, hospital_id).await?;

        let note = Note {
            hospital_id,
            user_id: user_id.to_string(),
            note_text: text.to_string(),
        };
        self.records
            .upsert(NOTE_TABLE, vec![to_row(&note)?], "hospital_id")
            .await?;

        self.cache.invalidate(hospital_id);
        self.load_hospital_detail(user_id, hospital_id).await
    }

    /// Sanitize, write with overwrite-on-conflict, then re-list. A
    /// failed re-list after a successful upload invalidates the cached
    /// view instead of silently under-reporting the file count.
    pub async fn upload_file(
        &self,
        user_id: &str,
        hospital_id: Uuid,
        category: FileCategory,
        data: Bytes,
        file_name: &str,
    ) -> Result<FileEntry, ServiceError> {
        self.hospital_owned(user_id, hospital_id).await?;

        let sanitized = sanitize_file_name(file_name.trim());
        if sanitized.trim_matches(|c| c == '_' || c == '.').is_empty() {
            return Err(ServiceError::Validation(
                "File name must contain at least one alphanumeric character".to_string(),
            ));
        }

        let path = format!("{}/{}/{}/{}", user_id, hospital_id, category, sanitized);
        self.files.put(&path, data).await?;

        self.cache.invalidate(hospital_id);
        if let Err(e) = self.load_hospital_detail(user_id, hospital_id).await {
            warn!(%hospital_id, error = %e, "re-list after upload failed; cache invalidated");
            self.cache.invalidate(hospital_id);
        }

        Ok(FileEntry {
            name: sanitized,
            url: self.files.public_url(&path),
        })
    }

    // ------------------------------------------------------------------
    // Avatar
    // ------------------------------------------------------------------

    /// Overwrite-write of `{user_id}/avatar.{ext}`, cleanup of stale
    /// avatars under another extension, cache-busted public URL.
    pub async fn upload_avatar(
        &self,
        user_id: &str,
        data: Bytes,
        extension: &str,
    ) -> Result<String, ServiceError> {
        let ext: String = extension
            .trim_start_matches('.')
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if ext.is_empty() {
            return Err(ServiceError::Validation(
                "Avatar file extension is required".to_string(),
            ));
        }

        let path = format!("{}/avatar.{}", user_id, ext);
        self.avatars.put(&path, data).await?;

        // Changing the extension would otherwise strand the old object.
        let stale: Vec<String> = self
            .avatars
            .list(user_id)
            .await?
            .into_iter()
            .filter(|p| p.starts_with(&format!("{}/avatar.", user_id)) && *p != path)
            .collect();
        for old in stale {
            self.avatars.delete(&old).await?;
        }

        Ok(format!(
            "{}?t={}",
            self.avatars.public_url(&path),
            Utc::now().timestamp_millis()
        ))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn hospital_owned(
        &self,
        user_id: &str,
        hospital_id: Uuid,
    ) -> Result<Hospital, ServiceError> {
        let rows = self
            .records
            .select(
                HOSPITAL_TABLE,
                &Filter::new()
                    .eq("user_id", user_id)
                    .eq("id", hospital_id.to_string()),
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(from_row(row)?),
            None => Err(ServiceError::NotFound(format!(
                "Hospital {} not found",
                hospital_id
            ))),
        }
    }

    async fn fetch_note(&self, user_id: &str, hospital_id: Uuid) -> Result<String, ServiceError> {
        let rows = self
            .records
            .select(
                NOTE_TABLE,
                &Filter::new()
                    .eq("hospital_id", hospital_id.to_string())
                    .eq("user_id", user_id),
            )
            .await?;
        match rows.into_iter().next() {
            Some(row) => {
                let note: Note = from_row(row)?;
                Ok(note.note_text)
            }
            None => Ok(String::new()),
        }
    }

    async fn fetch_files(
        &self,
        user_id: &str,
        hospital_id: Uuid,
    ) -> Result<BTreeMap<String, Vec<FileEntry>>, ServiceError> {
        let mut by_category = BTreeMap::new();
        for category in FileCategory::ALL {
            let prefix = format!("{}/{}/{}", user_id, hospital_id, category);
            let mut entries = Vec::new();
            for path in self.files.list(&prefix).await? {
                let name = path.rsplit('/').next().unwrap_or(&path).to_string();
                entries.push(FileEntry {
                    name,
                    url: self.files.public_url(&path),
                });
            }
            by_category.insert(category.as_str().to_string(), entries);
        }
        Ok(by_category)
    }
}
