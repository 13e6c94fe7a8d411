//! Local aggregate cache of hospital detail views.
//!
//! The remote stores are the source of truth; this cache only mirrors
//! them so the surface layer always has a consistent view to render.
//! Every mutation goes through invalidate-and-refetch, never through
//! incremental patching.
//!
//! Each view carries a monotonically increasing load token. A fetch
//! result is applied only if its token is still the latest issued for
//! that view, so a superseded fetch (user re-triggered the load, or
//! navigated away and back) can never overwrite newer state.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use uuid::Uuid;

use crate::model::HospitalDetail;

#[derive(Default)]
pub struct HospitalCache {
    views: DashMap<Uuid, HospitalDetail>,
    latest_tokens: DashMap<Uuid, u64>,
    issued: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HospitalCache {
    pub fn new() -> Self {
        HospitalCache::default()
    }

    pub fn get(&self, hospital_id: Uuid) -> Option<HospitalDetail> {
        let view = self.views.get(&hospital_id).map(|v| v.value().clone());
        match view {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Seed a freshly created hospital with an empty view.
    pub fn seed(&self, hospital_id: Uuid) {
        self.views.insert(hospital_id, HospitalDetail::empty());
    }

    /// Issue a load token for this view. Tokens are globally monotone;
    /// issuing a new one supersedes all earlier in-flight loads.
    pub fn begin_load(&self, hospital_id: Uuid) -> u64 {
        let token = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest_tokens.insert(hospital_id, token);
        token
    }

    /// Apply a fetched view if `token` is still the latest for this
    /// hospital. Returns false when the result was superseded.
    pub fn complete_load(&self, hospital_id: Uuid, token: u64, view: HospitalDetail) -> bool {
        match self.latest_tokens.get(&hospital_id) {
            Some(latest) if *latest == token => {
                drop(latest);
                self.views.insert(hospital_id, view);
                true
            }
            _ => false,
        }
    }

    /// Drop the cached view, forcing the next read to refetch.
    pub fn invalidate(&self, hospital_id: Uuid) {
        self.views.remove(&hospital_id);
    }

    /// Remove all state for a deleted hospital.
    pub fn evict(&self, hospital_id: Uuid) {
        self.views.remove(&hospital_id);
        self.latest_tokens.remove(&hospital_id);
    }

    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
