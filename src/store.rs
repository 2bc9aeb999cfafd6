use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ReviewError};
use crate::images::ImageStore;
use crate::models::{RankedSchool, SchoolId, SubmissionRecord};
use crate::priority;

pub const UNKNOWN_SCHOOL: &str = "Unknown School";

/// Read side of the submission database.
#[allow(async_fn_in_trait)]
pub trait SubmissionStore {
    /// Distinct schools with a submission on `date`, in school-id order.
    async fn list_school_ids(&self, date: NaiveDate) -> Result<Vec<SchoolId>>;

    /// Records for one school and date, ordered by timestamp and
    /// deduplicated by (class, section).
    async fn fetch_records(
        &self,
        school_id: SchoolId,
        date: NaiveDate,
    ) -> Result<Vec<SubmissionRecord>>;

    async fn lookup_school_name(&self, school_id: SchoolId) -> Result<Option<String>>;
}

/// Memoized record sequences keyed by (school, date).
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: HashMap<(SchoolId, NaiveDate), Arc<Vec<SubmissionRecord>>>,
}

impl RecordCache {
    pub fn get(&self, school_id: SchoolId, date: NaiveDate) -> Option<Arc<Vec<SubmissionRecord>>> {
        self.entries.get(&(school_id, date)).cloned()
    }

    pub fn insert(
        &mut self,
        school_id: SchoolId,
        date: NaiveDate,
        records: Vec<SubmissionRecord>,
    ) -> Arc<Vec<SubmissionRecord>> {
        let records = Arc::new(records);
        self.entries.insert((school_id, date), Arc::clone(&records));
        records
    }

    pub fn invalidate(&mut self, school_id: SchoolId, date: NaiveDate) {
        self.entries.remove(&(school_id, date));
    }

    pub fn invalidate_date(&mut self, date: NaiveDate) {
        self.entries.retain(|(_, cached), _| *cached != date);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Operator navigation: the selected date and the position in its ranked
/// school list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub selected_date: Option<NaiveDate>,
    pub current_index: usize,
}

impl ViewState {
    /// Picking a different date starts again from the first school.
    pub fn select_date(&mut self, date: NaiveDate) {
        if self.selected_date != Some(date) {
            self.selected_date = Some(date);
            self.current_index = 0;
        }
    }

    pub fn next(&mut self, total: usize) {
        if self.current_index + 1 < total {
            self.current_index += 1;
        }
    }

    pub fn prev(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub fn jump_to(&mut self, index: usize, total: usize) {
        self.current_index = index.min(total.saturating_sub(1));
    }

    pub fn position(&self, total: usize) -> String {
        format!("{} / {}", self.current_index + 1, total)
    }
}

/// Wires the storage and image collaborators to the classification code.
/// Storage failures are logged and read as empty results.
pub struct Dashboard<S, I> {
    store: S,
    images: I,
    cache: RecordCache,
    fetch_timeout: Duration,
    max_in_flight: usize,
}

impl<S: SubmissionStore, I: ImageStore> Dashboard<S, I> {
    /// `max_in_flight` should match the connection pool size so that a
    /// fetch's timeout only runs while it can actually reach the database.
    pub fn new(store: S, images: I, fetch_timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            store,
            images,
            cache: RecordCache::default(),
            fetch_timeout,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn images(&self) -> &I {
        &self.images
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn cache_mut(&mut self) -> &mut RecordCache {
        &mut self.cache
    }

    /// Moves the operator to `date`; cached sequences of the previous date
    /// are dropped so a revisit refetches them.
    pub fn select_date(&mut self, view: &mut ViewState, date: NaiveDate) {
        if let Some(previous) = view.selected_date.filter(|&previous| previous != date) {
            self.cache.invalidate_date(previous);
        }
        view.select_date(date);
    }

    /// Drops the cached sequence for one school so the next read refetches it.
    pub fn forget(&mut self, school_id: SchoolId, date: NaiveDate) {
        self.cache.invalidate(school_id, date);
    }

    async fn fetch_abortable(
        &self,
        school_id: SchoolId,
        date: NaiveDate,
    ) -> Result<Vec<SubmissionRecord>> {
        tokio::time::timeout(self.fetch_timeout, self.store.fetch_records(school_id, date))
            .await
            .map_err(|_| ReviewError::Timeout(self.fetch_timeout))?
    }

    /// Records for one school, served from the cache when present.
    pub async fn records(&mut self, school_id: SchoolId, date: NaiveDate) -> Arc<Vec<SubmissionRecord>> {
        if let Some(records) = self.cache.get(school_id, date) {
            debug!(school_id, %date, "record cache hit");
            return records;
        }
        let records = match self.fetch_abortable(school_id, date).await {
            Ok(records) => records,
            Err(err) => {
                error!(school_id, %date, "error fetching data: {err}");
                return Arc::new(Vec::new());
            }
        };
        self.cache.insert(school_id, date, records)
    }

    pub async fn school_name(&self, school_id: SchoolId) -> String {
        match self.store.lookup_school_name(school_id).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_SCHOOL.to_string(),
            Err(err) => {
                error!(school_id, "error fetching school name: {err}");
                UNKNOWN_SCHOOL.to_string()
            }
        }
    }

    /// Schools with submissions on `date`, most suspicious first.
    ///
    /// Schools are prefetched concurrently, at most `max_in_flight` at a
    /// time. Each school is scored with its own fold.
    pub async fn rank_schools(&mut self, date: NaiveDate) -> Vec<RankedSchool> {
        let school_ids = match self.store.list_school_ids(date).await {
            Ok(ids) => ids,
            Err(err) => {
                error!(%date, "error fetching school ids: {err}");
                return Vec::new();
            }
        };

        let missing: Vec<SchoolId> = school_ids
            .iter()
            .copied()
            .filter(|&id| self.cache.get(id, date).is_none())
            .collect();
        let this = &*self;
        let fetched: Vec<_> = stream::iter(missing)
            .map(|id| async move { (id, this.fetch_abortable(id, date).await) })
            .buffer_unordered(this.max_in_flight)
            .collect()
            .await;

        for (school_id, result) in fetched {
            match result {
                Ok(records) => {
                    self.cache.insert(school_id, date, records);
                }
                Err(err) => warn!(school_id, %date, "prefetch failed: {err}"),
            }
        }

        let mut scores = HashMap::new();
        let mut counts = HashMap::new();
        for &school_id in &school_ids {
            let records = self.cache.get(school_id, date).unwrap_or_default();
            counts.insert(school_id, records.len());
            if let Some(score) = priority::representative_priority(&records, &self.images) {
                scores.insert(school_id, score);
            }
        }

        let ranked = priority::rank_schools(&school_ids, &scores);
        info!(%date, schools = ranked.len(), "ranked schools");

        let mut out = Vec::with_capacity(ranked.len());
        for school_id in ranked {
            out.push(RankedSchool {
                school_id,
                school_name: self.school_name(school_id).await,
                priority: scores.get(&school_id).copied(),
                record_count: counts.get(&school_id).copied().unwrap_or(0),
            });
        }
        out
    }
}
