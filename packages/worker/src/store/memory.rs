//! In-memory storage for tests and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use extraction::ChapterNumber;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, JobStore, ScheduledCrawlStore};
use crate::domains::crawling::models::{title_key, Chapter, CrawlStatus, ScheduledCrawl, Series};
use crate::error::{StoreError, StoreResult};
use crate::kernel::jobs::{
    Job, JobCounts, JobFilter, JobStatus, NewJob, CANCELED_MESSAGE, LOCK_EXPIRED_MESSAGE,
};

/// Jobs, scheduled crawls and the catalog behind `RwLock`s.
///
/// Every state transition happens under one write lock, so claims are as
/// exclusive here as the conditional `UPDATE` is in SQLite. Data is lost on
/// drop.
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    scheduled_crawls: RwLock<HashMap<Uuid, ScheduledCrawl>>,
    series: RwLock<HashMap<Uuid, Series>>,
    chapters: RwLock<BTreeMap<(Uuid, ChapterNumber), Chapter>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            scheduled_crawls: RwLock::new(HashMap::new()),
            series: RwLock::new(HashMap::new()),
            chapters: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.read().unwrap().len()
    }
}

fn finish(job: &mut Job, status: JobStatus, now: DateTime<Utc>) {
    job.status = status;
    job.completed_at = Some(now);
    job.lock_token = None;
    job.updated_at = now;
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job> {
        let job = job.into_job(now);
        self.jobs.write().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_or_create_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().unwrap();

        if let Some(key) = job.dedupe_key.as_deref() {
            if let Some(existing) = jobs.values().find(|j| j.dedupe_key.as_deref() == Some(key)) {
                return Ok(existing.clone());
            }
        }

        let job = job.into_job(now);
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap()
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn find_due_jobs(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Job>> {
        let mut due: Vec<Job> = self
            .jobs
            .read()
            .unwrap()
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.lock_token.is_none() && j.scheduled_at <= now)
            .cloned()
            .collect();

        due.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn claim_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>> {
        let mut jobs = self.jobs.write().unwrap();

        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending && job.lock_token.is_none() => {
                job.status = JobStatus::Running;
                job.lock_token = Some(Uuid::new_v4());
                job.started_at = Some(now);
                job.updated_at = now;
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn complete_job(
        &self,
        id: Uuid,
        lock_token: Uuid,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut jobs = self.jobs.write().unwrap();

        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Running && job.lock_token == Some(lock_token) => {
                job.result = Some(result);
                finish(job, JobStatus::Completed, now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_job(&self, id: Uuid, lock_token: Uuid, message: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut jobs = self.jobs.write().unwrap();

        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Running && job.lock_token == Some(lock_token) => {
                job.error_message = Some(message.to_string());
                finish(job, JobStatus::Failed, now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>> {
        let mut jobs = self.jobs.write().unwrap();

        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.error_message = Some(CANCELED_MESSAGE.to_string());
                finish(job, JobStatus::Failed, now);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn expire_stale_jobs(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut jobs = self.jobs.write().unwrap();
        let mut expired = Vec::new();

        for job in jobs.values_mut() {
            let stale = job.status == JobStatus::Running && job.started_at.map_or(false, |t| t < cutoff);
            if stale {
                job.error_message = Some(LOCK_EXPIRED_MESSAGE.to_string());
                finish(job, JobStatus::Failed, now);
                expired.push(job.id);
            }
        }

        expired.sort();
        Ok(expired)
    }

    async fn purge_jobs(&self, status: JobStatus, before: DateTime<Utc>) -> StoreResult<u64> {
        if !status.is_terminal() {
            return Ok(0);
        }

        let mut jobs = self.jobs.write().unwrap();
        let before_len = jobs.len();
        jobs.retain(|_, j| !(j.status == status && j.completed_at.map_or(false, |t| t < before)));
        Ok((before_len - jobs.len()) as u64)
    }

    async fn job_counts(&self) -> StoreResult<JobCounts> {
        let mut counts = JobCounts::default();
        for job in self.jobs.read().unwrap().values() {
            counts.record(job.status, &job.job_type, 1);
        }
        Ok(counts)
    }
}

#[async_trait]
impl ScheduledCrawlStore for MemoryStore {
    async fn insert_scheduled_crawl(&self, crawl: &ScheduledCrawl) -> StoreResult<()> {
        self.scheduled_crawls
            .write()
            .unwrap()
            .insert(crawl.id, crawl.clone());
        Ok(())
    }

    async fn update_scheduled_crawl(&self, crawl: &ScheduledCrawl) -> StoreResult<()> {
        let mut crawls = self.scheduled_crawls.write().unwrap();
        match crawls.get_mut(&crawl.id) {
            Some(existing) => {
                *existing = crawl.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "scheduled crawl",
                id: crawl.id,
            }),
        }
    }

    async fn get_scheduled_crawl(&self, id: Uuid) -> StoreResult<Option<ScheduledCrawl>> {
        Ok(self.scheduled_crawls.read().unwrap().get(&id).cloned())
    }

    async fn list_scheduled_crawls(&self) -> StoreResult<Vec<ScheduledCrawl>> {
        let mut crawls: Vec<_> = self
            .scheduled_crawls
            .read()
            .unwrap()
            .values()
            .cloned()
            .collect();
        crawls.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(crawls)
    }

    async fn delete_scheduled_crawl(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.scheduled_crawls.write().unwrap().remove(&id).is_some())
    }

    async fn find_due_scheduled_crawls(&self, now: DateTime<Utc>) -> StoreResult<Vec<ScheduledCrawl>> {
        let mut due: Vec<_> = self
            .scheduled_crawls
            .read()
            .unwrap()
            .values()
            .filter(|c| c.status == CrawlStatus::Active && c.next_run_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_run_at.cmp(&b.next_run_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn advance_scheduled_crawl(
        &self,
        id: Uuid,
        expected: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut crawls = self.scheduled_crawls.write().unwrap();
        match crawls.get_mut(&id) {
            Some(crawl) if crawl.status == CrawlStatus::Active && crawl.next_run_at == expected => {
                crawl.next_run_at = next_run_at;
                crawl.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_scheduled_crawl_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut crawls = self.scheduled_crawls.write().unwrap();
        let crawl = crawls.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "scheduled crawl",
            id,
        })?;

        crawl.last_run_at = Some(last_run_at);
        if let Some(next) = next_run_at {
            crawl.next_run_at = next;
        }
        crawl.updated_at = last_run_at;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_series(&self, id: Uuid) -> StoreResult<Option<Series>> {
        Ok(self.series.read().unwrap().get(&id).cloned())
    }

    async fn find_series_by_title(&self, title: &str) -> StoreResult<Option<Series>> {
        let key = title_key(title);
        Ok(self
            .series
            .read()
            .unwrap()
            .values()
            .find(|s| s.title_key() == key)
            .cloned())
    }

    async fn find_or_create_series(&self, series: Series) -> StoreResult<Series> {
        let mut all = self.series.write().unwrap();
        let key = series.title_key();

        if let Some(existing) = all.values().find(|s| s.title_key() == key) {
            return Ok(existing.clone());
        }

        all.insert(series.id, series.clone());
        Ok(series)
    }

    async fn chapter_numbers(&self, series_id: Uuid) -> StoreResult<BTreeSet<ChapterNumber>> {
        Ok(self
            .chapters
            .read()
            .unwrap()
            .keys()
            .filter(|(sid, _)| *sid == series_id)
            .map(|(_, number)| *number)
            .collect())
    }

    async fn insert_chapters(&self, chapters: &[Chapter]) -> StoreResult<()> {
        let mut stored = self.chapters.write().unwrap();

        let mut batch_keys = BTreeSet::new();
        for chapter in chapters {
            let key = (chapter.series_id, chapter.number);
            if stored.contains_key(&key) || !batch_keys.insert(key) {
                return Err(StoreError::DuplicateChapter {
                    series_id: chapter.series_id,
                    number: chapter.number,
                });
            }
        }

        for chapter in chapters {
            stored.insert((chapter.series_id, chapter.number), chapter.clone());
        }
        Ok(())
    }

    async fn list_chapters(&self, series_id: Uuid) -> StoreResult<Vec<Chapter>> {
        Ok(self
            .chapters
            .read()
            .unwrap()
            .range((series_id, ChapterNumber::from(0u32))..)
            .take_while(|((sid, _), _)| *sid == series_id)
            .map(|(_, chapter)| chapter.clone())
            .collect())
    }
}
