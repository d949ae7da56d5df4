//! Background scheduler for recurring harvests.
//!
//! Jobs are persisted through [`JobRepository`] and kept in memory with their
//! next fire time. A single loop wakes every tick, reloads the stored jobs so
//! changes made by other processes take effect, collects due jobs and spawns
//! one engine run per job. A source never has two runs in flight: a
//! trigger that comes due while its source is still running is skipped.

mod trigger;

pub use trigger::Trigger;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::HarvestEngine;
use crate::models::{ScheduleError, SchedulePolicy, ScheduledJob};
use crate::repository::{DbError, JobRepository};

/// Default wake-up period of the scheduler loop.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("Job storage failed: {0}")]
    Storage(#[from] DbError),
}

/// A job as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    #[serde(flatten)]
    pub job: ScheduledJob,
    pub schedule: String,
    pub next_run: Option<DateTime<Utc>>,
}

/// Changes applied by [`Scheduler::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub loaded: usize,
    pub removed: usize,
}

struct Entry {
    job: ScheduledJob,
    trigger: Trigger,
    next_run: Option<DateTime<Utc>>,
}

impl Entry {
    fn info(&self) -> JobInfo {
        JobInfo {
            job: self.job.clone(),
            schedule: self.job.policy.describe(),
            next_run: self.next_run,
        }
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    in_flight: HashSet<i64>,
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

/// Triggers engine runs on daily, interval and weekly policies.
pub struct Scheduler {
    engine: Arc<HarvestEngine>,
    jobs: JobRepository,
    state: Arc<Mutex<State>>,
    tick: Duration,
    worker: Mutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(engine: Arc<HarvestEngine>) -> Self {
        let jobs = engine.db().jobs();
        Self {
            engine,
            jobs,
            state: Arc::new(Mutex::new(State::default())),
            tick: DEFAULT_TICK,
            worker: Mutex::new(None),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Harvest a source every day at `at` (`HH:MM`, local time).
    pub async fn add_daily(
        &self,
        source_id: i64,
        at: &str,
        max_leads: Option<usize>,
    ) -> Result<String, SchedulerError> {
        let policy = SchedulePolicy::daily(at)?;
        self.add_job(ScheduledJob::new(source_id, policy, max_leads))
            .await
    }

    /// Harvest a source every `hours` hours, starting `hours` from now.
    pub async fn add_interval(
        &self,
        source_id: i64,
        hours: u32,
        max_leads: Option<usize>,
    ) -> Result<String, SchedulerError> {
        let policy = SchedulePolicy::every_hours(hours)?;
        self.add_job(ScheduledJob::new(source_id, policy, max_leads))
            .await
    }

    /// Harvest a source once a week on `day` at `at`.
    pub async fn add_weekly(
        &self,
        source_id: i64,
        day: &str,
        at: &str,
        max_leads: Option<usize>,
    ) -> Result<String, SchedulerError> {
        let policy = SchedulePolicy::weekly(day, at)?;
        self.add_job(ScheduledJob::new(source_id, policy, max_leads))
            .await
    }

    /// Persist and register a job. An existing job with the same id is replaced.
    pub async fn add_job(&self, job: ScheduledJob) -> Result<String, SchedulerError> {
        let trigger = Trigger::for_policy(&job.policy)?;
        self.jobs.save(&job).await?;

        let job_id = job.job_id.clone();
        let mut state = self.state.lock().await;
        if state.entries.contains_key(&job_id) {
            debug!("Replacing scheduled job {}", job_id);
        }
        state.entries.insert(job_id.clone(), entry(job, trigger, Utc::now()));
        info!("Scheduled job: {}", job_id);
        Ok(job_id)
    }

    /// Cancel a job. Returns false if no such job exists.
    pub async fn remove_job(&self, job_id: &str) -> Result<bool, SchedulerError> {
        let removed = self.state.lock().await.entries.remove(job_id).is_some();
        let deleted = self.jobs.delete(job_id).await?;
        if removed || deleted {
            info!("Cancelled job: {}", job_id);
        }
        Ok(removed || deleted)
    }

    /// All registered jobs ordered by id.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.state.lock().await;
        let mut jobs: Vec<JobInfo> = state.entries.values().map(Entry::info).collect();
        jobs.sort_by(|a, b| a.job.job_id.cmp(&b.job.job_id));
        jobs
    }

    pub async fn jobs_for_source(&self, source_id: i64) -> Vec<JobInfo> {
        self.list_jobs()
            .await
            .into_iter()
            .filter(|j| j.job.source_id == source_id)
            .collect()
    }

    /// Load persisted jobs into memory. Returns the number of enabled jobs.
    pub async fn restore(&self) -> Result<usize, SchedulerError> {
        self.sync().await?;
        let restored = self.state.lock().await.entries.len();
        info!("Restored {} scheduled jobs", restored);
        Ok(restored)
    }

    /// Reconcile in-memory jobs with storage.
    ///
    /// Jobs added or changed by another process are picked up, jobs whose
    /// rows are gone are cancelled, and unchanged jobs keep their next fire
    /// time.
    pub async fn sync(&self) -> Result<SyncSummary, SchedulerError> {
        let stored = self.jobs.get_all().await?;
        let now = Utc::now();
        let mut summary = SyncSummary::default();
        let mut state = self.state.lock().await;

        let mut live: HashSet<String> = HashSet::new();
        let mut live_sources: HashSet<i64> = HashSet::new();
        for job in stored.into_iter().filter(|j| j.enabled) {
            live.insert(job.job_id.clone());
            live_sources.insert(job.source_id);

            let unchanged = state.entries.get(&job.job_id).is_some_and(|e| {
                e.job.policy == job.policy
                    && e.job.max_leads == job.max_leads
                    && e.job.source_id == job.source_id
            });
            if unchanged {
                continue;
            }
            let trigger = match Trigger::for_policy(&job.policy) {
                Ok(trigger) => trigger,
                Err(e) => {
                    warn!("Skipping stored job {}: {}", job.job_id, e);
                    live.remove(&job.job_id);
                    continue;
                }
            };
            debug!("Loaded scheduled job {}", job.job_id);
            state
                .entries
                .insert(job.job_id.clone(), entry(job, trigger, now));
            summary.loaded += 1;
        }

        // Sources with no stored jobs left were deleted or fully unscheduled.
        let orphaned: HashSet<i64> = state
            .entries
            .values()
            .map(|e| e.job.source_id)
            .filter(|id| !live_sources.contains(id))
            .collect();
        for source_id in orphaned {
            summary.removed += forget_entries(&mut state, source_id);
        }

        let before = state.entries.len();
        state.entries.retain(|id, _| live.contains(id));
        summary.removed += before - state.entries.len();

        if summary.removed > 0 {
            info!("Dropped {} jobs no longer in storage", summary.removed);
        }
        Ok(summary)
    }

    /// Drop in-memory jobs of a deleted source.
    pub async fn forget_source(&self, source_id: i64) -> usize {
        let mut state = self.state.lock().await;
        forget_entries(&mut state, source_id)
    }

    /// Spawn a run for every job due at `now` and advance its next fire time.
    ///
    /// Returns the spawned runs.
    pub async fn run_pending(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let mut state = self.state.lock().await;
        let mut due = Vec::new();

        let State { entries, in_flight } = &mut *state;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let Some(entry) = entries.get_mut(&id) else {
                continue;
            };
            if !entry.next_run.is_some_and(|t| t <= now) {
                continue;
            }
            entry.next_run = entry.trigger.next_after(now);

            let source_id = entry.job.source_id;
            if !in_flight.insert(source_id) {
                warn!(
                    "Skipping job {}: source {} is still running",
                    entry.job.job_id, source_id
                );
                continue;
            }
            due.push((entry.job.job_id.clone(), source_id, entry.job.max_leads));
        }
        drop(state);

        due.into_iter()
            .map(|(job_id, source_id, max_leads)| {
                let engine = self.engine.clone();
                let state = self.state.clone();
                tokio::spawn(async move {
                    // The run gets its own task so a panic still releases the source.
                    let run = tokio::spawn(run_job(engine, job_id.clone(), source_id, max_leads));
                    if let Err(e) = run.await {
                        error!("Scheduled job {} crashed: {}", job_id, e);
                    }
                    state.lock().await.in_flight.remove(&source_id);
                })
            })
            .collect()
    }

    /// Start the background loop. Does nothing if already running.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }

        let shutdown = Arc::new(Notify::new());
        let scheduler = Arc::clone(self);
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.tick);
            loop {
                tokio::select! {
                    _ = signal.notified() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.sync().await {
                            warn!("Could not reload scheduled jobs: {}", e);
                        }
                        scheduler.run_pending(Utc::now()).await;
                    }
                }
            }
        });

        *worker = Some(Worker { handle, shutdown });
        info!("Scheduler started");
    }

    /// Stop the loop, waiting up to five seconds for it to exit.
    ///
    /// Runs already in progress continue to completion.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        worker.shutdown.notify_one();
        if tokio::time::timeout(STOP_TIMEOUT, worker.handle).await.is_err() {
            warn!("Scheduler loop did not stop within {:?}", STOP_TIMEOUT);
        }
        info!("Scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }
}

async fn run_job(
    engine: Arc<HarvestEngine>,
    job_id: String,
    source_id: i64,
    max_leads: Option<usize>,
) {
    info!("Starting scheduled job: {}", job_id);
    let result = engine.run(source_id, max_leads).await;
    if result.success {
        info!(
            "Job {} completed: {} leads saved",
            job_id, result.leads_saved
        );
    } else {
        error!(
            "Job {} failed: {}",
            job_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn forget_entries(state: &mut State, source_id: i64) -> usize {
    let before = state.entries.len();
    state.entries.retain(|_, e| e.job.source_id != source_id);
    before - state.entries.len()
}

fn entry(job: ScheduledJob, trigger: Trigger, now: DateTime<Utc>) -> Entry {
    let next_run = trigger.next_after(now);
    Entry {
        job,
        trigger,
        next_run,
    }
}
