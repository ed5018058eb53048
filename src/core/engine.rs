use crate::config::SyncConfig;
use crate::core::{lookup, upsert};
use crate::domain::model::{FlowLookup, JobOutcome, JobSpec, JobStatus, RunSummary};
use crate::domain::ports::{SheetSource, TableStore};
use crate::utils::error::{Result, SyncError};
use chrono::NaiveDate;
use std::time::Instant;

/// Per-run settings that do not belong in the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub today: NaiveDate,
    pub dry_run: bool,
    /// Restrict the run to these job names, in config order.
    pub only: Option<Vec<String>>,
}

impl RunOptions {
    pub fn for_date(today: NaiveDate) -> Self {
        Self {
            today,
            dry_run: false,
            only: None,
        }
    }

    pub fn today() -> Self {
        Self::for_date(chrono::Local::now().date_naive())
    }
}

/// Builds the lookup once, then runs every job in order, isolating failures per job.
pub struct SyncEngine<S: SheetSource, T: TableStore> {
    source: S,
    store: T,
    config: SyncConfig,
    options: RunOptions,
}

impl<S: SheetSource, T: TableStore> SyncEngine<S, T> {
    pub fn new(source: S, store: T, config: SyncConfig, options: RunOptions) -> Self {
        Self {
            source,
            store,
            config,
            options,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn selected_jobs(&self) -> Result<Vec<&JobSpec>> {
        let Some(only) = &self.options.only else {
            return Ok(self.config.jobs.iter().collect());
        };

        for name in only {
            if !self.config.jobs.iter().any(|job| &job.display_name() == name) {
                return Err(SyncError::InvalidConfigValueError {
                    field: "only".to_string(),
                    value: name.clone(),
                    reason: "No job with this name in the configuration".to_string(),
                });
            }
        }

        Ok(self
            .config
            .jobs
            .iter()
            .filter(|job| only.contains(&job.display_name()))
            .collect())
    }

    pub fn build_lookup(&self) -> Result<FlowLookup> {
        let lookup = lookup::build_lookup(&self.source, &self.config.source)?;
        if lookup.is_empty() && self.config.source.require_non_empty {
            return Err(SyncError::EmptyLookup {
                path: self.config.source.path.clone(),
            });
        }
        Ok(lookup)
    }

    pub fn run_job(&self, job: &JobSpec, lookup: &FlowLookup) -> JobOutcome {
        let target = self.config.target_for(job);
        let result = upsert::upsert(
            &self.store,
            &target,
            job,
            lookup,
            self.options.today,
            &self.config.destination,
            self.options.dry_run,
        );

        let status = match result {
            Ok(merge) => {
                tracing::info!(
                    "✅ {}: {} row for {} ({} column(s), {} warning(s))",
                    job.display_name(),
                    merge.mode,
                    merge.date,
                    merge.columns_changed,
                    merge.warnings.len()
                );
                JobStatus::Succeeded(merge)
            }
            Err(e) => {
                tracing::error!("❌ Job '{}' failed: {}", job.display_name(), e);
                tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                JobStatus::Failed {
                    error: e.to_string(),
                    suggestion: e.recovery_suggestion().to_string(),
                }
            }
        };

        JobOutcome {
            job: job.display_name(),
            path: target.path,
            status,
        }
    }

    /// Errors only when the run cannot start: bad job filter, or no usable lookup.
    pub fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        tracing::info!("Processing date: {}", self.options.today);

        let jobs = self.selected_jobs()?;
        let lookup = self.build_lookup()?;

        tracing::info!("Starting to process {} job(s)...", jobs.len());
        let mut outcomes = Vec::with_capacity(jobs.len());
        for (idx, job) in jobs.iter().enumerate() {
            tracing::info!("JOB {}/{}: {}", idx + 1, jobs.len(), job.display_name());
            outcomes.push(self.run_job(job, &lookup));
        }

        let summary = RunSummary::new(self.options.today, &lookup, self.options.dry_run, outcomes);
        tracing::info!(
            "Finished {} job(s) in {:?}: {} succeeded, {} failed",
            summary.total,
            started.elapsed(),
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }
}
