use std::collections::VecDeque;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::{GenomeId, SpeciesId, WorkItem};
use crate::error::MarkerError;
use crate::fs_util;
use crate::layout::ITEM_LOG;
use crate::progress::ItemLog;
use crate::store;
use crate::worker::WorkerRunner;

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub force: bool,
    pub debug: bool,
    pub dry_run: bool,
    pub jobs: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            force: false,
            debug: false,
            dry_run: false,
            jobs: default_jobs(),
        }
    }
}

pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemStatus {
    Completed { markers: usize },
    Skipped,
    Pending,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub genome_id: GenomeId,
    pub species_id: SpeciesId,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub items: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn count(&self, matches: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|item| matches(&item.status)).count()
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, ItemStatus::Failed { .. }))
    }

    pub fn into_result(self) -> Result<Self, MarkerError> {
        let failed = self.failed();
        if failed > 0 {
            return Err(MarkerError::ItemsFailed {
                failed,
                total: self.items.len(),
            });
        }
        Ok(self)
    }
}

pub struct Dispatcher<'a> {
    worker: WorkerRunner<'a>,
    work_root: Utf8PathBuf,
}

impl<'a> Dispatcher<'a> {
    pub fn new(worker: WorkerRunner<'a>, work_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            worker,
            work_root: work_root.into(),
        }
    }

    pub fn work_dir(&self, item: &WorkItem) -> Utf8PathBuf {
        self.work_root.join(item.work_dir_name())
    }

    pub fn dispatch(
        &self,
        items: Vec<WorkItem>,
        model: &Utf8Path,
        options: &DispatchOptions,
    ) -> RunSummary {
        let total = items.len();
        let jobs = options.jobs.max(1).min(total.max(1));
        let queue = Mutex::new(items.into_iter().collect::<VecDeque<_>>());
        let (tx, rx) = mpsc::channel::<ItemOutcome>();
        info!(total, jobs, "dispatching genomes");

        let mut outcomes = Vec::with_capacity(total);
        thread::scope(|scope| {
            for _ in 0..jobs {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let next = match queue.lock() {
                            Ok(mut pending) => pending.pop_front(),
                            Err(_) => None,
                        };
                        let Some(item) = next else {
                            break;
                        };
                        let status = panic::catch_unwind(AssertUnwindSafe(|| {
                            self.dispatch_one(&item, model, options)
                        }))
                        .unwrap_or_else(|_| {
                            error!(genome = %item.genome_id, "worker panicked");
                            ItemStatus::Failed {
                                error: "worker panicked".to_string(),
                            }
                        });
                        let outcome = ItemOutcome {
                            genome_id: item.genome_id,
                            species_id: item.species_id,
                            status,
                        };
                        if tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                outcomes.push(outcome);
                info!(done = outcomes.len(), total, "genome finished");
            }
        });

        outcomes.sort_by(|a, b| a.genome_id.cmp(&b.genome_id));
        RunSummary { items: outcomes }
    }

    fn dispatch_one(
        &self,
        item: &WorkItem,
        model: &Utf8Path,
        options: &DispatchOptions,
    ) -> ItemStatus {
        let settings = self.worker.settings();
        let marker = settings.layout.completion_marker(item);
        let exists = settings
            .retry
            .run(&format!("check {marker}"), || self.worker.store().exists(&marker));
        let mut message = format!(
            "Running marker gene search for genome {} from species {}.",
            item.genome_id, item.species_id
        );
        match exists {
            Err(err) => {
                error!(genome = %item.genome_id, "completion check failed: {err}");
                return ItemStatus::Failed {
                    error: err.to_string(),
                };
            }
            Ok(true) if !options.force => {
                info!(
                    genome = %item.genome_id,
                    "Destination {marker} already exists. Specify --force to overwrite."
                );
                return ItemStatus::Skipped;
            }
            Ok(true) => message = message.replacen("Running", "Rerunning", 1),
            Ok(false) => {}
        }
        if options.dry_run {
            info!(genome = %item.genome_id, "dry run: would process");
            return ItemStatus::Pending;
        }

        info!(genome = %item.genome_id, "{message}");
        match self.process(item, model, options, &message) {
            Ok(markers) => ItemStatus::Completed { markers },
            Err(err) => {
                error!(genome = %item.genome_id, "genome failed: {err}");
                ItemStatus::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    fn process(
        &self,
        item: &WorkItem,
        model: &Utf8Path,
        options: &DispatchOptions,
        message: &str,
    ) -> Result<usize, MarkerError> {
        let work_dir = self.work_dir(item);
        if !options.debug {
            fs_util::remove_dir_if_exists(work_dir.as_std_path())?;
        }
        fs::create_dir_all(work_dir.as_std_path())
            .map_err(|err| MarkerError::Filesystem(format!("create {work_dir}: {err}")))?;

        let log_path = work_dir.join(ITEM_LOG);
        let log = ItemLog::open(log_path.as_std_path(), item.genome_id.as_str())?;
        log.line(message);

        let result = self.worker.run(item, model, &work_dir, &log);
        match &result {
            Ok(report) => log.line(format!(
                "Finished genome {} with {} marker genes.",
                item.genome_id, report.markers
            )),
            Err(err) => log.line(format!("Genome {} failed: {err}", item.genome_id)),
        }
        drop(log);

        // Best effort: a failed log upload must not hide the item's own result.
        let settings = self.worker.settings();
        let log_key = settings.layout.output(item, ITEM_LOG);
        if let Err(err) =
            store::upload(self.worker.store(), &settings.retry, &log_path, &log_key, false)
        {
            warn!(genome = %item.genome_id, "failed to upload log {log_key}: {err}");
        }
        if !options.debug {
            if let Err(err) = fs_util::remove_dir_if_exists(work_dir.as_std_path()) {
                warn!(genome = %item.genome_id, "failed to remove {work_dir}: {err}");
            }
        }

        result.map(|report| report.markers)
    }
}
