use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::thread;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{MarkerRecord, WorkItem};
use crate::error::MarkerError;
use crate::fs_util;
use crate::hits::{self, HitThresholds};
use crate::layout::{Artifacts, RemoteLayout};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::retry::RetryPolicy;
use crate::search::SearchTool;
use crate::sequences;
use crate::store::{self, RemoteStore};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub layout: RemoteLayout,
    pub retry: RetryPolicy,
    pub thresholds: HitThresholds,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            layout: RemoteLayout::default(),
            retry: RetryPolicy::default(),
            thresholds: HitThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub markers: usize,
    pub reused_report: bool,
}

#[derive(Debug, Clone)]
pub struct LocalOutputs {
    pub files: Vec<Utf8PathBuf>,
    pub markers: usize,
    pub reused_report: bool,
}

#[derive(Clone, Copy)]
pub struct WorkerRunner<'a> {
    store: &'a dyn RemoteStore,
    tool: &'a dyn SearchTool,
    settings: &'a PipelineSettings,
}

impl<'a> WorkerRunner<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        tool: &'a dyn SearchTool,
        settings: &'a PipelineSettings,
    ) -> Self {
        Self {
            store,
            tool,
            settings,
        }
    }

    pub fn settings(&self) -> &'a PipelineSettings {
        self.settings
    }

    pub fn store(&self) -> &'a dyn RemoteStore {
        self.store
    }

    pub fn run(
        &self,
        item: &WorkItem,
        model: &Utf8Path,
        work_dir: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<ItemReport, MarkerError> {
        let outputs = self.identify(item, model, work_dir, sink)?;
        self.publish(item, &outputs, sink)?;
        Ok(ItemReport {
            markers: outputs.markers,
            reused_report: outputs.reused_report,
        })
    }

    pub fn identify(
        &self,
        item: &WorkItem,
        model: &Utf8Path,
        work_dir: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<LocalOutputs, MarkerError> {
        let artifacts = Artifacts::for_genome(&item.genome_id);

        self.clear(item, sink)?;
        let (report, reused_report) = self.search(item, model, work_dir, &artifacts, sink)?;
        let genes = self.fetch_genes(item, work_dir, sink)?;

        let sequences_path = work_dir.join(&artifacts.sequences);
        let map_path = work_dir.join(&artifacts.marker);
        let markers = self.emit(item, &report, &genes, &sequences_path, &map_path)?;
        sink.event(ProgressEvent::new(format!(
            "Selected {markers} marker genes for genome {}.",
            item.genome_id
        )));

        let files = vec![report, sequences_path, map_path];
        // The map must come last; it is what marks the item complete.
        assert_eq!(
            files.last().and_then(|path| path.file_name()),
            Some(artifacts.marker.as_str()),
            "completion marker must be the last output"
        );

        Ok(LocalOutputs {
            files,
            markers,
            reused_report,
        })
    }

    fn clear(&self, item: &WorkItem, sink: &dyn ProgressSink) -> Result<(), MarkerError> {
        let layout = &self.settings.layout;
        let retry = &self.settings.retry;
        // The marker goes first so the item stops looking complete before
        // anything else disappears.
        let mut keys = layout.all_outputs(item);
        let marker = layout.completion_marker(item);
        keys.sort_by_key(|key| *key != marker);
        for key in &keys {
            retry.run(&format!("remove {key}"), || self.store.remove(key))?;
        }
        sink.event(ProgressEvent::new(format!(
            "Cleared previous outputs under {}.",
            layout.output_dir(item)
        )));
        Ok(())
    }

    fn search(
        &self,
        item: &WorkItem,
        model: &Utf8Path,
        work_dir: &Utf8Path,
        artifacts: &Artifacts,
        sink: &dyn ProgressSink,
    ) -> Result<(Utf8PathBuf, bool), MarkerError> {
        let layout = &self.settings.layout;
        let proteins = store::download(
            self.store,
            &self.settings.retry,
            &layout.proteins(item),
            work_dir,
        )?;
        let report = work_dir.join(&artifacts.report);

        if report.as_std_path().is_file() {
            sink.event(ProgressEvent::new(format!(
                "Found search results for genome {} from a prior run.",
                item.genome_id
            )));
            return Ok((report, true));
        }

        let start = Instant::now();
        if let Err(err) =
            self.tool
                .search(model.as_std_path(), proteins.as_std_path(), report.as_std_path())
        {
            // A partial report must not be mistaken for a finished one on rerun.
            let quarantined = work_dir.join(artifacts.quarantined_report());
            match fs_util::rename_if_exists(report.as_std_path(), quarantined.as_std_path()) {
                Ok(true) => sink.event(ProgressEvent::new(format!(
                    "Moved partial search report to {quarantined}."
                ))),
                Ok(false) => {}
                Err(rename_err) => sink.event(ProgressEvent::new(format!(
                    "Could not quarantine partial search report: {rename_err}"
                ))),
            }
            return Err(err);
        }
        sink.event(ProgressEvent::timed(
            format!("Search finished for genome {}.", item.genome_id),
            start.elapsed(),
        ));
        Ok((report, false))
    }

    fn fetch_genes(
        &self,
        item: &WorkItem,
        work_dir: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<sequences::GeneSequences, MarkerError> {
        let genes_path = store::download(
            self.store,
            &self.settings.retry,
            &self.settings.layout.genes(item),
            work_dir,
        )?;
        let genes = sequences::load_genes(genes_path.as_std_path())?;
        sink.event(ProgressEvent::new(format!(
            "Loaded {} gene sequences for genome {}.",
            genes.len(),
            item.genome_id
        )));
        Ok(genes)
    }

    fn emit(
        &self,
        item: &WorkItem,
        report: &Utf8Path,
        genes: &sequences::GeneSequences,
        sequences_path: &Utf8Path,
        map_path: &Utf8Path,
    ) -> Result<usize, MarkerError> {
        let hits = hits::find_hits(report.as_std_path(), &self.settings.thresholds)?;

        let mut seq_out = create_output(sequences_path)?;
        let mut map_out = create_output(map_path)?;
        for hit in &hits {
            let sequence =
                genes
                    .get(&hit.query)
                    .ok_or_else(|| MarkerError::MissingGene {
                        genome_id: item.genome_id.to_string(),
                        gene_id: hit.query.clone(),
                    })?;
            let record = MarkerRecord {
                species_id: item.species_id.clone(),
                genome_id: item.genome_id.clone(),
                gene_id: hit.query.clone(),
                gene_length: sequence.len(),
                marker_model_id: hit.target.clone(),
            };
            map_out
                .write_all(record.to_tsv_line().as_bytes())
                .map_err(|err| write_error(map_path, err))?;
            write!(seq_out, ">{}\n{}\n", hit.query, sequence)
                .map_err(|err| write_error(sequences_path, err))?;
        }
        seq_out
            .flush()
            .map_err(|err| write_error(sequences_path, err))?;
        map_out.flush().map_err(|err| write_error(map_path, err))?;
        Ok(hits.len())
    }

    pub fn publish(
        &self,
        item: &WorkItem,
        outputs: &LocalOutputs,
        sink: &dyn ProgressSink,
    ) -> Result<(), MarkerError> {
        let Some((marker, rest)) = outputs.files.split_last() else {
            return Ok(());
        };
        let layout = &self.settings.layout;
        let retry = &self.settings.retry;

        let results: Vec<Result<(), MarkerError>> = thread::scope(|scope| {
            let handles: Vec<_> = rest
                .iter()
                .map(|path| {
                    scope.spawn(move || {
                        let key = layout.output(item, file_name(path)?);
                        store::upload(self.store, retry, path, &key, false)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(MarkerError::Filesystem("upload thread panicked".to_string()))
                    })
                })
                .collect()
        });
        for result in results {
            result?;
        }

        let marker_key = layout.output(item, file_name(marker)?);
        store::upload(self.store, retry, marker, &marker_key, true)?;
        sink.event(ProgressEvent::new(format!(
            "Published {} outputs for genome {}; completion marker at {marker_key}.",
            outputs.files.len(),
            item.genome_id
        )));
        Ok(())
    }
}

fn create_output(path: &Utf8Path) -> Result<BufWriter<File>, MarkerError> {
    let file = fs::File::create(path.as_std_path())
        .map_err(|err| MarkerError::Filesystem(format!("create {path}: {err}")))?;
    Ok(BufWriter::new(file))
}

fn write_error(path: &Utf8Path, err: std::io::Error) -> MarkerError {
    MarkerError::Filesystem(format!("write {path}: {err}"))
}

fn file_name(path: &Utf8Path) -> Result<&str, MarkerError> {
    path.file_name()
        .ok_or_else(|| MarkerError::Filesystem(format!("output path has no file name: {path}")))
}
