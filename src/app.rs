use std::fs;
use std::thread::{self, ScopedJoinHandle};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::catalog::Catalog;
use crate::dispatch::{DispatchOptions, Dispatcher, RunSummary};
use crate::domain::GenomeId;
use crate::error::MarkerError;
use crate::progress::ProgressSink;
use crate::search::SearchTool;
use crate::selection::Selection;
use crate::store::{self, RemoteStore};
use crate::worker::{ItemReport, PipelineSettings, WorkerRunner};

#[derive(Debug, Clone)]
pub struct RunInputs {
    pub catalog: Catalog,
    pub catalog_path: Utf8PathBuf,
    pub model_path: Utf8PathBuf,
}

pub struct App<S: RemoteStore, T: SearchTool> {
    store: S,
    tool: T,
    settings: PipelineSettings,
    work_root: Utf8PathBuf,
}

impl<S: RemoteStore, T: SearchTool> App<S, T> {
    pub fn new(store: S, tool: T, settings: PipelineSettings, work_root: Utf8PathBuf) -> Self {
        Self {
            store,
            tool,
            settings,
            work_root,
        }
    }

    pub fn worker(&self) -> WorkerRunner<'_> {
        WorkerRunner::new(&self.store, &self.tool, &self.settings)
    }

    pub fn prepare(&self, scratch: &Utf8Path) -> Result<RunInputs, MarkerError> {
        let layout = &self.settings.layout;
        let retry = &self.settings.retry;
        let remote: &dyn RemoteStore = &self.store;
        let (catalog_path, model_path) = thread::scope(|scope| {
            let catalog = scope.spawn(|| store::download(remote, retry, &layout.catalog(), scratch));
            let model =
                scope.spawn(|| store::download(remote, retry, &layout.marker_model(), scratch));
            Ok::<_, MarkerError>((joined(catalog)?, joined(model)?))
        })?;
        let catalog = Catalog::load(catalog_path.as_std_path())?;
        info!(
            genomes = catalog.len(),
            marker_set = layout.marker_set(),
            "loaded catalog"
        );
        Ok(RunInputs {
            catalog,
            catalog_path,
            model_path,
        })
    }

    pub fn process(
        &self,
        selection: &str,
        options: &DispatchOptions,
    ) -> Result<RunSummary, MarkerError> {
        let selection: Selection = selection.parse()?;
        fs::create_dir_all(self.work_root.as_std_path())
            .map_err(|err| MarkerError::Filesystem(format!("create {}: {err}", self.work_root)))?;
        let scratch = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(self.work_root.as_std_path())
            .map_err(|err| MarkerError::Filesystem(err.to_string()))?;
        let scratch_path = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf())
            .map_err(|_| MarkerError::Filesystem("non-utf8 scratch directory".to_string()))?;

        let inputs = self.prepare(&scratch_path)?;
        let items = selection
            .resolve(&inputs.catalog)?
            .iter()
            .map(|genome| inputs.catalog.work_item(genome))
            .collect::<Result<Vec<_>, _>>()?;
        info!(selected = items.len(), "resolved genome selection");

        let summary = Dispatcher::new(self.worker(), self.work_root.clone()).dispatch(
            items,
            &inputs.model_path,
            options,
        );
        if options.debug {
            info!(path = %scratch_path, "keeping run scratch directory");
            let _ = scratch.keep();
        }
        Ok(summary)
    }

    pub fn run_item(
        &self,
        catalog_path: &Utf8Path,
        model_path: &Utf8Path,
        genome: &GenomeId,
        work_dir: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<ItemReport, MarkerError> {
        for (what, path) in [("catalog", catalog_path), ("marker model", model_path)] {
            if !path.as_std_path().is_file() {
                return Err(MarkerError::Filesystem(format!(
                    "{what} file does not exist: {path} (run-item is reserved for the dispatcher)"
                )));
            }
        }
        let catalog = Catalog::load(catalog_path.as_std_path())?;
        let item = catalog.work_item(genome)?;
        self.worker().run(&item, model_path, work_dir, sink)
    }
}

fn joined<T>(handle: ScopedJoinHandle<'_, Result<T, MarkerError>>) -> Result<T, MarkerError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(MarkerError::Filesystem("download thread panicked".to_string())))
}
