//! File tree -> environment

use std::path::Path;

use blocksync_fs::{NormalizedPath, io};
use tracing::{Instrument, debug, info, info_span, warn};

use super::{
    BatchOrchestrator, BatchResult, BatchRun, ImportOptions, ItemFailure, ItemOutcome,
    ProgressObserver, Step, import_root, processing_order,
};
use crate::descriptor::ArtifactDescriptor;
use crate::environment::{Capability, Environment, EnvironmentResult};
use crate::identity;
use crate::version::VersionHint;
use crate::{Error, Result};

impl BatchOrchestrator {
    /// Import the files for `selection` from `root` into the open project.
    ///
    /// Each file is read from the same location export writes it to.
    /// Containers and groups must already exist in the project; nothing
    /// above the artifact itself is created.
    pub async fn import_batch(
        &self,
        root: impl AsRef<Path>,
        selection: &[ArtifactDescriptor],
        options: &ImportOptions,
        progress: Option<&dyn ProgressObserver>,
    ) -> Result<BatchResult> {
        let root = import_root(root.as_ref())?;
        let items = processing_order(selection);
        let span = info_span!("import_batch", root = %root, items = items.len());
        self.run_import(root, items, options, progress)
            .instrument(span)
            .await
    }

    async fn run_import(
        &self,
        root: NormalizedPath,
        items: Vec<ArtifactDescriptor>,
        options: &ImportOptions,
        progress: Option<&dyn ProgressObserver>,
    ) -> Result<BatchResult> {
        let environment_version = self
            .session
            .with_environment(None, |env| env.version())
            .await?;

        let mut run = BatchRun::new(items.len(), progress);
        match VersionHint::read(&root) {
            Some(hint) if !hint.matches_environment(&environment_version) => {
                warn!(
                    exported_with = %hint.environment,
                    attached = %environment_version,
                    "tree was exported under a different environment version"
                );
                run.result.flag_environment_mismatch();
            }
            Some(_) => {}
            None => debug!("no version hint under root"),
        }

        info!("import started");
        for (index, descriptor) in items.iter().enumerate() {
            if options.cancellation.is_cancelled() {
                run.cancel_remaining(index);
                break;
            }
            let outcome = self.import_item(&root, descriptor, options).await;
            match run.settle(index, descriptor, outcome) {
                Step::Continue => {}
                Step::Stop => break,
                Step::Abort(e) => return Err(e),
            }
        }

        info!(result = %run.result, "import finished");
        Ok(run.result)
    }

    async fn import_item(
        &self,
        root: &NormalizedPath,
        descriptor: &ArtifactDescriptor,
        options: &ImportOptions,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        let path = identity::output_path(root, descriptor);
        if !path.is_file() {
            return Err(ItemFailure::Error(format!(
                "file not found: {}",
                identity::relative_file_path(descriptor)
            )));
        }
        let content = io::read_text(&path).map_err(Error::from)?;

        let target = descriptor.clone();
        let written = self
            .session
            .with_environment(
                Some(options.cancellation.clone()),
                move |env: &mut dyn Environment| -> EnvironmentResult<Capability<()>> {
                    let container = env.resolve_container(target.container())?;
                    let group = env.resolve_group(&container, target.group())?;
                    env.write(&group, &target, &content)
                },
            )
            .await??;

        match written {
            Capability::Found(()) => {
                debug!(artifact = %descriptor, "imported");
                Ok(ItemOutcome::Imported)
            }
            Capability::NotSupported(reason) => Err(ItemFailure::Warning(reason)),
        }
    }
}
