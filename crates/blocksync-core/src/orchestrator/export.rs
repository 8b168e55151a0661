//! Environment -> file tree

use std::path::Path;

use blocksync_fs::{NormalizedPath, compute_content_checksum, io};
use tracing::{Instrument, debug, info, info_span, warn};

use super::{
    BatchOrchestrator, BatchResult, BatchRun, ExportOptions, ItemFailure, ItemOutcome,
    ProgressObserver, Step, export_root, processing_order,
};
use crate::descriptor::ArtifactDescriptor;
use crate::environment::Capability;
use crate::identity;
use crate::manifest::Manifest;
use crate::version::VersionHint;
use crate::{Error, Result};

impl BatchOrchestrator {
    /// Export `selection` into the tree under `root`.
    ///
    /// `root` is created if missing. Per-item problems end up in the
    /// returned [`BatchResult`]; an `Err` means the batch could not run or
    /// lost its session.
    pub async fn export_batch(
        &self,
        root: impl AsRef<Path>,
        selection: &[ArtifactDescriptor],
        options: &ExportOptions,
        progress: Option<&dyn ProgressObserver>,
    ) -> Result<BatchResult> {
        let root = export_root(root.as_ref())?;
        let items = processing_order(selection);
        let span = info_span!("export_batch", root = %root, items = items.len());
        self.run_export(root, items, options, progress)
            .instrument(span)
            .await
    }

    async fn run_export(
        &self,
        root: NormalizedPath,
        items: Vec<ArtifactDescriptor>,
        options: &ExportOptions,
        progress: Option<&dyn ProgressObserver>,
    ) -> Result<BatchResult> {
        let environment_version = self
            .session
            .with_environment(None, |env| env.version())
            .await?;

        let mut manifest = Manifest::load(&root);
        if !manifest.is_compatible_with(&environment_version) {
            warn!(
                manifest_tool = manifest.tool_version(),
                manifest_environment = manifest.environment_version().unwrap_or("unknown"),
                environment = %environment_version,
                "manifest written by an incompatible run, every item will be rewritten"
            );
            manifest.invalidate_hashes();
        }
        manifest.set_environment_version(&environment_version);

        info!(
            normalize = options.normalize,
            incremental = options.incremental,
            "export started"
        );

        let mut run = BatchRun::new(items.len(), progress);
        let mut fatal = None;
        for (index, descriptor) in items.iter().enumerate() {
            if options.cancellation.is_cancelled() {
                run.cancel_remaining(index);
                break;
            }
            let outcome = self
                .export_item(&root, descriptor, options, &mut manifest)
                .await;
            match run.settle(index, descriptor, outcome) {
                Step::Continue => {}
                Step::Stop => break,
                Step::Abort(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        run.result.record_pruned(manifest.prune_missing(&root));
        let saved = manifest.save(&root, options.robustness);
        if let Some(e) = fatal {
            if let Err(save_error) = saved {
                warn!(error = %save_error, "manifest could not be saved after session loss");
            }
            return Err(e);
        }
        saved?;
        VersionHint::current(&environment_version).write(&root, options.robustness)?;

        info!(result = %run.result, "export finished");
        Ok(run.result)
    }

    async fn export_item(
        &self,
        root: &NormalizedPath,
        descriptor: &ArtifactDescriptor,
        options: &ExportOptions,
        manifest: &mut Manifest,
    ) -> std::result::Result<ItemOutcome, ItemFailure> {
        let relative = identity::relative_file_path(descriptor);
        let path = root.join(&relative);

        let target = descriptor.clone();
        let read = self
            .session
            .with_environment(Some(options.cancellation.clone()), move |env| {
                env.read(&target)
            })
            .await??;
        let raw = match read {
            Capability::Found(raw) => raw,
            Capability::NotSupported(reason) => return Err(ItemFailure::Warning(reason)),
        };

        let content = if options.normalize {
            options.normalizer.normalize(&raw).map_err(Error::from)?
        } else {
            raw
        };
        let hash = compute_content_checksum(&content);

        if options.incremental && manifest.is_unchanged(&relative, &hash) && path.is_file() {
            debug!(path = %relative, "unchanged, skipping");
            return Ok(ItemOutcome::Skipped);
        }

        io::write_atomic(&path, content.as_bytes(), options.robustness).map_err(Error::from)?;
        debug!(path = %relative, %hash, "exported");
        manifest.record(relative, hash);
        Ok(ItemOutcome::Exported)
    }
}
