//! Command-line interface for cms-push: argument parsing and orchestration.
//!
//! All pipeline logic lives in `cms-push-core`. This module only maps flags
//! onto [`UploadFolderOptions`], builds the HTTP client and reports the
//! outcome of a run.
//!
//! For programmatic use (integration tests), call [`run`] with a constructed [`Cli`].
use crate::load_config::load_config;
use crate::upload::CmsClient;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cms_push_core::{
    has_upload_errors, upload_folder, BuildMode, NodeFieldsTransformer, UploadOutcome,
    UploadPool, UploadStatus,
};
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for cms-push: upload a local folder of theme assets to a remote content store.
#[derive(Parser)]
#[clap(
    name = "cms-push",
    version,
    about = "Upload a local folder of templates, modules and assets to a remote content store"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every eligible file below SRC to DEST
    Upload {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Local folder to upload
        src: PathBuf,
        /// Destination path in the remote store
        dest: String,
        /// Build mode applied to every uploaded file
        #[clap(long, value_enum)]
        mode: Option<ModeArg>,
        /// Upload fields.js as-is instead of converting it to fields.json
        #[clap(long)]
        no_convert_fields: bool,
        /// Keep generated fields.json files next to their fields.js
        #[clap(long)]
        save_output: bool,
        /// Comma separated options passed to exported fields functions
        #[clap(long, value_delimiter = ',')]
        field_options: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Draft,
    Publish,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Draft => BuildMode::Draft,
            ModeArg::Publish => BuildMode::Publish,
        }
    }
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Upload {
            config,
            src,
            dest,
            mode,
            no_convert_fields,
            save_output,
            field_options,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "upload", src = %src.display(), dest = %dest, "Starting upload");

            let mut options = config.upload.clone();
            if no_convert_fields {
                options.convert_fields = false;
            }
            if save_output {
                options.save_output = true;
            }
            if !field_options.is_empty() {
                options.field_options = field_options;
            }
            options.query.build_mode = mode.map(BuildMode::from);
            options.trace_loaded();

            let client = Arc::new(CmsClient::from_config(&config)?);
            let pool = UploadPool::new(config.concurrency);
            let transformer = NodeFieldsTransformer::new(config.node_binary.clone());

            let outcomes = upload_folder(
                client,
                &transformer,
                &pool,
                config.account_id,
                &src,
                &dest,
                &options,
            )
            .await
            .map_err(|e| {
                tracing::error!(command = "upload", error = %e, "Upload aborted");
                anyhow::Error::new(e).context("Upload aborted")
            })?;

            print_report(&src, &dest, &outcomes);
            if has_upload_errors(&outcomes) {
                let failed = outcomes
                    .iter()
                    .filter(|outcome| outcome.status == UploadStatus::Failure)
                    .count();
                anyhow::bail!("{failed} file(s) failed to upload after retrying");
            }
            tracing::info!(command = "upload", "Upload complete");
            Ok(())
        }
    }
}

fn print_report(src: &std::path::Path, dest: &str, outcomes: &[UploadOutcome]) {
    if outcomes.is_empty() {
        println!("Uploaded {} to {dest}", src.display());
        return;
    }
    println!("Retried {} file(s):", outcomes.len());
    for outcome in outcomes {
        match (&outcome.status, &outcome.error) {
            (UploadStatus::Failure, Some(error)) => {
                eprintln!("  failed    {} ({error})", outcome.file.display())
            }
            (UploadStatus::Failure, None) => eprintln!("  failed    {}", outcome.file.display()),
            (UploadStatus::Success, _) => println!("  uploaded  {}", outcome.file.display()),
        }
    }
}
