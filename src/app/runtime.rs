//! Command execution: config merge, storage and orchestrator setup.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use series_downloader::orchestrator::{
    AcquisitionObserver, AcquisitionPolicy, ListingPolicy, NoopObserver, Orchestrator, PageImagesPolicy,
};
use series_downloader::storage::{
    ObjectStorageConfig, StorageBackend, StorageBuilder, StorageMode, UnavailableBackend,
};
use series_downloader::StorageKind;
use series_downloader::fetch::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use series_downloader::{AcquisitionStatus, ExistenceLedger, HttpFetcher};

use crate::app::config::{FileConfig, load_file_config};
use crate::app::exit_handler::ProcessExit;
use crate::app::output;
use crate::app::progress::ProgressObserver;
use crate::app::terminal;
use crate::cli::{
    AcquireArgs, Cli, CollectionArgs, Command, ImagesArgs, InfoArgs, ListingArgs, ProgressArgs, StorageArg,
    StorageArgs,
};

/// Local storage root when neither the CLI nor the config names one.
const DEFAULT_OUTPUT_DIR: &str = "downloads";

pub(crate) async fn run(cli: Cli) -> Result<ProcessExit> {
    let file = load_file_config(cli.config.as_deref())?;
    debug!(?file, "file config loaded");
    match cli.command {
        Command::Collection(args) => run_collection(args, &file, cli.quiet).await,
        Command::Listing(args) => run_listing(args, &file, cli.quiet).await,
        Command::Progress(args) => run_progress(args, &file).await,
        Command::Info(args) => run_info(args, &file).await,
        Command::Images(args) => run_images(args, &file, cli.quiet).await,
    }
}

async fn run_collection(args: CollectionArgs, file: &FileConfig, quiet: bool) -> Result<ProcessExit> {
    let policy = acquisition_policy(&args.acquire, file);
    policy.validate()?;
    let storage = build_storage(&args.acquire.storage, file).await?;
    let progress = progress_observer(quiet, args.acquire.json);
    let orchestrator = build_orchestrator(storage, file, progress.clone())?;

    info!(url = %args.url, "acquiring collection");
    let result = orchestrator.acquire(&args.url, &policy).await;
    if let Some(progress) = &progress {
        progress.finish();
    }

    if args.acquire.json {
        output::print_json(&result)?;
    } else if !quiet {
        output::print_lines(&output::collection_summary_lines(&result));
    }
    Ok(ProcessExit::from(result.status))
}

async fn run_listing(args: ListingArgs, file: &FileConfig, quiet: bool) -> Result<ProcessExit> {
    let mut policy = ListingPolicy {
        collection: acquisition_policy(&args.acquire, file),
        max_collections: args.max_collections,
        ..ListingPolicy::default()
    };
    if let Some(concurrency) = args
        .collection_concurrency
        .map(usize::from)
        .or(file.collection_concurrency)
    {
        policy.collection_concurrency = concurrency;
    }
    if let Some(delay) = args.collection_delay.or(file.collection_delay_ms) {
        policy.inter_collection_delay = Duration::from_millis(delay);
    }
    policy.validate()?;

    let storage = build_storage(&args.acquire.storage, file).await?;
    let progress = progress_observer(quiet, args.acquire.json);
    let orchestrator = build_orchestrator(storage, file, progress.clone())?;

    info!(url = %args.url, "acquiring listing");
    let result = orchestrator.acquire_listing(&args.url, &policy).await;
    if let Some(progress) = &progress {
        progress.finish();
    }

    if args.acquire.json {
        output::print_json(&result)?;
    } else if !quiet {
        output::print_lines(&output::listing_summary_lines(&result));
    }
    Ok(ProcessExit::from(result.status))
}

async fn run_progress(args: ProgressArgs, file: &FileConfig) -> Result<ProcessExit> {
    let storage = build_storage(&args.storage, file).await?;
    let ledger = ExistenceLedger::new(storage);
    let summary = ledger
        .progress(&args.collection)
        .await
        .with_context(|| format!("Failed to read progress of '{}'", args.collection))?;

    if args.json {
        output::print_json(&summary)?;
    } else {
        output::print_lines(&output::progress_summary_lines(&args.collection, &summary));
    }
    let status = if summary.total_members > 0 {
        AcquisitionStatus::Success
    } else {
        AcquisitionStatus::Failed
    };
    Ok(ProcessExit::from(status))
}

async fn run_info(args: InfoArgs, file: &FileConfig) -> Result<ProcessExit> {
    let storage: Arc<dyn StorageBackend> =
        Arc::new(UnavailableBackend::new(StorageKind::Local, "info never stores items"));
    let orchestrator = build_orchestrator(storage, file, None)?;

    info!(url = %args.url, "previewing collection");
    let preview = orchestrator.preview(&args.url, &args.headers).await?;
    if args.json {
        output::print_json(&preview)?;
    } else {
        output::print_lines(&output::preview_lines(&preview, args.limit));
    }
    let status = if preview.total_members > 0 {
        AcquisitionStatus::Success
    } else {
        AcquisitionStatus::Failed
    };
    Ok(ProcessExit::from(status))
}

async fn run_images(args: ImagesArgs, file: &FileConfig, quiet: bool) -> Result<ProcessExit> {
    let policy = images_policy(&args, file);
    policy.validate()?;
    let storage = build_storage(&args.storage, file).await?;
    let orchestrator = build_orchestrator(storage, file, None)?;

    info!(url = %args.url, "collecting page images");
    let result = orchestrator.acquire_page_images(&args.url, &policy).await;
    if args.json {
        output::print_json(&result)?;
    } else if !quiet {
        output::print_lines(&output::page_images_lines(&result));
    }
    Ok(ProcessExit::from(result.status))
}

/// Merges image-page flags over file config over built-in defaults.
pub(crate) fn images_policy(args: &ImagesArgs, file: &FileConfig) -> PageImagesPolicy {
    let defaults = PageImagesPolicy::default();
    PageImagesPolicy {
        max_images: args.max_images.or(defaults.max_images),
        include_inline: !args.no_inline,
        use_browser: args.browser,
        concurrency: args.concurrency.map_or(defaults.concurrency, usize::from),
        inter_item_delay: args
            .item_delay
            .or(file.item_delay_ms)
            .map_or(defaults.inter_item_delay, Duration::from_millis),
        custom_headers: args.headers.clone(),
    }
}

/// Merges CLI flags over file config over built-in defaults.
pub(crate) fn acquisition_policy(args: &AcquireArgs, file: &FileConfig) -> AcquisitionPolicy {
    let defaults = AcquisitionPolicy::default();
    AcquisitionPolicy {
        start: args.start,
        end: args.end,
        max_members: args.max_members,
        max_items_per_member: args.max_items,
        inter_item_delay: args
            .item_delay
            .or(file.item_delay_ms)
            .map_or(defaults.inter_item_delay, Duration::from_millis),
        inter_member_delay: args
            .member_delay
            .or(file.member_delay_ms)
            .map_or(defaults.inter_member_delay, Duration::from_millis),
        member_concurrency: args
            .member_concurrency
            .map(usize::from)
            .or(file.member_concurrency)
            .unwrap_or(defaults.member_concurrency),
        revalidate_members: args.revalidate,
        custom_headers: args.headers.clone(),
    }
}

/// Resolves the storage mode from CLI and file config.
pub(crate) fn storage_mode(args: &StorageArgs, file: &FileConfig) -> Result<StorageMode> {
    let kind = args
        .storage
        .or(file.storage.map(StorageArg::from))
        .unwrap_or(StorageArg::Local);
    match kind {
        StorageArg::Local => {
            let root = args
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
            Ok(StorageMode::Filesystem { root })
        }
        StorageArg::Object => {
            let config = ObjectStorageConfig::from_env().context("Object storage is not configured")?;
            Ok(StorageMode::Object(config))
        }
    }
}

async fn build_storage(args: &StorageArgs, file: &FileConfig) -> Result<Arc<dyn StorageBackend>> {
    let mode = storage_mode(args, file)?;
    Ok(StorageBuilder::new(mode).build().await)
}

fn progress_observer(quiet: bool, json: bool) -> Option<Arc<ProgressObserver>> {
    let use_bar = terminal::should_use_progress_bar(
        std::io::stderr().is_terminal(),
        quiet,
        json,
        terminal::is_dumb_terminal(),
    );
    use_bar.then(|| Arc::new(ProgressObserver::new()))
}

fn build_orchestrator(
    storage: Arc<dyn StorageBackend>,
    file: &FileConfig,
    progress: Option<Arc<ProgressObserver>>,
) -> Result<Orchestrator> {
    let observer: Arc<dyn AcquisitionObserver> = match progress {
        Some(progress) => progress,
        None => Arc::new(NoopObserver),
    };
    let mut builder = Orchestrator::builder(storage).observer(observer);
    if file.connect_timeout_secs.is_some() || file.read_timeout_secs.is_some() {
        let fetcher = HttpFetcher::with_timeouts(
            file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
        )
        .context("Failed to build HTTP client")?;
        builder = builder.fetcher(Arc::new(fetcher));
    }
    if let Some(template) = &file.endpoint_template {
        builder = builder.endpoint_template(template.clone());
    }
    if let Some(max_interactions) = file.max_interactions {
        builder = builder.max_interactions(max_interactions);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_cli_overrides_file() {
        let file = FileConfig {
            member_concurrency: Some(3),
            item_delay_ms: Some(100),
            member_delay_ms: Some(0),
            ..FileConfig::default()
        };
        let args = AcquireArgs {
            member_concurrency: Some(5),
            ..AcquireArgs::default()
        };
        let policy = acquisition_policy(&args, &file);
        assert_eq!(policy.member_concurrency, 5);
        assert_eq!(policy.inter_item_delay, Duration::from_millis(100));
        assert_eq!(policy.inter_member_delay, Duration::ZERO);
    }

    #[test]
    fn test_policy_defaults_without_config() {
        let policy = acquisition_policy(&AcquireArgs::default(), &FileConfig::default());
        assert_eq!(policy, AcquisitionPolicy::default());
    }

    #[test]
    fn test_images_policy_merges_flags() {
        let args = ImagesArgs {
            url: "https://s.test/gallery".to_string(),
            max_images: Some(0),
            no_inline: true,
            browser: false,
            concurrency: Some(2),
            item_delay: None,
            headers: Vec::new(),
            json: false,
            storage: StorageArgs::default(),
        };
        let file = FileConfig {
            item_delay_ms: Some(40),
            ..FileConfig::default()
        };
        let policy = images_policy(&args, &file);
        assert_eq!(policy.image_limit(), None);
        assert!(!policy.include_inline);
        assert_eq!(policy.concurrency, 2);
        assert_eq!(policy.inter_item_delay, Duration::from_millis(40));

        let args = ImagesArgs {
            max_images: None,
            no_inline: false,
            concurrency: None,
            ..args
        };
        let policy = images_policy(&args, &FileConfig::default());
        assert_eq!(policy, PageImagesPolicy::default());
    }

    #[test]
    fn test_storage_mode_local_root_priority() {
        let file = FileConfig {
            output_dir: Some(PathBuf::from("/srv/file")),
            ..FileConfig::default()
        };
        let mode = storage_mode(&StorageArgs::default(), &file).unwrap();
        assert_eq!(mode, StorageMode::Filesystem { root: PathBuf::from("/srv/file") });

        let args = StorageArgs {
            storage: None,
            output_dir: Some(PathBuf::from("/srv/cli")),
        };
        let mode = storage_mode(&args, &file).unwrap();
        assert_eq!(mode, StorageMode::Filesystem { root: PathBuf::from("/srv/cli") });

        let mode = storage_mode(&StorageArgs::default(), &FileConfig::default()).unwrap();
        assert_eq!(mode, StorageMode::Filesystem { root: PathBuf::from(DEFAULT_OUTPUT_DIR) });
    }
}
