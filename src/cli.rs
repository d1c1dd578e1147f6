//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Incrementally download image series (collections of chapters).
///
/// Re-running a command only fetches what storage does not hold yet.
#[derive(Parser, Debug)]
#[command(name = "series-downloader")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/series-downloader/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download one collection (series)
    Collection(CollectionArgs),
    /// Download every collection linked from a listing page
    Listing(ListingArgs),
    /// Show what a collection's progress record holds
    Progress(ProgressArgs),
    /// Show a collection's title and members without downloading anything
    Info(InfoArgs),
    /// Download every image shown on a single web page
    Images(ImagesArgs),
}

/// Where items are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageArg {
    /// Local directory tree
    Local,
    /// S3-compatible bucket (credentials from the environment)
    Object,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StorageArgs {
    /// Storage backend
    #[arg(long, value_enum)]
    pub storage: Option<StorageArg>,

    /// Root directory for local storage
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AcquireArgs {
    /// First member (chapter) number to download
    #[arg(long)]
    pub start: Option<f64>,

    /// Last member (chapter) number to download
    #[arg(long)]
    pub end: Option<f64>,

    /// Maximum members per collection (0 for no limit)
    #[arg(long)]
    pub max_members: Option<usize>,

    /// Maximum items per member (0 for no limit)
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Members downloaded at once (1-16)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub member_concurrency: Option<u8>,

    /// Minimum delay between item requests to the same host in milliseconds (max 60000)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub item_delay: Option<u64>,

    /// Delay before each member that needs network access in milliseconds (max 60000)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub member_delay: Option<u64>,

    /// Re-check members that already exist and fetch only missing items
    #[arg(long)]
    pub revalidate: bool,

    /// Extra request header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CollectionArgs {
    /// Collection page URL
    pub url: String,

    #[command(flatten)]
    pub acquire: AcquireArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ListingArgs {
    /// Listing page URL
    pub url: String,

    /// Maximum collections taken from the listing (0 for no limit)
    #[arg(long)]
    pub max_collections: Option<usize>,

    /// Collections downloaded at once (1-16)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub collection_concurrency: Option<u8>,

    /// Delay between collection starts in milliseconds (max 600000)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub collection_delay: Option<u64>,

    #[command(flatten)]
    pub acquire: AcquireArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProgressArgs {
    /// Collection key (the sanitized title used as the storage folder)
    pub collection: String,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// Collection page URL
    pub url: String,

    /// Members listed in the text output (0 for all)
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Extra request header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Print the preview as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImagesArgs {
    /// Web page URL
    pub url: String,

    /// Maximum images stored (0 for no limit)
    #[arg(long)]
    pub max_images: Option<usize>,

    /// Skip images embedded in the page as data: URIs
    #[arg(long)]
    pub no_inline: bool,

    /// Also render the page in headless Chromium to catch script-loaded images
    #[arg(long)]
    pub browser: bool,

    /// Images downloaded at once (1-16)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Minimum delay between image requests to the same host in milliseconds (max 60000)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub item_delay: Option<u64>,

    /// Extra request header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub storage: StorageArgs,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
