use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "placelens", version)]
#[command(about = "Collect map listings and rate how their websites look", long_about = None)]
pub struct Cli {
    /// YAML config file (default: ./placelens.yaml when present)
    #[arg(short, long, global = true, env = "PLACELENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Labels {
    /// Modern / Acceptable / Outdated
    Modernity,
    /// Beautiful / Passable / Ugly
    Beauty,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Page through the maps search API for every query and export the listings
    Scrape {
        /// CSV with `keyword` and `location` columns
        #[arg(short, long, default_value = "search_queries.csv")]
        queries: PathBuf,

        /// Deduplicated results CSV
        #[arg(short, long, default_value = "google_maps_results.csv")]
        output: PathBuf,

        /// Stop each query after this many pages
        #[arg(long)]
        max_pages: Option<u32>,

        /// Queries in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Screenshot each listed website and classify its look
    Analyze {
        /// Results CSV with a `website` column
        #[arg(short, long, default_value = "google_maps_results.csv")]
        input: PathBuf,

        /// Results CSV with the verdict columns appended
        #[arg(short, long, default_value = "google_maps_results_analyzed.csv")]
        output: PathBuf,

        /// Process only the first N rows
        #[arg(short, long)]
        limit: Option<usize>,

        /// Label set the model chooses from
        #[arg(long, value_enum)]
        labels: Option<Labels>,

        /// Rows in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Where screenshots are written
        #[arg(long)]
        screenshots_dir: Option<PathBuf>,
    },

    /// Sort a JSON export's `items` by a numeric field
    SortJson {
        /// JSON document with an `items` array
        input: PathBuf,

        /// Numeric field to sort on; missing counts as 0
        #[arg(short, long, default_value = "playCount")]
        key: String,

        #[arg(long)]
        ascending: bool,

        /// Keep only the first N after sorting
        #[arg(short, long)]
        top: Option<usize>,

        /// Write one top-N file per rung instead (e.g. 10,25,50,100,250)
        #[arg(long, num_args = 0..=1, default_missing_value = "10,25,50,100,250")]
        ladder: Option<String>,

        #[arg(long, default_value = "content/top-")]
        prefix: String,

        #[arg(long, default_value = "-tt.json")]
        suffix: String,

        /// Output file (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
