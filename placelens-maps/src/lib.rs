//! Maps-search scraping: paged fetching, aggregation across queries and
//! `place_id` deduplication.
//!
//! The [`aggregate::Aggregator`] only knows about the [`aggregate::PageSource`]
//! trait. [`serpapi::SerpApiMaps`] is the production source; tests plug in
//! scripted fakes.
pub mod aggregate;
pub mod dedup;
pub mod record;
pub mod serpapi;

pub use aggregate::{
    AggregateReport, Aggregator, AggregatorConfig, Page, PageSource, QueryReport, StopReason,
};
pub use dedup::{DedupReport, dedup_by_place_id};
pub use record::{ResultRecord, ResultSet, SearchQuery};
pub use serpapi::SerpApiMaps;
