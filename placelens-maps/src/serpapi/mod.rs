//! SerpApi `google_maps` engine.
//!
//! `GET {endpoint}/search.json?engine=google_maps&q=..&type=search&start=N&api_key=..`
//! returns `local_results` and, when more pages exist, a
//! `serpapi_pagination.next` URL carrying the next `start`.
pub mod client;
pub mod types;

pub use client::SerpApiMaps;
