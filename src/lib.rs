//! Ariadne: Wikipedia dump link-graph extraction
//!
//! This crate turns a Wikipedia XML dump into a directed graph of article pages and the
//! wiki links between them, in two passes:
//!
//! 1. **Extraction Pass** -- Stream the (optionally BZ2-compressed) dump, keep namespace-0
//!    pages, and write three line-oriented intermediate streams: pages, raw redirects and
//!    raw links. A dedicated reader thread feeds a bounded channel drained by a single
//!    record processor that owns all three writers.
//! 2. **Resolution Pass** -- Build an in-memory page index from the pages stream, resolve
//!    redirect targets against it, then resolve every raw link to a page id (following at
//!    most one redirect) and write `nodes.csv` / `edges.csv`.
//!
//! # Architecture
//!
//! - **Streaming XML parsing** -- Never loads the full dump into memory
//! - **Backpressure** -- The reader blocks when the channel is full
//! - **Read-only indexes** -- Built once, then shared across rayon workers for link resolution
//! - **Atomic operations** -- Lock-free counters for high-frequency statistics
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML reader with BZ2 decompression
//! - [`content`] -- Redirect and wiki-link pattern extraction
//! - [`extract`] -- Reader/processor pipeline producing the intermediate streams
//! - [`normalize`] -- Canonical form of raw link and redirect targets
//! - [`index`] -- Title/id page index with case-insensitive lookup
//! - [`resolve`] -- Redirect map, link resolution and graph output
//! - [`stream`] -- Buffered line-stream helpers shared by the resolution passes
//! - [`models`] -- Record types and intermediate line format
//! - [`stats`] -- Thread-safe atomic counters and the run summary
//! - [`config`] -- Constants and file names
//!
//! # Example Usage
//!
//! ```bash
//! # Extract the intermediate streams
//! ariadne extract -i enwiki-latest-pages-articles.xml.bz2 -o output/
//!
//! # Resolve redirects and links into nodes.csv / edges.csv
//! ariadne resolve -o output/
//!
//! # Or both in one go
//! ariadne run -i enwiki-latest-pages-articles.xml.bz2 -o output/
//! ```

pub mod config;
pub mod content;
pub mod extract;
pub mod index;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod resolve;
pub mod stats;
pub mod stream;
