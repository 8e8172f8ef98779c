/// Only pages in this namespace (main/article) are extracted
pub const TARGET_NAMESPACE: i32 = 0;

/// Capacity of the record channel between the XML reader and the record processor
pub const CHANNEL_CAPACITY: usize = 1_000_000;

/// Field delimiter used by every intermediate line-oriented stream
pub const FIELD_DELIMITER: &str = "<|>";

/// Progress update interval (tick every N pages or lines)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Buffer size for stream and CSV writers
pub const WRITER_BUFFER_SIZE: usize = 128 * 1024;

/// Buffer size for stream readers in the resolution passes
pub const READER_BUFFER_SIZE: usize = 256 * 1024;

/// Number of link lines resolved per parallel batch
pub const RESOLVE_BATCH_SIZE: usize = 100_000;

/// Pre-sized capacity for the page index (~7M articles in enwiki)
pub const EXPECTED_PAGES: usize = 8_000_000;

/// Pre-sized capacity for the redirect map (~11M redirects in enwiki)
pub const EXPECTED_REDIRECTS: usize = 12_000_000;

pub const PAGES_FILE: &str = "pages.txt";
pub const RAW_REDIRECTS_FILE: &str = "temp_redirects.txt";
pub const RAW_LINKS_FILE: &str = "temp_links.txt";
pub const REDIRECTS_FILE: &str = "redirects.txt";
pub const NODES_FILE: &str = "nodes.csv";
pub const EDGES_FILE: &str = "edges.csv";
pub const SUMMARY_FILE: &str = "summary.json";
