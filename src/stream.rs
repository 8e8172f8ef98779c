use crate::config::{PROGRESS_INTERVAL, READER_BUFFER_SIZE, WRITER_BUFFER_SIZE};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;

pub fn open_stream(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open stream: {:?}", path))?;
    Ok(BufReader::with_capacity(READER_BUFFER_SIZE, file))
}

pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    Ok(BufWriter::with_capacity(WRITER_BUFFER_SIZE, file))
}

/// Calls `f` for every line of `reader` (without the line terminator), reusing one buffer.
///
/// Returns the number of lines read. Empty lines are passed through; callers count them
/// as malformed like any other unparsable line.
pub fn for_each_line<R, F>(mut reader: R, label: &str, mut f: F) -> Result<u64>
where
    R: BufRead,
    F: FnMut(&str) -> Result<()>,
{
    let pb = ProgressBar::new_spinner();
    let mut line = String::with_capacity(256);
    let mut count = 0u64;

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .with_context(|| format!("Failed to read {} line {}", label, count + 1))?;
        if read == 0 {
            break;
        }

        f(line.trim_end_matches(['\n', '\r']))?;

        count += 1;
        if count % PROGRESS_INTERVAL == 0 {
            pb.set_message(format!("{} {}", count, label));
            pb.tick();
        }
    }

    pb.finish_and_clear();
    Ok(count)
}
