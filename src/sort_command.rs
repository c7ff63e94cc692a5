use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use anyhow::{anyhow, Context};
use command_executor::command::Command;

use crate::chunk_iterator::Batch;
use crate::outcome::Outcome;
use crate::sort::get_tl_config;
use crate::sorted_chunk_file::SortedChunkFile;
use crate::unmerged_chunk_file::write_line;

pub(crate) fn spill_file_name(sequence: usize) -> String {
    format!("chunk-{:06}.sorted", sequence)
}

/// Sorts one batch in memory and spills it to its own file in the scratch directory.
pub(crate) struct SortCommand {
    // taken by the worker, execute() only gets &self
    batch: Mutex<Option<Batch>>,
    scratch: PathBuf,
    outcome: Outcome,
}

impl SortCommand {
    pub(crate) fn new(batch: Batch, scratch: PathBuf, outcome: Outcome) -> SortCommand {
        SortCommand {
            batch: Mutex::new(Some(batch)),
            scratch,
            outcome,
        }
    }

    fn sort_and_spill(&self) -> Result<SortedChunkFile, anyhow::Error> {
        let config = get_tl_config()?;
        let batch = self.batch
            .lock()
            .map_err(|_| anyhow!("batch lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("batch already spilled"))?;
        let sequence = batch.sequence();
        log::debug!("Sorting batch {} with {} lines", sequence, batch.len());
        let mut records = batch.into_records();
        records.sort_unstable();

        let path = self.scratch.join(spill_file_name(sequence));
        let file = File::create(&path)
            .with_context(|| format!("path: {}", path.to_string_lossy()))?;
        let mut buf_writer = BufWriter::with_capacity(config.write_buffer_size(), file);
        for line_record in &records {
            write_line(&mut buf_writer, line_record)?;
        }
        buf_writer.flush()
            .with_context(|| format!("path: {}", path.to_string_lossy()))?;

        log::debug!(
            "Spilled batch {} with {} lines, thread: {}",
            sequence,
            records.len(),
            thread::current().name().unwrap_or("unnamed")
        );
        Ok(SortedChunkFile::new(path, sequence, records.len()))
    }
}

impl Command for SortCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if self.outcome.is_failed() {
            return Ok(());
        }
        if let Err(e) = self.sort_and_spill().and_then(|sorted_file| self.outcome.push(sorted_file)) {
            log::error!("Failed to sort batch, thread: {}, error: {:#}", thread::current().name().unwrap_or("unnamed"), e);
            self.outcome.fail(e);
        }
        Ok(())
    }
}
