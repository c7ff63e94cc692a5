use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use command_executor::command::Command;

use crate::outcome::Outcome;
use crate::sort::get_tl_config;
use crate::sorted_chunk_file::SortedChunkFile;
use crate::unmerged_chunk_file::merge_files;

pub(crate) fn merge_file_name(pass: usize, group: usize) -> String {
    format!("merge-{:03}-{:06}.sorted", pass, group)
}

/// Merges one group of sorted files into a single sorted file. Scratch files of the group
/// are removed once merged.
pub(crate) struct MergeCommand {
    sequence: usize,
    group: Vec<SortedChunkFile>,
    target: PathBuf,
    outcome: Outcome,
}

impl MergeCommand {
    pub(crate) fn new(sequence: usize, group: Vec<SortedChunkFile>, target: PathBuf, outcome: Outcome) -> MergeCommand {
        MergeCommand {
            sequence,
            group,
            target,
            outcome,
        }
    }

    fn merge_group(&self) -> Result<SortedChunkFile, anyhow::Error> {
        let config = get_tl_config()?;
        let paths: Vec<PathBuf> = self.group.iter().map(|f| f.path().clone()).collect();
        let merged_len = merge_files(&paths, &self.target, config.read_buffer_size(), config.write_buffer_size())?;

        for merged in self.group.iter().filter(|f| f.owned()) {
            std::fs::remove_file(merged.path())
                .with_context(|| format!("path: {}", merged.path().to_string_lossy()))?;
        }

        log::debug!(
            "Merged {} files into {}, lines: {}, thread: {}",
            paths.len(),
            self.target.to_string_lossy(),
            merged_len,
            thread::current().name().unwrap_or("unnamed")
        );
        Ok(SortedChunkFile::new(self.target.clone(), self.sequence, merged_len))
    }
}

impl Command for MergeCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if self.outcome.is_failed() {
            return Ok(());
        }
        if let Err(e) = self.merge_group().and_then(|sorted_file| self.outcome.push(sorted_file)) {
            log::error!("Failed to merge group {}, thread: {}, error: {:#}", self.sequence, thread::current().name().unwrap_or("unnamed"), e);
            self.outcome.fail(e);
        }
        Ok(())
    }
}
