use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{anyhow, Context};

use crate::line_record::{read_record, skip_byte_order_mark, LineRecord};

/// Lines taken from the input in one go, waiting to be sorted and spilled.
#[derive(Debug)]
pub(crate) struct Batch {
    sequence: usize,
    records: Vec<LineRecord>,
}

impl Batch {
    pub(crate) fn new(sequence: usize, records: Vec<LineRecord>) -> Batch {
        Batch {
            sequence,
            records,
        }
    }

    pub(crate) fn sequence(&self) -> usize {
        self.sequence
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn into_records(self) -> Vec<LineRecord> {
        self.records
    }
}

/// Reads an input sequentially and yields batches of at most `max_lines` non blank lines.
///
/// Only the batch being filled is held in memory. The iterator stops after the first error.
pub(crate) struct ChunkIterator<R: BufRead> {
    name: String,
    reader: R,
    max_lines: usize,
    sequence: usize,
    lines_read: u64,
    started: bool,
    done: bool,
}

impl ChunkIterator<BufReader<File>> {
    pub(crate) fn open(path: &PathBuf, max_lines: usize, first_sequence: usize, buffer_size: usize) -> Result<Self, anyhow::Error> {
        let file = File::open(path)
            .with_context(|| anyhow!("path: {}", path.display()))?;
        Ok(
            ChunkIterator::new(
                path.display().to_string(),
                BufReader::with_capacity(buffer_size, file),
                max_lines,
                first_sequence,
            )
        )
    }
}

impl<R: BufRead> ChunkIterator<R> {
    pub(crate) fn new(name: String, reader: R, max_lines: usize, first_sequence: usize) -> ChunkIterator<R> {
        ChunkIterator {
            name,
            reader,
            max_lines,
            sequence: first_sequence,
            lines_read: 0,
            started: false,
            done: false,
        }
    }

    /// Sequence number the next batch will get
    pub(crate) fn next_sequence(&self) -> usize {
        self.sequence
    }

    fn fill(&mut self) -> Result<Vec<LineRecord>, anyhow::Error> {
        if !self.started {
            self.started = true;
            skip_byte_order_mark(&mut self.reader)
                .with_context(|| anyhow!("path: {}", self.name))?;
        }
        let mut records = Vec::new();
        while records.len() < self.max_lines {
            match read_record(&mut self.reader, &mut self.lines_read)
                .with_context(|| anyhow!("path: {}", self.name))? {
                Some(record) => records.push(record),
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        Ok(records)
    }
}

impl<R: BufRead> Iterator for ChunkIterator<R> {
    type Item = Result<Batch, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill() {
            Ok(records) if records.is_empty() => None,
            Ok(records) => {
                let batch = Batch::new(self.sequence, records);
                self.sequence += 1;
                Some(Ok(batch))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
