use std::cmp::Ordering;
use std::path::PathBuf;

/// A file whose lines are sorted by key: a spill file, a merge result or a caller provided
/// sorted input.
#[derive(Debug, Clone)]
pub(crate) struct SortedChunkFile {
    path: PathBuf,
    sequence: usize,
    lines: usize,
    // owned files live in the scratch directory and may be removed or renamed
    owned: bool,
}

impl SortedChunkFile {
    pub(crate) fn new(path: PathBuf, sequence: usize, lines: usize) -> SortedChunkFile {
        SortedChunkFile {
            path,
            sequence,
            lines,
            owned: true,
        }
    }

    pub(crate) fn borrowed(path: PathBuf, sequence: usize) -> SortedChunkFile {
        SortedChunkFile {
            path,
            sequence,
            lines: 0,
            owned: false,
        }
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn sequence(&self) -> usize {
        self.sequence
    }

    pub(crate) fn lines(&self) -> usize {
        self.lines
    }

    pub(crate) fn owned(&self) -> bool {
        self.owned
    }

    pub(crate) fn with_sequence(mut self, sequence: usize) -> SortedChunkFile {
        self.sequence = sequence;
        self
    }
}

impl Eq for SortedChunkFile {}

impl PartialEq<Self> for SortedChunkFile {
    fn eq(&self, other: &Self) -> bool {
        self.sequence.eq(&other.sequence)
    }
}

impl PartialOrd<Self> for SortedChunkFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortedChunkFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}
