use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};

use crate::line_record::{read_record, skip_byte_order_mark, LineRecord};

/// One input of a k-way merge. Keeps exactly one line buffered ahead of the reader.
#[derive(Debug)]
pub(crate) struct UnmergedChunkFile<R: BufRead> {
    name: String,
    reader: R,
    head: Option<LineRecord>,
    lines_read: u64,
}

impl UnmergedChunkFile<BufReader<File>> {
    pub(crate) fn open(path: &PathBuf, buffer_size: usize) -> Result<Self, anyhow::Error> {
        let file = File::open(path).with_context(|| format!("path: {}", path.to_string_lossy()))?;
        UnmergedChunkFile::new(path.to_string_lossy().to_string(), BufReader::with_capacity(buffer_size, file))
    }
}

impl<R: BufRead> UnmergedChunkFile<R> {
    pub(crate) fn new(name: String, mut reader: R) -> Result<UnmergedChunkFile<R>, anyhow::Error> {
        skip_byte_order_mark(&mut reader)
            .with_context(|| anyhow!("path: {}", name))?;
        let mut lines_read = 0;
        let head = read_record(&mut reader, &mut lines_read)
            .with_context(|| anyhow!("path: {}", name))?;
        Ok(
            UnmergedChunkFile {
                name,
                reader,
                head,
                lines_read,
            }
        )
    }

    pub(crate) fn head(&self) -> Option<&LineRecord> {
        self.head.as_ref()
    }

    /// Take the buffered line and read the one after it.
    pub(crate) fn line_record(&mut self) -> Result<Option<LineRecord>, anyhow::Error> {
        if self.head.is_none() {
            return Ok(None);
        }
        let next = read_record(&mut self.reader, &mut self.lines_read)
            .with_context(|| anyhow!("path: {}", self.name))?;
        Ok(std::mem::replace(&mut self.head, next))
    }
}

impl<R: BufRead> Eq for UnmergedChunkFile<R> {}

impl<R: BufRead> PartialEq<Self> for UnmergedChunkFile<R> {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head
    }
}

impl<R: BufRead> PartialOrd<Self> for UnmergedChunkFile<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R: BufRead> Ord for UnmergedChunkFile<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.head, &other.head) {
            (None, None) => Ordering::Equal,
            // none > some so exhausted sources pop from BinaryHeap first
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(this), Some(that)) => that.cmp(this),
        }
    }
}

pub(crate) fn write_line<W: Write>(writer: &mut W, record: &LineRecord) -> Result<(), std::io::Error> {
    writer.write_all(record.line().as_bytes())?;
    writer.write_all(b"\n")
}

/// Merge sorted sources into `writer`, returns the number of lines written.
///
/// Every source must already be sorted by key. Exhausted sources are dropped as soon as
/// their last line is written, the others keep one line buffered each.
pub(crate) fn merge_sorted<R: BufRead, W: Write>(sources: Vec<UnmergedChunkFile<R>>, writer: &mut W) -> Result<usize, anyhow::Error> {
    let mut merged_len: usize = 0;
    let mut unmerged_files: BinaryHeap<UnmergedChunkFile<R>> = sources
        .into_iter()
        .filter(|source| source.head().is_some())
        .collect();

    while let Some(mut current_min) = unmerged_files.pop() {
        // comparison operators are flipped to work with BinaryHeap (Max Heap)
        while unmerged_files.peek().map_or(true, |next_min| &current_min >= next_min) {
            match current_min.line_record()? {
                Some(line_record) => {
                    write_line(writer, &line_record)?;
                    merged_len += 1;
                }
                None => break,
            }
        }
        if current_min.head().is_some() {
            unmerged_files.push(current_min);
        }
    }
    Ok(merged_len)
}

/// Merge sorted files into a new file at `target`
pub(crate) fn merge_files(files: &[PathBuf], target: &PathBuf, read_buffer_size: usize, write_buffer_size: usize) -> Result<usize, anyhow::Error> {
    let sources = files
        .iter()
        .map(|path| UnmergedChunkFile::open(path, read_buffer_size))
        .collect::<Result<Vec<_>, _>>()?;
    let file = File::create(target)
        .with_context(|| format!("path: {}", target.to_string_lossy()))?;
    let mut merged_writer = BufWriter::with_capacity(write_buffer_size, file);
    let merged_len = merge_sorted(sources, &mut merged_writer)?;
    merged_writer.flush()
        .with_context(|| format!("path: {}", target.to_string_lossy()))?;
    Ok(merged_len)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::error::FormatError;
    use crate::unmerged_chunk_file::{merge_sorted, UnmergedChunkFile};

    fn source(name: &str, content: &str) -> UnmergedChunkFile<Cursor<Vec<u8>>> {
        UnmergedChunkFile::new(name.to_string(), Cursor::new(content.as_bytes().to_vec())).unwrap()
    }

    fn merge(sources: Vec<UnmergedChunkFile<Cursor<Vec<u8>>>>) -> Result<(usize, String), anyhow::Error> {
        let mut output = Vec::new();
        let merged_len = merge_sorted(sources, &mut output)?;
        Ok((merged_len, String::from_utf8(output)?))
    }

    #[test]
    fn test_merge_interleaved() -> Result<(), anyhow::Error> {
        let (merged_len, output) = merge(
            vec![
                source("a", "1.apple\n3.banana\n"),
                source("b", "2.apple\n1.cherry\n"),
                source("c", "9.apple\n"),
            ]
        )?;
        assert_eq!(merged_len, 5);
        assert_eq!(output, "1.apple\n2.apple\n9.apple\n3.banana\n1.cherry\n");
        Ok(())
    }

    #[test]
    fn test_merge_with_empty_sources() -> Result<(), anyhow::Error> {
        let (merged_len, output) = merge(
            vec![
                source("empty", ""),
                source("a", "1.a\n2.a\n"),
                source("blank", "\n\n"),
            ]
        )?;
        assert_eq!(merged_len, 2);
        assert_eq!(output, "1.a\n2.a\n");
        Ok(())
    }

    #[test]
    fn test_merge_nothing() -> Result<(), anyhow::Error> {
        let (merged_len, output) = merge(vec![source("empty", ""), source("empty", "")])?;
        assert_eq!(merged_len, 0);
        assert!(output.is_empty());
        let (merged_len, _) = merge(vec![])?;
        assert_eq!(merged_len, 0);
        Ok(())
    }

    #[test]
    fn test_merge_long_runs() -> Result<(), anyhow::Error> {
        let first: String = (0..100).map(|i| format!("{}.a\n", i)).collect();
        let second: String = (0..100).map(|i| format!("{}.b\n", i)).collect();
        let (merged_len, output) = merge(vec![source("b", &second), source("a", &first)])?;
        assert_eq!(merged_len, 200);
        let expected = format!("{}{}", first, second);
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn test_merge_terminates_lines() -> Result<(), anyhow::Error> {
        let (_, output) = merge(vec![source("a", "1.a\r\n3.a"), source("b", "2.a")])?;
        assert_eq!(output, "1.a\n2.a\n3.a\n");
        Ok(())
    }

    #[test]
    fn test_merge_format_error() {
        let sources = vec![source("a", "1.a\nbad line\n"), source("b", "2.b\n")];
        let mut output = Vec::new();
        let error = merge_sorted(sources, &mut output).unwrap_err();
        assert!(error.downcast_ref::<FormatError>().is_some());
    }
}
