use std::cmp::Ordering;
use std::io::BufRead;
use std::str::FromStr;

use anyhow::Context;

use crate::error::FormatError;
use crate::key::SortKey;

/// Split a `<number>.<text>` line into its number and text parts.
///
/// The number is everything before the first '.', the text is everything after it, including
/// any further '.' characters. The line must not carry its terminator.
///
/// # Examples
/// ```
/// use big_file_sort::line_record::parse_line;
///
/// assert_eq!(parse_line("42.a.b").unwrap(), (42, "a.b"));
/// assert!(parse_line("no-delimiter-here").is_err());
/// ```
pub fn parse_line(line: &str) -> Result<(i64, &str), FormatError> {
    let separator = line.find('.').ok_or_else(|| FormatError::MissingSeparator {
        line: line.to_string(),
    })?;
    if separator + 1 == line.len() {
        return Err(FormatError::EmptyText {
            line: line.to_string(),
        });
    }

    let number_part = &line[..separator];
    let number = i64::from_str(number_part).map_err(|e| FormatError::InvalidNumber {
        line: line.to_string(),
        number: number_part.to_string(),
        source: e,
    })?;
    Ok((number, &line[separator + 1..]))
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// A parsed line. Holds the line exactly as read, without the line terminator.
#[derive(Debug)]
pub(crate) struct LineRecord {
    line: String,
    separator: usize,
    number: i64,
}

impl LineRecord {
    pub(crate) fn new(line: String) -> Result<LineRecord, FormatError> {
        let (number, text) = parse_line(line.as_str())?;
        let separator = line.len() - text.len() - 1;
        Ok(
            LineRecord {
                line,
                separator,
                number,
            }
        )
    }

    pub(crate) fn key(&self) -> SortKey<'_> {
        SortKey::new(&self.line[self.separator + 1..], self.number)
    }

    pub(crate) fn line(&self) -> &str {
        self.line.as_str()
    }
}

impl Eq for LineRecord {}

impl PartialEq<Self> for LineRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl PartialOrd<Self> for LineRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LineRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

const BYTE_ORDER_MARK: &[u8] = b"\xEF\xBB\xBF";

/// Consume a UTF-8 byte-order mark at the start of an input, if there is one.
pub(crate) fn skip_byte_order_mark<R: BufRead>(reader: &mut R) -> Result<bool, std::io::Error> {
    if reader.fill_buf()?.starts_with(BYTE_ORDER_MARK) {
        reader.consume(BYTE_ORDER_MARK.len());
        return Ok(true);
    }
    Ok(false)
}

/// Read the next non blank line and parse it.
///
/// `lines_read` counts every physical line consumed, blank lines included, and is used to
/// point at the offending line when parsing fails.
pub(crate) fn read_record<R: BufRead>(reader: &mut R, lines_read: &mut u64) -> Result<Option<LineRecord>, anyhow::Error> {
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        *lines_read += 1;

        if line.ends_with('\n') {
            line.pop();
        }
        // a trailing '\r' ends the line too, so lines written back read the same
        let end = line.trim_end_matches('\r').len();
        line.truncate(end);

        if is_blank(&line) {
            continue;
        }

        let record = LineRecord::new(line)
            .with_context(|| format!("line number: {}", lines_read))?;
        return Ok(Some(record));
    }
}
