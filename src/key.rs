use std::cmp::Ordering;

/// Sort key of a `<number>.<text>` line.
///
/// Keys compare by the text part first, byte by byte, and fall back to the
/// numeric value of the number part when the texts are equal.
///
/// # Examples
/// ```
/// use big_file_sort::key::SortKey;
///
/// assert!(SortKey::new("apple", 2) < SortKey::new("banana", 1));
/// assert!(SortKey::new("apple", 2) < SortKey::new("apple", 10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<'a> {
    text: &'a str,
    number: i64,
}

impl<'a> SortKey<'a> {
    pub fn new(text: &'a str, number: i64) -> SortKey<'a> {
        SortKey { text, number }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn number(&self) -> i64 {
        self.number
    }
}

impl PartialOrd<Self> for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text
            .as_bytes()
            .cmp(other.text.as_bytes())
            .then(self.number.cmp(&other.number))
    }
}
