//! This crate sorts text files that are far larger than the available memory, where each line
//! has the form `<number>.<text>`, for example `415.Apple is red`.
//!
//! Lines are ordered by the text part, compared byte by byte, and lines with equal text are
//! ordered by the number part. The result is the same as sorting all lines in memory.
//!
//! The input is read sequentially in batches of a bounded number of lines. Batches are sorted
//! and spilled to a scratch directory by a pool of worker threads, using all CPU cores. The
//! sorted spill files are then merged a few at a time, in parallel, pass after pass, until a
//! single sorted file remains and is moved to the output path. Blank lines are dropped and a
//! line without the `.` separator or with an invalid number fails the sort.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use big_file_sort::sort::Sort;
//!
//! fn sort_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut big_file_sort = Sort::new(vec![input], output);
//!
//!     // set number of CPU cores the sort will attempt to use. The default is to use all
//!     // available cores.
//!     big_file_sort.with_tasks(2);
//!
//!     // the number of lines each task sorts in memory, and the number of sorted files merged
//!     // together. Smaller values use less memory and fewer open files at the cost of more
//!     // merge passes.
//!     big_file_sort.with_max_lines_in_memory(1_000_000);
//!     big_file_sort.with_group_size(8);
//!
//!     // set the directory for intermediate results. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory for intermediate files, preferably on the same file system as the output result.
//!     big_file_sort.with_tmp_dir(tmp);
//!
//!     big_file_sort.sort()
//! }
//! ```
//!

pub(crate) mod sort_command;
pub(crate) mod merge_command;
pub(crate) mod sorted_chunk_file;
pub(crate) mod unmerged_chunk_file;
pub(crate) mod config;
pub(crate) mod chunk_iterator;
pub(crate) mod outcome;

pub mod sort;
pub mod key;
pub mod line_record;
pub mod error;
pub mod generator;
