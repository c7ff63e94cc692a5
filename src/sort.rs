use std::cell::RefCell;
use std::cmp::{max, min};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool::ThreadPool;
use command_executor::thread_pool_builder::ThreadPoolBuilder;
use rlimit::{getrlimit, Resource, setrlimit};
use tempfile::{Builder, TempDir};

use crate::chunk_iterator::ChunkIterator;
use crate::config::{Config, DEFAULT_GROUP_SIZE, DEFAULT_INPUT_BUFFER_SIZE, DEFAULT_MAX_LINES_IN_MEMORY, DEFAULT_QUEUE_SIZE, DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_BUFFER_SIZE};
use crate::line_record::{read_record, skip_byte_order_mark, LineRecord};
use crate::merge_command::{merge_file_name, MergeCommand};
use crate::outcome::Outcome;
use crate::sort_command::SortCommand;
use crate::sorted_chunk_file::SortedChunkFile;
use crate::unmerged_chunk_file::merge_files;

thread_local! {
    pub(crate) static CONFIG: RefCell<Option<Config>> = RefCell::new(None);
}

pub(crate) fn get_tl_config() -> Result<Config, anyhow::Error> {
    CONFIG.with(
        |config| {
            config.borrow().clone().ok_or_else(|| anyhow!("Thread local config is not set"))
        }
    )
}

/// Sort a text file of `<number>.<text>` lines
///
/// Lines are ordered by the text after the first '.', compared byte by byte, and then by the
/// number before it. Blank lines are dropped. A line that does not follow the grammar fails
/// the sort with a [crate::error::FormatError] and leaves the output untouched.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use big_file_sort::sort::Sort;
///
/// fn sort_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut big_file_sort = Sort::new(vec![input], output);
///     // use 4 worker threads, the default is to use all available cores
///     big_file_sort.with_tasks(4);
///     // a dedicated directory for intermediate files, preferably on the same file system as
///     // the output
///     big_file_sort.with_tmp_dir(tmp);
///     big_file_sort.sort()
/// }
/// ```
pub struct Sort {
    input_files: Vec<PathBuf>,
    output: PathBuf,
    tmp: PathBuf,
    tasks: usize,
    queue_size: usize,
    max_lines_in_memory: usize,
    group_size: usize,
    input_buffer_size: usize,
    read_buffer_size: usize,
    write_buffer_size: usize,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * intermediate files go to a fresh directory under std::env::temp_dir()
    /// * all system cores are used
    /// * at most 4,000,000 lines are sorted in memory at once by each task
    /// * at most 4 sorted files are merged at once
    ///
    /// The Sort implementation will increase the file descriptor rlimit to accommodate
    /// concurrently merged files
    pub fn new(input_files: Vec<PathBuf>, output: PathBuf) -> Sort {
        Sort {
            input_files,
            output,
            tmp: std::env::temp_dir(),
            tasks: 0,
            queue_size: DEFAULT_QUEUE_SIZE,
            max_lines_in_memory: DEFAULT_MAX_LINES_IN_MEMORY,
            group_size: DEFAULT_GROUP_SIZE,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }

    /// Set the parent directory of the scratch directory. By default use std::env::temp_dir()
    /// It is recommended for large files to use a directory on the same file system as the
    /// output, the result is then moved into place without copying
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the number of tasks. The default is zero which will result in using all system cores
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the number of batches that may wait for a free task. Reading the input pauses while
    /// the queue is full. The default is 1.
    pub fn with_queue_size(&mut self, queue_size: usize) {
        self.queue_size = queue_size;
    }

    /// Set the maximum number of lines in one in-memory batch. The default is 4,000,000
    pub fn with_max_lines_in_memory(&mut self, max_lines_in_memory: usize) {
        self.max_lines_in_memory = max_lines_in_memory;
    }

    /// Set the maximum number of sorted files merged together. The default is 4
    pub fn with_group_size(&mut self, group_size: usize) {
        self.group_size = group_size;
    }

    /// Set the read buffer size for the input files
    pub fn with_input_buffer_size(&mut self, input_buffer_size: usize) {
        self.input_buffer_size = input_buffer_size;
    }

    /// Set the read buffer size for each merged file
    pub fn with_read_buffer_size(&mut self, read_buffer_size: usize) {
        self.read_buffer_size = read_buffer_size;
    }

    /// Set the write buffer size for sorted and merged files
    pub fn with_write_buffer_size(&mut self, write_buffer_size: usize) {
        self.write_buffer_size = write_buffer_size;
    }

    /// Sort input files
    pub fn sort(&self) -> Result<(), anyhow::Error> {
        let config = self.create_config()?;
        Self::with_file_limit(&config, || Self::internal_sort(&self.input_files, &config, &self.output))
    }

    /// Merge input files that are already sorted into the output. Input files are left in place.
    pub fn merge(&self) -> Result<(), anyhow::Error> {
        let config = self.create_config()?;
        Self::with_file_limit(&config, || {
            log::info!("Start merging {} sorted files", self.input_files.len());
            let scratch = Self::create_scratch_dir(&config)?;
            let sorted_files = self.input_files
                .iter()
                .enumerate()
                .map(|(i, path)| SortedChunkFile::borrowed(path.clone(), i))
                .collect();
            let sorted = match Self::internal_merge(sorted_files, &config, scratch.path())? {
                Some(sorted) if !sorted.owned() => {
                    // rewrite a lone input, the caller's file is never moved
                    let target = scratch.path().join(merge_file_name(0, 0));
                    let lines = merge_files(&[sorted.path().clone()], &target, config.read_buffer_size(), config.write_buffer_size())?;
                    Some(SortedChunkFile::new(target, 0, lines))
                }
                sorted => sorted,
            };
            Self::publish(sorted, &self.output)?;
            Self::remove_scratch_dir(scratch)?;
            log::info!("Finish merging");
            Ok(())
        })
    }

    /// Check that every input file is sorted
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let config = self.create_config()?;

        let mut result = true;
        for path in &self.input_files {
            result = Self::internal_check(path, &config)?;
            if !result {
                break;
            }
        }
        Ok(result)
    }

    fn create_config(&self) -> Result<Config, anyhow::Error> {
        let mut tasks = self.tasks;
        if self.tasks == 0 {
            tasks = num_cpus::get();
        }

        let config = Config::new(
            self.tmp.clone(),
            "big-file-sort-".to_string(),
            tasks,
            self.queue_size,
            self.max_lines_in_memory,
            self.group_size,
            self.input_buffer_size,
            self.read_buffer_size,
            self.write_buffer_size,
        )?;
        Ok(config)
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    fn with_file_limit<T>(config: &Config, f: impl FnOnce() -> Result<T, anyhow::Error>) -> Result<T, anyhow::Error> {
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let new_soft = min(max((config.files() + 256) as u64, current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;
        let result = f();
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let restored = Self::set_rlimits(current_soft, current_hard);
        let value = result?;
        restored?;
        Ok(value)
    }

    fn create_scratch_dir(config: &Config) -> Result<TempDir, anyhow::Error> {
        Builder::new()
            .prefix(config.tmp_prefix())
            .tempdir_in(config.tmp())
            .with_context(|| anyhow!("Failed to create scratch directory in {}", config.tmp().to_string_lossy()))
    }

    fn remove_scratch_dir(scratch: TempDir) -> Result<(), anyhow::Error> {
        let path = scratch.path().to_path_buf();
        scratch.close()
            .with_context(|| anyhow!("Remove scratch directory {}", path.to_string_lossy()))
    }

    fn create_pool(name: &str, config: &Config) -> Result<ThreadPool, anyhow::Error> {
        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let mut pool = thread_pool_builder
            .with_name(name.to_string())
            .with_tasks(config.tasks())
            .with_queue_size(config.queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()?;
        pool.set_thread_local(&CONFIG, Some(config.clone()));
        Ok(pool)
    }

    pub(crate) fn internal_check(path: &PathBuf, config: &Config) -> Result<bool, anyhow::Error> {
        let file = File::open(path).with_context(|| format!("path: {}", path.to_string_lossy()))?;
        let mut reader = BufReader::with_capacity(config.input_buffer_size(), file);
        skip_byte_order_mark(&mut reader)
            .with_context(|| format!("path: {}", path.to_string_lossy()))?;
        let mut lines_read = 0;
        let mut previous: Option<LineRecord> = None;
        while let Some(current) = read_record(&mut reader, &mut lines_read)
            .with_context(|| format!("path: {}", path.to_string_lossy()))? {
            if let Some(previous) = &previous {
                if previous > &current {
                    log::info!("{} is not sorted at line {}", path.to_string_lossy(), lines_read);
                    return Ok(false);
                }
            }
            previous = Some(current);
        }
        Ok(true)
    }

    fn submit_batches(sorting_pool: &mut ThreadPool, input_files: &[PathBuf], config: &Config, scratch: &Path, outcome: &Outcome) -> Result<(), anyhow::Error> {
        let mut sequence = 0;
        for path in input_files {
            log::info!("Start reading {}", path.to_string_lossy());
            let mut chunk_iterator = ChunkIterator::open(path, config.max_lines_in_memory(), sequence, config.input_buffer_size())?;
            for batch in chunk_iterator.by_ref() {
                if outcome.is_failed() {
                    return Ok(());
                }
                let sort_command = Box::new(SortCommand::new(batch?, scratch.to_path_buf(), outcome.clone()));
                sorting_pool.submit(sort_command);
            }
            sequence = chunk_iterator.next_sequence();
        }
        Ok(())
    }

    /// Split the input into sorted spill files, one per batch
    pub(crate) fn split_and_spill(input_files: &[PathBuf], config: &Config, scratch: &Path) -> Result<Vec<SortedChunkFile>, anyhow::Error> {
        log::info!("Start sorting batches of up to {} lines, tasks: {}", config.max_lines_in_memory(), config.tasks());
        let mut sorting_pool = Self::create_pool("sorting", config)?;
        let outcome = Outcome::new();
        if let Err(e) = Self::submit_batches(&mut sorting_pool, input_files, config, scratch, &outcome) {
            outcome.fail(e);
        }

        log::info!("Shutting down sorting pool");
        sorting_pool.shutdown();
        sorting_pool.join()?;

        let sorted_files = outcome.into_result()?;
        log::info!("Finish sorting batches, sorted files: {}", sorted_files.len());
        Ok(sorted_files)
    }

    /// Reduce sorted files to one, merging at most `group_size` files at once. Returns None
    /// when there is nothing to merge.
    pub(crate) fn internal_merge(sorted_files: Vec<SortedChunkFile>, config: &Config, scratch: &Path) -> Result<Option<SortedChunkFile>, anyhow::Error> {
        let mut sorted_files = sorted_files;
        let mut pass = 0;
        while sorted_files.len() > 1 {
            pass += 1;
            sorted_files = Self::merge_pass(pass, sorted_files, config, scratch)?;
        }
        Ok(sorted_files.pop())
    }

    fn merge_pass(pass: usize, sorted_files: Vec<SortedChunkFile>, config: &Config, scratch: &Path) -> Result<Vec<SortedChunkFile>, anyhow::Error> {
        let group_size = config.group_size();
        log::info!(
            "Start merge pass {}, sorted files: {}, groups: {}",
            pass,
            sorted_files.len(),
            (sorted_files.len() + group_size - 1) / group_size
        );
        let mut merging_pool = Self::create_pool("merging", config)?;
        let outcome = Outcome::new();

        let mut sorted_files = sorted_files.into_iter().peekable();
        let mut group_index = 0;
        while sorted_files.peek().is_some() && !outcome.is_failed() {
            let mut group: Vec<SortedChunkFile> = sorted_files.by_ref().take(group_size).collect();
            if group.len() == 1 {
                // nothing to merge with, carried over to the next pass
                let carried = group.remove(0).with_sequence(group_index);
                if let Err(e) = outcome.push(carried) {
                    outcome.fail(e);
                }
            } else {
                let target = scratch.join(merge_file_name(pass, group_index));
                merging_pool.submit(Box::new(MergeCommand::new(group_index, group, target, outcome.clone())));
            }
            group_index += 1;
        }

        merging_pool.shutdown();
        merging_pool.join()?;

        let merged = outcome.into_result()?;
        log::info!("Finish merge pass {}, sorted files: {}", pass, merged.len());
        Ok(merged)
    }

    /// Move the sorted result to the output path. The output only appears once complete.
    fn publish(sorted: Option<SortedChunkFile>, output: &PathBuf) -> Result<(), anyhow::Error> {
        match sorted {
            None => {
                log::info!("No lines to sort, writing empty {}", output.to_string_lossy());
                Self::stage_and_persist(None, output)
            }
            Some(sorted) => {
                log::info!("Publishing {} lines to {}", sorted.lines(), output.to_string_lossy());
                if sorted.owned() {
                    match std::fs::rename(sorted.path(), output) {
                        Ok(()) => return Ok(()),
                        Err(e) => log::debug!(
                            "Rename {} to {} failed: {}, copying",
                            sorted.path().to_string_lossy(),
                            output.to_string_lossy(),
                            e
                        ),
                    }
                }
                Self::stage_and_persist(Some(sorted.path()), output)
            }
        }
    }

    fn stage_and_persist(source: Option<&PathBuf>, output: &PathBuf) -> Result<(), anyhow::Error> {
        let dir = output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = Builder::new()
            .prefix(".big-file-sort-")
            .tempfile_in(dir)
            .with_context(|| anyhow!("Failed to create staging file in {}", dir.to_string_lossy()))?;
        if let Some(source) = source {
            let mut reader = File::open(source)
                .with_context(|| format!("path: {}", source.to_string_lossy()))?;
            std::io::copy(&mut reader, staged.as_file_mut())
                .with_context(|| anyhow!("Copy {} to {}", source.to_string_lossy(), staged.path().to_string_lossy()))?;
        }
        staged.persist(output)
            .map_err(|e| e.error)
            .with_context(|| anyhow!("Persist {}", output.to_string_lossy()))?;
        Ok(())
    }

    fn internal_sort(input_files: &[PathBuf], config: &Config, output: &PathBuf) -> Result<(), anyhow::Error> {
        log::info!("Start parallel sort");
        let scratch = Self::create_scratch_dir(config)?;
        log::info!("Scratch directory {}", scratch.path().to_string_lossy());

        let sorted_files = Self::split_and_spill(input_files, config, scratch.path())?;
        let sorted = Self::internal_merge(sorted_files, config, scratch.path())?;
        Self::publish(sorted, output)?;

        Self::remove_scratch_dir(scratch)?;
        log::info!("Finish parallel sort");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use crate::config::Config;
    use crate::sort::{Sort, CONFIG};
    use crate::sorted_chunk_file::SortedChunkFile;

    fn config(tmp: PathBuf, max_lines_in_memory: usize, group_size: usize) -> Config {
        Config::new(tmp, "test-".to_string(), 2, 2, max_lines_in_memory, group_size, 1024, 1024, 1024).unwrap()
    }

    fn write_sorted(path: &PathBuf, from: usize, count: usize, step: usize) -> Result<(), anyhow::Error> {
        let content: String = (0..count).map(|i| format!("{}.same\n", from + i * step)).collect();
        fs::write(path, content)?;
        Ok(())
    }

    #[test]
    fn test_split_and_spill() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let input = dir.path().join("input");
        fs::write(&input, "3.c\n\n1.a\n2.b\n6.f\n5.e\n4.d\n7.g\n")?;
        let config = config(dir.path().to_path_buf(), 3, 4);
        let sorted_files = Sort::split_and_spill(&[input], &config, dir.path())?;

        let sequences: Vec<usize> = sorted_files.iter().map(|f| f.sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(fs::read_to_string(sorted_files[0].path())?, "1.a\n2.b\n3.c\n");
        assert_eq!(fs::read_to_string(sorted_files[1].path())?, "4.d\n5.e\n6.f\n");
        assert_eq!(fs::read_to_string(sorted_files[2].path())?, "7.g\n");
        assert_eq!(sorted_files[2].path(), &dir.path().join("chunk-000002.sorted"));
        Ok(())
    }

    #[test]
    fn test_merge_passes_remove_scratch_files() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let scratch = dir.path().join("scratch");
        fs::create_dir(&scratch)?;
        let mut sorted_files = Vec::new();
        for i in 0..9 {
            let path = scratch.join(format!("chunk-{i}"));
            write_sorted(&path, i, 10, 9)?;
            sorted_files.push(SortedChunkFile::new(path, i, 10));
        }

        let config = config(dir.path().to_path_buf(), 10, 2);
        let merged = Sort::internal_merge(sorted_files, &config, &scratch)?.unwrap();
        assert_eq!(merged.lines(), 90);

        let expected: String = (0..90).map(|i| format!("{}.same\n", i)).collect();
        assert_eq!(fs::read_to_string(merged.path())?, expected);
        // 9 -> 5 -> 3 -> 2 -> 1
        assert_eq!(merged.path(), &scratch.join("merge-004-000000.sorted"));
        assert_eq!(fs::read_dir(&scratch)?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_merge_keeps_borrowed_files() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        write_sorted(&first, 0, 5, 2)?;
        write_sorted(&second, 1, 5, 2)?;
        let sorted_files = vec![
            SortedChunkFile::borrowed(first.clone(), 0),
            SortedChunkFile::borrowed(second.clone(), 1),
        ];
        let config = config(dir.path().to_path_buf(), 10, 4);
        let merged = Sort::internal_merge(sorted_files, &config, dir.path())?.unwrap();
        assert!(merged.owned());
        assert_eq!(merged.lines(), 10);
        assert!(first.exists());
        assert!(second.exists());
        Ok(())
    }

    #[test]
    fn test_nothing_to_merge() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let config = config(dir.path().to_path_buf(), 10, 4);
        assert!(Sort::internal_merge(vec![], &config, dir.path())?.is_none());
        Ok(())
    }

    #[test]
    fn test_publish_empty() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let output = dir.path().join("output");
        Sort::publish(None, &output)?;
        assert_eq!(fs::read_to_string(&output)?, "");
        Ok(())
    }

    #[test]
    fn test_publish_borrowed_copies() -> Result<(), anyhow::Error> {
        let dir = tempdir()?;
        let source = dir.path().join("source");
        let output = dir.path().join("output");
        fs::write(&source, "1.a\n")?;
        Sort::publish(Some(SortedChunkFile::borrowed(source.clone(), 0)), &output)?;
        assert!(source.exists());
        assert_eq!(fs::read_to_string(&output)?, "1.a\n");
        Ok(())
    }

    #[test]
    fn test_thread_local_config() -> Result<(), anyhow::Error> {
        assert!(crate::sort::get_tl_config().is_err());
        CONFIG.with(|c| *c.borrow_mut() = Some(config(PathBuf::from("/tmp"), 5, 3)));
        assert_eq!(crate::sort::get_tl_config()?.group_size(), 3);
        Ok(())
    }
}
