use std::path::PathBuf;

use crate::error::ConfigError;

pub(crate) const DEFAULT_MAX_LINES_IN_MEMORY: usize = 4_000_000;
pub(crate) const DEFAULT_GROUP_SIZE: usize = 4;
pub(crate) const DEFAULT_QUEUE_SIZE: usize = 1;
pub(crate) const DEFAULT_INPUT_BUFFER_SIZE: usize = 4 * 1024 * 1024;
pub(crate) const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024;
pub(crate) const DEFAULT_WRITE_BUFFER_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tasks: usize,
    queue_size: usize,
    max_lines_in_memory: usize,
    group_size: usize,
    input_buffer_size: usize,
    read_buffer_size: usize,
    write_buffer_size: usize,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tasks: usize,
        queue_size: usize,
        max_lines_in_memory: usize,
        group_size: usize,
        input_buffer_size: usize,
        read_buffer_size: usize,
        write_buffer_size: usize,
    ) -> Result<Config, ConfigError> {
        if max_lines_in_memory == 0 {
            return Err(ConfigError::MaxLinesInMemory);
        }
        if group_size < 2 {
            return Err(ConfigError::GroupSize(group_size));
        }
        Ok(
            Config {
                tmp,
                tmp_prefix,
                tasks: tasks.max(1),
                queue_size: queue_size.max(1),
                max_lines_in_memory,
                group_size,
                input_buffer_size,
                read_buffer_size,
                write_buffer_size,
            }
        )
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn max_lines_in_memory(&self) -> usize {
        self.max_lines_in_memory
    }

    pub(crate) fn group_size(&self) -> usize {
        self.group_size
    }

    pub(crate) fn input_buffer_size(&self) -> usize {
        self.input_buffer_size
    }

    pub(crate) fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub(crate) fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    /// Files open at once during a merge pass
    pub(crate) fn files(&self) -> usize {
        self.tasks * (self.group_size + 1)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::Config;
    use crate::error::ConfigError;

    fn config(max_lines_in_memory: usize, group_size: usize) -> Result<Config, ConfigError> {
        Config::new(PathBuf::from("/tmp"), "sort-".to_string(), 2, 1, max_lines_in_memory, group_size, 64, 64, 64)
    }

    #[test]
    fn test_reject_zero_lines() {
        assert!(matches!(config(0, 4), Err(ConfigError::MaxLinesInMemory)));
    }

    #[test]
    fn test_reject_small_group() {
        assert!(matches!(config(10, 1), Err(ConfigError::GroupSize(1))));
        assert!(matches!(config(10, 0), Err(ConfigError::GroupSize(0))));
    }

    #[test]
    fn test_files() -> Result<(), anyhow::Error> {
        let config = config(10, 4)?;
        assert_eq!(config.files(), 10);
        Ok(())
    }
}
