use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::sorted_chunk_file::SortedChunkFile;

/// Results of the units of work of one phase, shared between the pool threads.
///
/// Holds the sorted files produced so far and the first failure. Once a failure is recorded
/// the remaining units skip their work.
#[derive(Clone, Default)]
pub(crate) struct Outcome {
    failed: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<anyhow::Error>>>,
    sorted_files: Arc<Mutex<Vec<SortedChunkFile>>>,
}

impl Outcome {
    pub(crate) fn new() -> Outcome {
        Outcome::default()
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub(crate) fn push(&self, sorted_file: SortedChunkFile) -> Result<(), anyhow::Error> {
        let mut sorted_files = self.sorted_files
            .lock()
            .map_err(|_| anyhow!("sorted files lock poisoned"))?;
        sorted_files.push(sorted_file);
        Ok(())
    }

    /// Record a failure, only the first one is kept
    pub(crate) fn fail(&self, error: anyhow::Error) {
        self.failed.store(true, Ordering::Release);
        match self.failure.lock() {
            Ok(mut failure) => {
                if failure.is_none() {
                    *failure = Some(error);
                }
            }
            Err(_) => log::error!("Failure lock poisoned, dropping error: {:#}", error),
        }
    }

    /// The produced files ordered by sequence, or the first recorded failure
    pub(crate) fn into_result(self) -> Result<Vec<SortedChunkFile>, anyhow::Error> {
        let failure = self.failure
            .lock()
            .map_err(|_| anyhow!("failure lock poisoned"))?
            .take();
        if let Some(error) = failure {
            return Err(error);
        }
        if self.is_failed() {
            return Err(anyhow!("a unit of work failed"));
        }

        let mut sorted_files = std::mem::take(
            &mut *self.sorted_files
                .lock()
                .map_err(|_| anyhow!("sorted files lock poisoned"))?
        );
        sorted_files.sort();
        Ok(sorted_files)
    }
}
