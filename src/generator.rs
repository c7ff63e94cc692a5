use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{anyhow, Context};
use crossbeam_channel::bounded;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ConfigError;

const SAMPLE_STRINGS: [&str; 29] = [
    "Apple", "Apple two", "Banana is yellow", "Cherry is the best", "Something something something",
    "Orange is round", "Watermelon is large", "Grapes are sweet", "Pineapple has a crown",
    "Mango is tropical", "Blueberries are tiny", "Kiwi has seeds", "Lemon is sour",
    "Lime is green", "Strawberries are red", "Peach is fuzzy", "Plum is purple",
    "Pear is juicy", "Raspberry is delicate", "Blackberry is wild", "Coconut has water",
    "Avocado is creamy", "Papaya is exotic", "Fig is ancient", "Date is sweet", "Lychee is fragrant",
    "Guava is underrated", "Pomegranate is full of seeds", "Dragonfruit looks weird",
];

const MB: u64 = 1024 * 1024;

/// Generate a random `<number>.<text>` file of at least the requested size.
///
/// Worker threads produce lines into a bounded queue drained by a single writer. The file
/// ends up at most one line longer than the target.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use big_file_sort::generator::Generator;
///
/// let written = Generator::new(PathBuf::from("./target/input.txt"), 10).generate().unwrap();
/// assert!(written >= 10 * 1024 * 1024);
/// ```
pub struct Generator {
    output: PathBuf,
    size_mb: u64,
    workers: usize,
    queue_capacity: usize,
}

impl Generator {
    pub fn new(output: PathBuf, size_mb: u64) -> Generator {
        Generator {
            output,
            size_mb,
            workers: num_cpus::get() + 2,
            queue_capacity: 200_000,
        }
    }

    /// Set the number of producing threads
    pub fn with_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    /// Set how many lines may wait for the writer
    pub fn with_queue_capacity(&mut self, queue_capacity: usize) {
        self.queue_capacity = queue_capacity.max(1);
    }

    /// Write the file, returns the number of bytes written
    pub fn generate(&self) -> Result<u64, anyhow::Error> {
        if self.size_mb == 0 {
            return Err(ConfigError::TargetSize.into());
        }
        let target = self.size_mb * MB;
        let file = File::create(&self.output)
            .with_context(|| anyhow!("path: {}", self.output.to_string_lossy()))?;
        let mut writer = BufWriter::with_capacity(64 * 1024 * 1024, file);
        let (sender, receiver) = bounded::<Vec<u8>>(self.queue_capacity);
        let stop = AtomicBool::new(false);

        log::info!("Generating {} bytes into {} with {} workers", target, self.output.to_string_lossy(), self.workers);
        let written = thread::scope(|scope| {
            for _ in 0..self.workers {
                let sender = sender.clone();
                let stop = &stop;
                scope.spawn(move || {
                    let mut rng = rand::thread_rng();
                    while !stop.load(Ordering::Relaxed) {
                        let number: u32 = rng.gen_range(1..100_000);
                        let text = SAMPLE_STRINGS.choose(&mut rng).copied().unwrap_or("Apple");
                        if sender.send(format!("{}.{}\n", number, text).into_bytes()).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(sender);

            let mut written: u64 = 0;
            let result = loop {
                let line = match receiver.recv() {
                    Ok(line) => line,
                    Err(_) => break Err(anyhow!("all generator workers stopped")),
                };
                if let Err(e) = writer.write_all(&line) {
                    break Err(e.into());
                }
                written += line.len() as u64;
                if written >= target {
                    break Ok(written);
                }
            };
            stop.store(true, Ordering::Relaxed);
            // unblock workers waiting on a full queue
            drop(receiver);
            result
        })?;

        writer.flush()
            .with_context(|| anyhow!("path: {}", self.output.to_string_lossy()))?;
        log::info!("Generated {} bytes", written);
        Ok(written)
    }
}
