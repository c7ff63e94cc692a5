use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::HEXLOWER;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

const WORDS: [&str; 12] = [
    "Apple", "Banana is yellow", "Cherry is the best", "Apple two", "Kiwi has seeds", "Lime",
    "Peach is fuzzy", "Plum.is.purple", "date", "éclair", " leading space", "Zebra",
];

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    let parallel_results_dir_path = PathBuf::from_str("./target/parallel-results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }

    if !parallel_results_dir_path.exists() {
        fs::create_dir_all(&parallel_results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create parallel results directory: {:?}", parallel_results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// An empty directory under `dir` with a random name
#[allow(dead_code)]
pub fn temp_dir_name(dir: &str) -> PathBuf {
    let result = temp_file_name(dir);
    fs::create_dir_all(&result).unwrap_or_else(|_|
        panic!("Failed to create directory: {:?}", result)
    );
    result
}

/// Write `count` random lines, numbers never carry leading zeros so equal keys mean equal lines
#[allow(dead_code)]
pub fn write_random_lines(path: &PathBuf, count: usize) -> Result<(), anyhow::Error> {
    let mut rng = rand::thread_rng();
    let mut writer = BufWriter::new(File::create(path)?);
    for _ in 0..count {
        let number: i64 = rng.gen_range(-50..1000);
        let text = WORDS.choose(&mut rng).unwrap();
        writeln!(writer, "{}.{}", number, text)?;
    }
    writer.flush()?;
    Ok(())
}

#[allow(dead_code)]
pub fn write_lines(path: &PathBuf, lines: &[&str]) -> Result<(), anyhow::Error> {
    let content: String = lines.iter().map(|line| format!("{line}\n")).collect();
    fs::write(path, content)?;
    Ok(())
}

fn key(line: &str) -> (&[u8], i64) {
    let (number, text) = line.split_once('.').unwrap();
    (text.as_bytes(), i64::from_str(number).unwrap())
}

/// Sort all non blank lines in memory
#[allow(dead_code)]
pub fn sort_in_memory(paths: &[PathBuf]) -> Result<Vec<String>, anyhow::Error> {
    let mut lines: Vec<String> = Vec::new();
    for path in paths {
        lines.extend(read_lines(path.clone())?.into_iter().filter(|line| !line.trim().is_empty()));
    }
    lines.par_sort_by(|a, b| key(a).cmp(&key(b)));
    Ok(lines)
}

#[allow(dead_code)]
pub fn is_sorted(lines: &[String]) -> bool {
    lines.windows(2).all(|pair| key(&pair[0]) <= key(&pair[1]))
}
