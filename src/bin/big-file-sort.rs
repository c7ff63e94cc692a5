use std::path::PathBuf;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use big_file_sort::sort::Sort;

// cargo run -r --bin big-file-sort -- <input_file> <output_file>
fn main() -> Result<(), anyhow::Error> {
    SimpleLogger::new().with_level(LevelFilter::Warn).env().init()?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        println!("Usage: big-file-sort <input_file> <output_file>");
        return Ok(());
    }

    let input_path = PathBuf::from(&args[1]);
    let output_path = PathBuf::from(&args[2]);
    println!("Sorting {} into {}...", input_path.display(), output_path.display());

    let big_file_sort = Sort::new(vec![input_path], output_path);
    big_file_sort.sort()?;

    println!("Done Sorting!");
    Ok(())
}
