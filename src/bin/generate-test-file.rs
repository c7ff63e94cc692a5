use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use big_file_sort::generator::Generator;

// cargo run -r --bin generate-test-file -- <output_file> <target_size_in_MB>
fn main() -> Result<(), anyhow::Error> {
    SimpleLogger::new().with_level(LevelFilter::Warn).env().init()?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        println!("Usage: generate-test-file <output_file> <target_size_in_MB>");
        return Ok(());
    }

    let output_path = PathBuf::from(&args[1]);
    let size_mb = match u64::from_str(&args[2]) {
        Ok(size_mb) if size_mb > 0 => size_mb,
        _ => {
            println!("Invalid size. Provide a positive integer for size in MB.");
            return Ok(());
        }
    };

    let written = Generator::new(output_path, size_mb).generate()?;
    println!("Done. File size: {:.2} MB", written as f64 / (1024.0 * 1024.0));
    Ok(())
}
