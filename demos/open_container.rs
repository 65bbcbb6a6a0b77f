/// Open an OCF container and print what it declares.
///
/// This example demonstrates:
/// - Opening a container from a path
/// - Listing packages with their media types
/// - Reading the container version
/// - Listing encryption records
///
/// Set `RUST_LOG=ocf_reader=debug` to see what was skipped while opening.
use ocf_reader::Container;
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ocf_reader=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).compact())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-epub>", args[0]);
        eprintln!("Example: {} book.epub", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    println!("Opening container: {}", path);
    println!("{}", "=".repeat(80));

    let container = Container::open(path)?;
    println!("OCF version: {}", container.version());
    println!();

    println!("Packages:");
    println!("{}", "-".repeat(80));
    if container.packages().is_empty() {
        println!("  (none)");
    }
    for (idx, package) in container.packages().iter().enumerate() {
        let media_type = match package.media_type() {
            "" => "no media type",
            media_type => media_type,
        };
        let status = if package.exists() { "" } else { " [missing]" };
        println!("  #{} {} ({}){}", idx + 1, package.full_path(), media_type, status);
    }
    println!();

    println!("Encryption:");
    println!("{}", "-".repeat(80));
    if container.encryption_info().is_empty() {
        println!("  (none)");
    }
    for info in container.encryption_info() {
        println!("  {}", info.path());
        println!("    algorithm: {} ({:?})", info.algorithm(), info.algorithm_kind());
        if let Some(key_name) = info.key_name() {
            println!("    key name:  {}", key_name);
        }
        if let Some(compression) = info.compression() {
            println!(
                "    compression: method {} original length {:?}",
                compression.method, compression.original_length
            );
        }
    }

    Ok(())
}
