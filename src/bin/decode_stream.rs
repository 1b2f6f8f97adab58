//! Decode a byte stream with the demo protocol and print every message.
//!
//! Usage: `decode_stream [--chunk=N] [--verbose|-v] [--source=TAG] [FILE]`
//!
//! Reads FILE (or stdin when absent or `-`) and feeds it to the engine `N` bytes at a
//! time (default 64), marking the last chunk final. Logging follows `RUST_LOG`;
//! `--verbose` defaults it to `debug`.

use protostack::dump::dump_message;
use protostack::{demo, DataInfo};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn take_flag(args: &mut Vec<String>, names: &[&str]) -> bool {
    match args.iter().position(|a| names.contains(&a.as_str())) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn take_value(args: &mut Vec<String>, prefix: &str) -> Option<String> {
    let pos = args.iter().position(|a| a.starts_with(prefix))?;
    let arg = args.remove(pos);
    arg.strip_prefix(prefix).map(str::to_string)
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = take_flag(&mut raw_args, &["--verbose", "-v"]);
    let chunk: usize = match take_value(&mut raw_args, "--chunk=") {
        Some(s) => s.parse().map_err(|e| anyhow::anyhow!("bad --chunk value {:?}: {}", s, e))?,
        None => 64,
    };
    anyhow::ensure!(chunk > 0, "--chunk must be at least 1");
    let source = take_value(&mut raw_args, "--source=");
    let path: Option<PathBuf> = raw_args.into_iter().next().filter(|p| p != "-").map(PathBuf::from);

    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let input = match &path {
        Some(p) => std::fs::read(p)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let mut protocol = demo::protocol();
    let mut decoded: u64 = 0;
    let mut invalid: u64 = 0;
    let chunks: Vec<&[u8]> = input.chunks(chunk).collect();
    let last = chunks.len().saturating_sub(1);

    // An empty input still gets one final call so nothing is left pending.
    let chunks = if chunks.is_empty() { vec![&[][..]] } else { chunks };
    for (i, bytes) in chunks.into_iter().enumerate() {
        let mut info = DataInfo::new(bytes);
        if let Some(tag) = &source {
            info = info.with_extra("source", tag.as_str());
        }
        for handle in protocol.read(&info, i == last) {
            if handle.id().is_some() {
                decoded += 1;
            } else {
                invalid += 1;
            }
            println!("{}\n", dump_message(&handle));
        }
    }

    eprintln!(
        "{}: {} bytes, {} messages, {} invalid",
        protocol.name(),
        input.len(),
        decoded,
        invalid
    );
    Ok(())
}
