//! Stream fuzz target: feed arbitrary bytes to the demo protocol, split at a point taken
//! from the input. Ingestion must not panic and every byte must come back out as raw data
//! of exactly one handle, in order.
//! Build with: cargo fuzz run stream_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use protostack::{demo, DataInfo};

    let split = data.first().map_or(0, |b| *b as usize).min(data.len());
    let (head, tail) = data.split_at(split);
    let mut protocol = demo::protocol();
    let mut out = protocol.read(&DataInfo::new(head), false);
    out.extend(protocol.read(&DataInfo::new(tail), true));

    let joined: Vec<u8> = out
        .iter()
        .flat_map(|h| h.raw_bytes().unwrap_or_default().to_vec())
        .collect();
    assert_eq!(joined, data);
    assert_eq!(protocol.pending(), 0);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run stream_fuzz");
}
