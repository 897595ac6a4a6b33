//! Fuzz target for budget packing.
//!
//! Run with: cargo +nightly fuzz run fuzz_budget_pack
//!
//! Builds candidates from arbitrary bytes (3 bytes each: priority, two bytes
//! of size) and checks the packing invariants on every input.

#![no_main]

use std::path::PathBuf;

use libfuzzer_sys::fuzz_target;
use lmpctx_core::{CandidateFile, estimate_tokens, pack};

fuzz_target!(|data: &[u8]| {
    let Some((&ceiling, rest)) = data.split_first() else {
        return;
    };
    let ceiling = u64::from(ceiling) * 16;

    let candidates: Vec<CandidateFile> = rest
        .chunks_exact(3)
        .enumerate()
        .map(|(i, chunk)| {
            let size = u64::from(u16::from_le_bytes([chunk[1], chunk[2]]));
            CandidateFile {
                absolute_path: PathBuf::from(format!("/fuzz/{i}")),
                relative_path: i.to_string(),
                size_bytes: size,
                priority: chunk[0] % 10 + 1,
                description: None,
                estimated_tokens: estimate_tokens(size),
                source_entry: i,
            }
        })
        .collect();

    let total: u64 = candidates.iter().map(|c| c.estimated_tokens).sum();
    let packed = pack(candidates.clone(), Some(ceiling));

    let packed_count = packed.included.len() + packed.excluded.len();
    assert_eq!(packed_count, candidates.len());
    if total <= ceiling {
        assert_eq!(packed.included, candidates);
    } else {
        assert!(packed.included_tokens() <= ceiling);
    }
    assert!(
        packed
            .included
            .windows(2)
            .all(|w| w[0].source_entry < w[1].source_entry)
    );
});
