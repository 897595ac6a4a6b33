//! Fuzz target for source document splitting and decoding.
//!
//! Run with: cargo +nightly fuzz run fuzz_source_parser
//!
//! Feeds arbitrary text through `SourceDocument::parse()` and, when a
//! configuration decodes, through schema validation and re-serialization.

#![no_main]

use lmpctx_config::{ConfigFormat, SourceDocument};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let Ok(doc) = SourceDocument::parse("fuzz.lmp", &text) else {
        return;
    };
    if let Some(config) = doc.config {
        let _ = config.validate();
        for format in ConfigFormat::ALL {
            let _ = config.to_format(format);
        }
    }
});
