#![no_main]

use libfuzzer_sys::fuzz_target;
use tune_tags::model::{SourceKind, SourceRecord};
use tune_tags::{decode, reconcile};

fuzz_target!(|data: &[u8]| {
    let Some(tag) = decode(data) else {
        return;
    };
    let merged = reconcile(&[SourceRecord::new(SourceKind::FrameDecoder, tag.clone())]);
    if let Some(title) = tag.title {
        assert_eq!(merged.title.as_deref(), Some(title.trim()));
    }
});
