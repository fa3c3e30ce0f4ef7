#![no_main]

//! Fuzz target for replay pack parsing.
//!
//! Fuzzes the `PackV1` deserialization and the version-switching loader
//! with arbitrary JSON bytes to ensure malformed input never panics.

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // The loader path: wire parse plus version switch - should never panic.
    let _ = menusync_replay::parse_pack(s);

    // Wire components individually.
    let _ = serde_json::from_str::<menusync_types::wire::PackV1>(s);
    let _ = serde_json::from_str::<menusync_types::pack::RuleOrderEntry>(s);
    let _ = serde_json::from_str::<menusync_types::lookups::LookupMaps>(s);
    let _ = serde_json::from_str::<menusync_types::item::Violations>(s);

    // If the wire parse succeeds, the conversion and re-serialization must
    // also hold up.
    if let Ok(wire) = serde_json::from_str::<menusync_types::wire::PackV1>(s) {
        let _ = serde_json::to_string(&wire);
        if let Ok(pack) = menusync_types::pack::ReplayPack::try_from(wire) {
            let round = menusync_types::wire::PackV1::from(&pack);
            let _ = serde_json::to_string_pretty(&round);
            let _ = pack.storage_key();
        }
    }
});
