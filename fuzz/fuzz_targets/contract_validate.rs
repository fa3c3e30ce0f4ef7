#![no_main]

//! Fuzz target for contract validation over arbitrary field bags.

use libfuzzer_sys::fuzz_target;
use menusync_rules::{canonical_menu_item_contract, treez_raw_contract, Contract};
use menusync_types::fields::Fields;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(fields) = serde_json::from_str::<Fields>(s) else {
        return;
    };

    // Validation is total: any field bag yields violations, never a panic.
    let _ = treez_raw_contract().validate(&fields);
    let _ = canonical_menu_item_contract().validate(&fields);
});
