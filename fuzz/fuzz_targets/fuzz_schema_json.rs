#![no_main]

use cubelink::schema::{compile_schema, Schema};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary ASTs either compile or fail with an error, never panic
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(schema) = Schema::from_json(text) {
            let _ = compile_schema(&schema);
        }
    }
});
