#![no_main]

use cubelink::schema::{compile_schema, Schema};
use libfuzzer_sys::fuzz_target;

const SCHEMA: &str = r#"[
  { "type": "Structure", "name": "Node", "members": [
    { "base": "string[uint_16]", "name": "label" },
    { "base": "float_32", "name": "weight" },
    { "base": "Node", "name": "children", "array": { "index": "uint_8", "size": 4 } }
  ] },
  { "type": "Union", "name": "Msg", "members": [
    { "base": "Node", "name": "tree" },
    { "base": "int_64", "name": "big", "value": 200 }
  ] }
]"#;

fuzz_target!(|data: &[u8]| {
    // Decoding hostile bytes must fail cleanly, and anything that decodes must re-encode
    let Ok(root) = compile_schema(&Schema::from_json(SCHEMA).expect("valid schema")) else {
        return;
    };
    let Ok(msg) = root.type_descriptor("Msg") else {
        return;
    };
    if let Ok(value) = msg.decode_slice(data) {
        let bytes = msg.encode_to_vec(&value).expect("decoded value re-encodes");
        assert_eq!(bytes.len(), msg.size_of(&value).expect("size_of"));
    }
});
