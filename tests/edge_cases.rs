//! Edge case tests for the codec, framing and cipher

#![allow(clippy::unwrap_used)]

use cubelink::core::packet::{Control, Packet, PAYLOAD_LEN};
use cubelink::error::ProtocolError;
use cubelink::protocol::framer::{fragment, Envelope, Reassembler};
use cubelink::schema::{Primitive, TypeDescriptor, Value};
use cubelink::utils::crypto::{block_encrypt, Crypto};

fn prim(p: Primitive) -> TypeDescriptor {
    TypeDescriptor::Primitive(p)
}

#[test]
fn test_integer_boundaries() {
    let cases = [
        (Primitive::Int8, -128, 127),
        (Primitive::Uint8, 0, 255),
        (Primitive::Int16, -32768, 32767),
        (Primitive::Uint16, 0, 65535),
        (Primitive::Int32, i64::from(i32::MIN), i64::from(i32::MAX)),
        (Primitive::Uint32, 0, i64::from(u32::MAX)),
    ];
    for (p, min, max) in cases {
        let d = prim(p);
        for v in [min, max] {
            let bytes = d.encode_to_vec(&Value::Int(v)).unwrap();
            assert_eq!(d.decode_slice(&bytes).unwrap(), Value::Int(v));
        }
        assert!(matches!(
            d.encode_to_vec(&Value::Int(max + 1)),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            d.encode_to_vec(&Value::Int(min - 1)),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
    }
}

#[test]
fn test_little_endian_layout() {
    assert_eq!(
        prim(Primitive::Uint32).encode_to_vec(&Value::Int(0x0102_0304)).unwrap(),
        vec![4, 3, 2, 1]
    );
    assert_eq!(
        prim(Primitive::Int16).encode_to_vec(&Value::Int(-2)).unwrap(),
        vec![0xFE, 0xFF]
    );
}

#[test]
fn test_special_floats() {
    let d64 = prim(Primitive::Float64);
    for f in [f64::INFINITY, f64::NEG_INFINITY, f64::MAX, f64::MIN_POSITIVE] {
        let bytes = d64.encode_to_vec(&Value::Float(f)).unwrap();
        assert_eq!(d64.decode_slice(&bytes).unwrap(), Value::Float(f));
    }

    let nan = d64.encode_to_vec(&Value::Float(f64::NAN)).unwrap();
    match d64.decode_slice(&nan).unwrap() {
        Value::Float(f) => assert!(f.is_nan()),
        other => panic!("expected float, got {other:?}"),
    }

    let neg_zero = d64.encode_to_vec(&Value::Float(-0.0)).unwrap();
    match d64.decode_slice(&neg_zero).unwrap() {
        Value::Float(f) => assert!(f == 0.0 && f.is_sign_negative()),
        other => panic!("expected float, got {other:?}"),
    }

    let d32 = prim(Primitive::Float32);
    let bytes = d32.encode_to_vec(&Value::Float(1.5)).unwrap();
    assert_eq!(bytes.len(), 4);
    assert_eq!(d32.decode_slice(&bytes).unwrap(), Value::Float(1.5));

    for f in [f64::INFINITY, f64::NEG_INFINITY, f64::from(f32::MAX), f64::from(f32::MIN_POSITIVE)] {
        let bytes = d32.encode_to_vec(&Value::Float(f)).unwrap();
        assert_eq!(d32.decode_slice(&bytes).unwrap(), Value::Float(f));
    }

    let nan = d32.encode_to_vec(&Value::Float(f64::NAN)).unwrap();
    match d32.decode_slice(&nan).unwrap() {
        Value::Float(f) => assert!(f.is_nan()),
        other => panic!("expected float, got {other:?}"),
    }

    let neg_zero = d32.encode_to_vec(&Value::Float(-0.0)).unwrap();
    assert_eq!(neg_zero, vec![0, 0, 0, 0x80]);
    match d32.decode_slice(&neg_zero).unwrap() {
        Value::Float(f) => assert!(f == 0.0 && f.is_sign_negative()),
        other => panic!("expected float, got {other:?}"),
    }

    // not representable in f32: narrowed to the nearest value
    let bytes = d32.encode_to_vec(&Value::Float(0.1)).unwrap();
    assert_eq!(
        d32.decode_slice(&bytes).unwrap(),
        Value::Float(f64::from(0.1f32))
    );
}

#[test]
fn test_bool_and_void() {
    let b = prim(Primitive::Bool);
    assert_eq!(b.decode_slice(&[7]).unwrap(), Value::Bool(true));
    assert_eq!(b.decode_slice(&[0]).unwrap(), Value::Bool(false));

    let v = prim(Primitive::Void);
    assert!(v.encode_to_vec(&Value::Void).unwrap().is_empty());
    assert_eq!(v.decode_slice(&[]).unwrap(), Value::Void);
}

#[test]
fn test_empty_string_and_arrays() {
    let s = TypeDescriptor::string();
    assert_eq!(s.encode_to_vec(&Value::from("")).unwrap(), vec![0]);
    assert_eq!(s.decode_slice(&[0]).unwrap(), Value::from(""));

    let var = TypeDescriptor::variable_array(prim(Primitive::Uint8), Primitive::Uint16);
    assert_eq!(var.encode_to_vec(&Value::Array(vec![])).unwrap(), vec![0, 0]);

    let fixed = TypeDescriptor::fixed_array(prim(Primitive::Uint8), 0);
    assert!(fixed.encode_to_vec(&Value::Array(vec![])).unwrap().is_empty());
}

#[test]
fn test_string_too_long_for_index() {
    let s = TypeDescriptor::string();
    let long = "x".repeat(256);
    assert!(matches!(
        s.encode_to_vec(&Value::String(long)),
        Err(ProtocolError::ValueOutOfRange { .. })
    ));
}

#[test]
fn test_invalid_utf8_and_truncation() {
    let s = TypeDescriptor::string();
    assert!(matches!(
        s.decode_slice(&[2, 0xFF, 0xFE]),
        Err(ProtocolError::InvalidUtf8)
    ));
    assert!(matches!(
        s.decode_slice(&[5, b'a']),
        Err(ProtocolError::Truncated { .. })
    ));
    assert!(matches!(
        prim(Primitive::Uint32).decode_slice(&[1, 2]),
        Err(ProtocolError::Truncated {
            needed: 4,
            remaining: 2
        })
    ));
}

#[test]
fn test_type_mismatch() {
    assert!(matches!(
        prim(Primitive::Uint8).encode_to_vec(&Value::from("nope")),
        Err(ProtocolError::TypeMismatch { .. })
    ));
}

#[test]
fn test_empty_payload_frames_to_one_packet() {
    let packets = fragment(0, &[], None).unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(
        packets[0].control.bits(),
        Control::START | Control::END
    );
}

#[test]
fn test_fourteen_and_fifteen_byte_boundary() {
    assert_eq!(fragment(0, &[1; 14], None).unwrap().len(), 1);
    assert_eq!(fragment(0, &[1; 15], None).unwrap().len(), 2);
    assert_eq!(fragment(0, &[1; 255], None).unwrap().len(), 17);
}

#[test]
fn test_interleaved_start_restarts_message() {
    let long = fragment(1, &[9; 40], None).unwrap();
    let short = fragment(2, &[8; 3], None).unwrap();
    let mut r = Reassembler::new();
    assert!(r.push(&long[0]).is_none());
    assert!(r.push(&long[1]).is_none());
    let done = r.push(&short[0]).unwrap();
    let env = Envelope::open(&done.bytes).unwrap();
    assert_eq!(env.tag, 2);
    assert_eq!(env.payload, vec![8; 3]);
}

#[test]
fn test_packet_from_wrong_length() {
    assert!(matches!(
        Packet::from_bytes(&[0; PAYLOAD_LEN]),
        Err(ProtocolError::InvalidPacket(16))
    ));
}

#[test]
fn test_short_ciphertext_rejected() {
    let crypto = Crypto::new(&[1; 16]);
    assert!(matches!(
        crypto.decrypt(&[0; 15]),
        Err(ProtocolError::DecryptionFailure)
    ));
}

#[test]
fn test_block_mode_rejects_partial_blocks() {
    assert!(matches!(
        block_encrypt(&[0; 16], &[0; 17]),
        Err(ProtocolError::InvalidBlockLength(17))
    ));
    assert!(matches!(
        block_encrypt(&[0; 16], &[]),
        Err(ProtocolError::InvalidBlockLength(0))
    ));
}
