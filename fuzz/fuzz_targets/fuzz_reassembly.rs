#![no_main]

use cubelink::core::packet::{Packet, PACKET_LEN};
use cubelink::protocol::framer::{Envelope, Reassembler};
use cubelink::utils::crypto::Crypto;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary packet sequences must never panic the reassembler or envelope parser
    let crypto = Crypto::new(&[0x11; 16]);
    let mut reassembler = Reassembler::new();
    for chunk in data.chunks(PACKET_LEN) {
        let Ok(packet) = Packet::from_bytes(chunk) else {
            continue;
        };
        if let Some(done) = reassembler.push(&packet) {
            if done.encrypted {
                if let Ok(plain) = crypto.decrypt(&done.bytes) {
                    let _ = Envelope::open(&plain);
                }
            } else {
                let _ = Envelope::open(&done.bytes);
            }
        }
    }
});
