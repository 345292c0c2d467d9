#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use pgcord::protocol::decode_message;

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);

    // Feed the buffer in a loop to simulate multiple messages arriving
    // in a single TCP segment.
    loop {
        match decode_message(&mut buf) {
            Ok(Some((_, consumed))) => {
                if consumed == 0 {
                    break;
                }
                let _ = buf.split_to(consumed);
            }
            Ok(None) | Err(_) => break,
        }
    }
});
