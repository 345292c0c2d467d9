#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use pgcord::auth::ScramClient;

#[derive(Debug)]
struct ScramInput {
    username: String,
    password: String,
    server_first: String,
    server_final: String,
}

impl<'a> Arbitrary<'a> for ScramInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        Ok(Self {
            username: u.arbitrary()?,
            password: u.arbitrary()?,
            server_first: u.arbitrary()?,
            server_final: u.arbitrary()?,
        })
    }
}

fuzz_target!(|input: ScramInput| {
    let mut client = ScramClient::new(input.username, input.password);
    let _first = client.client_first();

    if let Ok((_, state)) = client.client_final(&input.server_first) {
        let _ = client.verify_server_final(&input.server_final, &state);
    }
});
