#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_wire::token::{TokenReader, build_token_stream, parse_token_stream};

fuzz_target!(|data: &[u8]| {
    // Whatever parses must build back to the same bytes.
    if let Ok(tokens) = parse_token_stream(data) {
        let rebuilt = build_token_stream(&tokens).unwrap();
        assert_eq!(&rebuilt[..], data);
    }

    let reader = TokenReader::new(bytes::Bytes::copy_from_slice(data));
    for token in reader {
        if token.is_err() {
            break;
        }
    }
});
