#![no_main]
use libfuzzer_sys::fuzz_target;
use pillbox_core::input::{CLOCK_ENTRY_DIGITS, DigitBuffer, parse_clock_entry};
use pillbox_traits::Key;

fuzz_target!(|data: &[u8]| {
    // Arbitrary key legends must never overflow the buffer or panic the parser.
    let mut buf = DigitBuffer::new(CLOCK_ENTRY_DIGITS);
    for c in data.iter().map(|b| char::from(*b)) {
        if let Some(key) = Key::from_char(c) {
            buf = buf.apply(key);
        }
        assert!(buf.as_str().len() <= CLOCK_ENTRY_DIGITS);
        if buf.is_complete() {
            let _ = parse_clock_entry(buf.as_str());
        }
    }
});
