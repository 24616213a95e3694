#![no_main]

use libfuzzer_sys::fuzz_target;
use reduct::event::TraceEvent;

fuzz_target!(|data: &[u8]| {
    // Tracer logs are read lossily, so every byte string is a possible line.
    // Parsing should not panic regardless of input
    let line = String::from_utf8_lossy(data);
    let _ = TraceEvent::parse(&line);
});
