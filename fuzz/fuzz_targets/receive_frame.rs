#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut stream = data;
    match gl_trace::receive_frame(&mut stream) {
        Ok(trace) => assert!(!trace.packets.is_empty()),
        Err(_) => (),
    }
});
