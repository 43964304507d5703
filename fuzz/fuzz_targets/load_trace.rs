#![no_main]
use libfuzzer_sys::fuzz_target;

use gl_trace::Trace;

// Whatever the input, loading must fail cleanly or produce a trace that
// saves to the same bytes every time.
fuzz_target!(|data: &[u8]| {
    let mut stream = data;
    if let Ok(trace) = Trace::load(&mut stream) {
        let mut saved = vec![];
        trace.save(&mut saved).expect("saving a loaded trace failed");
        let reloaded = Trace::load(&mut &saved[..]).expect("reloading a saved trace failed");
        let mut resaved = vec![];
        reloaded.save(&mut resaved).expect("saving a reloaded trace failed");
        assert_eq!(saved, resaved);
    }
});
