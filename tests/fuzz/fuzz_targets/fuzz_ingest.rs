#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing and replaying a log must not panic on any input.
    let project = covtrack::coverage::ProjectData::new();
    let _ = covtrack::ingest::ingest(data, &project);
    let _ = project.snapshot().counts();
});
