#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = pillbox_config::load_toml(data) {
        if cfg.validate().is_ok() {
            assert_eq!(cfg.containers.len(), pillbox_config::CONTAINER_COUNT);
        }
    }
});
