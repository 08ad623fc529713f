#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use textplay::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();
        // A surface that validates must also convert.
        if let Ok(loaded) = loader.load_str(yaml, Path::new("fuzz.yaml")) {
            assert!(loaded.config.to_spec().is_ok());
            assert!(loaded.config.timeline().is_ok());
        }
    }
});
