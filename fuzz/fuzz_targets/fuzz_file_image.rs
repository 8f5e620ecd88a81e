#![no_main]
use isam::{FileConfig, Geometry, IndexedFile, MemoryStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = FileConfig::new().with_geometry(Geometry::new(4, 3, 3));
    let store = match MemoryStore::from_bytes(data, config.geometry.block_size()) {
        Ok(store) => store,
        Err(_) => return,
    };
    let file = match IndexedFile::from_store(store, config) {
        Ok(file) => file,
        Err(_) => return,
    };

    // Damaged images may fail, but must never panic or loop
    let _ = file.check();
    let _ = file.locate(b"0000");
    let _ = file.lookup(b"zzzz");
    if let Ok(scan) = file.list(b"\0", b"\xff\xff\xff\xff") {
        for entry in scan {
            if entry.is_err() {
                break;
            }
        }
    }
});
