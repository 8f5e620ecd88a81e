#![no_main]
use isam::{Block, Geometry};
use libfuzzer_sys::fuzz_target;

// Small geometry so random inputs reach the record slots
const GEOMETRY: Geometry = Geometry::new(4, 3, 3);

fuzz_target!(|data: &[u8]| {
    let block = match Block::from_bytes(0, data, &GEOMETRY) {
        Ok(block) => block,
        Err(_) => return,
    };

    // Anything that decodes must encode and decode to the same block
    let bytes = block.to_bytes(&GEOMETRY).expect("decoded block re-encodes");
    let again = Block::from_bytes(0, &bytes, &GEOMETRY).expect("encoded block decodes");
    assert_eq!(block, again);
});
