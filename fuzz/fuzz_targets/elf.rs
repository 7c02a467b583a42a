#![no_main]

use libfuzzer_sys::fuzz_target;
use mipsweave::program::BinaryImage;

fuzz_target!(|data: &[u8]| {
    let _ = BinaryImage::from_elf(data);
});
