#![no_main]

#[macro_use]
extern crate arbitrary;

use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::Arbitrary;

use texture_layout::packer::*;
use texture_layout::*;

#[derive(Clone, Arbitrary, Debug)]
struct Mapping {
    w: u8,
    h: u8,
    flags: bool,
    fill: u8,
}

fuzz_target!(|input: (bool, Vec<Mapping>)| {
    let (repack, mappings) = input;
    let mappings: Vec<SourceMapping> = mappings
        .iter()
        .map(|m| {
            let size = size2(m.w as u32, m.h as u32);
            let texels = vec![m.fill; size.area() as usize];
            SourceMapping::new(size, m.flags as u32, texels)
        })
        .collect();

    let options = PackerOptions {
        texture_size: size2(256, 256),
        repack,
        ..PackerOptions::default()
    };

    let textures = pack(&mappings, &options).unwrap();

    let placed: usize = textures.iter().map(|t| t.placements().len()).sum();
    assert_eq!(placed, mappings.len());

    for texture in &textures {
        let size = texture.size();
        for placement in texture.placements() {
            let mapping = &mappings[placement.mapping];
            assert_eq!(mapping.flags, texture.flags());
            if !mapping.size.is_empty() {
                assert!(placement.origin.x + mapping.size.width <= size.width);
                assert!(placement.origin.y + mapping.size.height <= size.height);
            }
        }
    }
});
