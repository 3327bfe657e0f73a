#![no_main]

#[macro_use]
extern crate arbitrary;

use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::Arbitrary;

use texture_layout::*;

#[derive(Copy, Clone, Arbitrary, Debug)]
enum Evt {
    Add(u16, u16),
    Remove(usize),
}

fuzz_target!(|input: (bool, bool, Vec<Evt>)| {
    let (power_of_two, align_by_four, events) = input;
    let mut layout = TextureLayout::with_options(
        size2(16, 16),
        size2(2048, 2048),
        &LayoutOptions {
            power_of_two,
            align_by_four,
        },
    );

    let mut elements: Vec<Rectangle> = Vec::new();
    let mut prev_size = layout.size();

    for evt in &events {
        match *evt {
            Evt::Add(w, h) => {
                let size = size2(w as u32, h as u32);
                if let Ok(origin) = layout.add(size) {
                    if size.is_empty() {
                        assert_eq!(origin, point2(0, 0));
                        continue;
                    }

                    let rect = Rectangle {
                        min: origin,
                        max: point2(origin.x + size.width, origin.y + size.height),
                    };

                    assert!(rect.max.x <= layout.width());
                    assert!(rect.max.y <= layout.height());
                    for previous in &elements {
                        assert!(!rect.intersects(previous));
                    }

                    elements.push(rect);
                }
            }
            Evt::Remove(idx) => {
                if !elements.is_empty() {
                    let idx = idx % elements.len();
                    let rect = elements.swap_remove(idx);

                    assert!(layout.remove(rect.min, rect.size()));
                    assert!(!layout.remove(rect.min, rect.size()));
                }
            }
        }

        let size = layout.size();
        assert!(size.width >= prev_size.width && size.height >= prev_size.height);
        if power_of_two {
            assert!(size.width.is_power_of_two() && size.height.is_power_of_two());
        }
        prev_size = size;
    }

    for rect in elements {
        assert!(layout.remove(rect.min, rect.size()));
    }

    assert!(layout.is_empty());
    assert_eq!(layout.allocated_space(), 0);
});
