//! Packing many mappings into atlas textures.
//!
//! Mappings are placed by decreasing size into the first pending texture that has room
//! for them, and new textures are opened as needed. When combining is enabled, a mapping
//! whose texels are identical or close enough to a mapping already placed in the texture
//! reuses its position instead of taking more space.

use std::cmp::Reverse;

use crate::metrics::{difference_array, root_mean_square_deviation};
use crate::{LayoutError, LayoutOptions, Point, Size, TextureLayout, size2};

/// Smallest side of the textures tried when repacking.
const MIN_REPACK_SIZE: u32 = 32;
/// Number of smaller power-of-two sizes tried before repacking at full size.
const MAX_REPACK_ATTEMPTS: u32 = 4;

/// Parameters of the packer.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PackerOptions {
    /// Size of the textures opened by the packer.
    ///
    /// Mappings that don't fit are given a texture of their own, rounded up to a power
    /// of two.
    ///
    /// Default value: 1024x1024.
    pub texture_size: Size,
    /// Smallest texture size.
    ///
    /// Default value: 4x4.
    pub min_texture_size: Size,
    /// Round texture sizes up to powers of two.
    ///
    /// Default value: true.
    pub power_of_two: bool,
    /// Align mappings on 4x4 blocks.
    ///
    /// Default value: true.
    pub align_by_four: bool,
    /// Let mappings share the texels of an identical or similar mapping.
    ///
    /// Default value: true.
    pub combine_similar_mappings: bool,
    /// Largest root mean square deviation of the texel difference for which two
    /// mappings are considered similar.
    ///
    /// Default value: 6.0.
    pub max_rmsd_for_combine: f64,
    /// Once everything is placed, try to repack each texture into a smaller square one.
    ///
    /// Default value: true.
    pub repack: bool,
}

impl Default for PackerOptions {
    fn default() -> Self {
        PackerOptions {
            texture_size: size2(1024, 1024),
            min_texture_size: size2(4, 4),
            power_of_two: true,
            align_by_four: true,
            combine_similar_mappings: true,
            max_rmsd_for_combine: 6.0,
            repack: true,
        }
    }
}

impl PackerOptions {
    fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            power_of_two: self.power_of_two,
            align_by_four: self.align_by_four,
        }
    }
}

/// A rectangle of texels to place in an atlas.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct SourceMapping {
    pub size: Size,
    /// Mappings can only share a texture, or texels, if their flags are equal.
    pub flags: u32,
    /// Raw texel bytes, compared when looking for similar mappings.
    pub texels: Vec<u8>,
}

impl SourceMapping {
    pub fn new(size: Size, flags: u32, texels: Vec<u8>) -> Self {
        SourceMapping { size, flags, texels }
    }
}

/// Where a mapping ended up in its texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Placement {
    /// Index of the mapping in the slice given to the packer.
    pub mapping: usize,
    pub origin: Point,
    /// The mapping reuses the texels of another placement, it doesn't need to be
    /// encoded.
    pub shared: bool,
}

/// A texture that has been partially allocated but not encoded yet.
#[derive(Clone)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PendingTexture {
    layout: TextureLayout,
    placements: Vec<Placement>,
    flags: u32,
}

impl PendingTexture {
    pub fn new(max_size: Size, flags: u32, options: &PackerOptions) -> Self {
        PendingTexture {
            layout: TextureLayout::with_options(
                options.min_texture_size,
                max_size,
                &options.layout_options(),
            ),
            placements: Vec::new(),
            flags,
        }
    }

    /// The size of the texture needed for the mappings placed so far.
    pub fn size(&self) -> Size {
        self.layout.size()
    }

    pub fn layout(&self) -> &TextureLayout {
        &self.layout
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn accepts(&self, mapping: &SourceMapping) -> bool {
        mapping.flags == self.flags
    }

    /// Place `mappings[index]` in this texture and return its position.
    ///
    /// If combining is enabled and a matching mapping was already placed, its position is
    /// reused and no space is allocated.
    pub fn try_add(
        &mut self,
        index: usize,
        mappings: &[SourceMapping],
        options: &PackerOptions,
    ) -> Result<Point, LayoutError> {
        let mapping = mappings
            .get(index)
            .ok_or(LayoutError::InvalidArgument("mapping index out of range"))?;

        if !self.accepts(mapping) {
            return Err(LayoutError::InvalidArgument("mapping flags don't match the texture"));
        }

        if options.combine_similar_mappings {
            if let Some(origin) = self.find_similar(mapping, mappings, options.max_rmsd_for_combine)? {
                self.placements.push(Placement { mapping: index, origin, shared: true });

                return Ok(origin);
            }
        }

        let origin = self.layout.add(mapping.size)?;
        self.placements.push(Placement { mapping: index, origin, shared: false });

        Ok(origin)
    }

    fn find_similar(
        &self,
        mapping: &SourceMapping,
        mappings: &[SourceMapping],
        max_rmsd: f64,
    ) -> Result<Option<Point>, LayoutError> {
        for placement in &self.placements {
            let packed = mappings
                .get(placement.mapping)
                .ok_or(LayoutError::InvalidArgument("placed mapping index out of range"))?;
            if packed.size != mapping.size || packed.flags != mapping.flags {
                continue;
            }

            if packed.texels == mapping.texels {
                log::debug!(
                    "exact shared mapping ({} texels) at ({}, {})",
                    mapping.size.area(), placement.origin.x, placement.origin.y,
                );
                return Ok(Some(placement.origin));
            }

            if let Some(rmsd) = mapping_rmsd(packed, mapping) {
                if rmsd <= max_rmsd {
                    log::debug!(
                        "approximately shared mapping (rmsd {}, {} texels) at ({}, {})",
                        rmsd, mapping.size.area(), placement.origin.x, placement.origin.y,
                    );
                    return Ok(Some(placement.origin));
                }
            }
        }

        Ok(None)
    }
}

/// Root mean square deviation of the byte-wise difference between two mappings'
/// texels, or `None` if their texels can't be compared.
pub fn mapping_rmsd(a: &SourceMapping, b: &SourceMapping) -> Option<f64> {
    if a.texels.is_empty() {
        return None;
    }

    let differences = difference_array(&a.texels, &b.texels).ok()?;

    root_mean_square_deviation(&differences).ok()
}

/// Place every mapping in as few textures as possible.
///
/// Mappings are considered by decreasing size. Each one goes to the first texture that
/// accepts it, and a new texture is opened when none does.
pub fn pack(mappings: &[SourceMapping], options: &PackerOptions) -> Result<Vec<PendingTexture>, LayoutError> {
    let mut order: Vec<usize> = (0..mappings.len()).collect();
    sort_by_size(&mut order, mappings);

    let mut textures: Vec<PendingTexture> = Vec::new();
    for index in order {
        place_mapping(&mut textures, index, mappings, options)?;
    }

    if options.repack {
        if let Err(err) = repack(&mut textures, mappings, options) {
            log::warn!("keeping the original textures, repacking failed: {}", err);
        }
    }

    Ok(textures)
}

/// Repack the mappings of each texture into the smallest texture that holds them.
///
/// Square sizes from `texture_size / 16` (at least 32) up to `texture_size / 2` are tried
/// first, then the texture's original size. If a texture can't be repacked at all, the
/// textures are left untouched.
pub fn repack(
    textures: &mut Vec<PendingTexture>,
    mappings: &[SourceMapping],
    options: &PackerOptions,
) -> Result<(), LayoutError> {
    let mut repacked = Vec::with_capacity(textures.len());

    for (texture_index, texture) in textures.iter().enumerate() {
        let mut order: Vec<usize> = texture.placements.iter().map(|p| p.mapping).collect();
        sort_by_size(&mut order, mappings);

        let full_size = texture.layout.max_size();
        let mut result = None;
        for attempt in 0..=MAX_REPACK_ATTEMPTS {
            let size = if attempt == MAX_REPACK_ATTEMPTS {
                full_size
            } else {
                let shift = MAX_REPACK_ATTEMPTS - attempt;
                size2(
                    (options.texture_size.width >> shift).max(MIN_REPACK_SIZE),
                    (options.texture_size.height >> shift).max(MIN_REPACK_SIZE),
                )
                .min(full_size)
            };

            if let Some(candidate) = fill_texture(&order, size, texture.flags, mappings, options) {
                result = Some(candidate);
                break;
            }
        }

        match result {
            Some(candidate) => {
                log::debug!(
                    "repacked texture {} from {}x{} to {}x{}",
                    texture_index,
                    texture.size().width, texture.size().height,
                    candidate.size().width, candidate.size().height,
                );
                repacked.push(candidate);
            }
            None => {
                return Err(LayoutError::AllocationFailed {
                    width: full_size.width,
                    height: full_size.height,
                });
            }
        }
    }

    *textures = repacked;

    Ok(())
}

fn place_mapping(
    textures: &mut Vec<PendingTexture>,
    index: usize,
    mappings: &[SourceMapping],
    options: &PackerOptions,
) -> Result<(), LayoutError> {
    let mapping = &mappings[index];

    for texture in textures.iter_mut() {
        if !texture.accepts(mapping) {
            continue;
        }

        match texture.try_add(index, mappings, options) {
            Ok(_) => return Ok(()),
            Err(LayoutError::AllocationFailed { .. }) => {}
            Err(err) => return Err(err),
        }
    }

    let size = new_texture_size(mapping.size, options);
    log::debug!(
        "opening texture {} of {}x{} for a {}x{} mapping",
        textures.len(), size.width, size.height, mapping.size.width, mapping.size.height,
    );

    let mut texture = PendingTexture::new(size, mapping.flags, options);
    texture.try_add(index, mappings, options)?;
    textures.push(texture);

    Ok(())
}

fn fill_texture(
    order: &[usize],
    size: Size,
    flags: u32,
    mappings: &[SourceMapping],
    options: &PackerOptions,
) -> Option<PendingTexture> {
    let mut texture = PendingTexture::new(size, flags, options);
    for &index in order {
        texture.try_add(index, mappings, options).ok()?;
    }

    Some(texture)
}

/// The configured texture size, or a texture of the mapping's size rounded up to a
/// power of two if it doesn't fit.
fn new_texture_size(mapping: Size, options: &PackerOptions) -> Size {
    let align = |v: u32| if options.align_by_four { v.saturating_add(3) & !3 } else { v };
    let (w, h) = (align(mapping.width), align(mapping.height));

    let size = options.texture_size;
    if w <= size.width && h <= size.height {
        return size;
    }

    size2(
        w.checked_next_power_of_two().unwrap_or(w),
        h.checked_next_power_of_two().unwrap_or(h),
    )
}

/// Stable sort by decreasing largest side.
fn sort_by_size(order: &mut [usize], mappings: &[SourceMapping]) {
    order.sort_by_key(|&i| {
        let size = mappings[i].size;
        Reverse(size.width.max(size.height))
    });
}

#[cfg(test)]
fn solid(w: u32, h: u32, value: u8) -> SourceMapping {
    SourceMapping::new(size2(w, h), 0, vec![value; (w * h) as usize])
}

#[cfg(test)]
fn no_repack() -> PackerOptions {
    PackerOptions {
        repack: false,
        ..PackerOptions::default()
    }
}

#[test]
fn identical_mappings_are_shared() {
    let mappings = vec![solid(16, 16, 10), solid(16, 16, 10)];
    let textures = pack(&mappings, &no_repack()).unwrap();

    assert_eq!(textures.len(), 1);
    let placements = textures[0].placements();
    assert_eq!(placements.len(), 2);
    assert!(!placements[0].shared);
    assert!(placements[1].shared);
    assert_eq!(placements[0].origin, placements[1].origin);
    assert_eq!(textures[0].layout().allocated_space(), 16 * 16);
}

#[test]
fn similar_mappings_are_shared() {
    // A constant offset doesn't deviate from the mean difference.
    let mappings = vec![solid(8, 8, 100), solid(8, 8, 140)];
    let textures = pack(&mappings, &no_repack()).unwrap();
    assert_eq!(textures[0].layout().allocated_space(), 8 * 8);
    assert!(textures[0].placements()[1].shared);

    let noisy: Vec<u8> = (0..64).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
    let mappings = vec![solid(8, 8, 0), SourceMapping::new(size2(8, 8), 0, noisy)];
    let textures = pack(&mappings, &no_repack()).unwrap();
    assert_eq!(textures.len(), 1);
    assert_eq!(textures[0].layout().allocated_space(), 2 * 8 * 8);
    assert!(textures[0].placements().iter().all(|p| !p.shared));
}

#[test]
fn combining_disabled() {
    let options = PackerOptions {
        combine_similar_mappings: false,
        ..no_repack()
    };
    let mappings = vec![solid(16, 16, 10), solid(16, 16, 10)];
    let textures = pack(&mappings, &options).unwrap();

    let placements = textures[0].placements();
    assert_ne!(placements[0].origin, placements[1].origin);
    assert_eq!(textures[0].layout().allocated_space(), 2 * 16 * 16);
}

#[test]
fn flags_are_not_mixed() {
    let mut other = solid(16, 16, 10);
    other.flags = 1;
    let mappings = vec![solid(16, 16, 10), other];
    let textures = pack(&mappings, &no_repack()).unwrap();

    assert_eq!(textures.len(), 2);
    assert_eq!(textures[0].flags(), 0);
    assert_eq!(textures[1].flags(), 1);
    assert!(textures.iter().all(|t| t.placements().len() == 1 && !t.placements()[0].shared));
}

#[test]
fn overflow_opens_new_textures() {
    let options = PackerOptions {
        texture_size: size2(64, 64),
        combine_similar_mappings: false,
        ..no_repack()
    };
    let mappings: Vec<SourceMapping> = (0..5).map(|i| solid(32, 32, i)).collect();
    let textures = pack(&mappings, &options).unwrap();

    assert_eq!(textures.len(), 2);
    assert_eq!(textures[0].placements().len(), 4);
    assert_eq!(textures[1].placements().len(), 1);
    assert_eq!(textures[0].size(), size2(64, 64));
    assert_eq!(textures[1].size(), size2(32, 32));
}

#[test]
fn oversized_mapping() {
    let options = PackerOptions {
        texture_size: size2(64, 64),
        ..no_repack()
    };
    let mappings = vec![solid(100, 20, 0)];
    let textures = pack(&mappings, &options).unwrap();

    assert_eq!(textures.len(), 1);
    assert_eq!(textures[0].layout().max_size(), size2(128, 32));
    assert_eq!(textures[0].placements()[0].origin, crate::point2(0, 0));
}

#[test]
fn largest_first() {
    let mappings = vec![solid(8, 8, 1), solid(32, 32, 2), solid(4, 40, 3)];
    let textures = pack(&mappings, &no_repack()).unwrap();

    let order: Vec<usize> = textures[0].placements().iter().map(|p| p.mapping).collect();
    assert_eq!(order, vec![2, 1, 0]);
    assert_eq!(textures[0].placements()[0].origin, crate::point2(0, 0));
}

#[test]
fn repack_shrinks_textures() {
    let mappings = vec![solid(20, 20, 0), solid(12, 12, 1)];

    let textures = pack(&mappings, &no_repack()).unwrap();
    assert_eq!(textures[0].layout().max_size(), size2(1024, 1024));

    let textures = pack(&mappings, &PackerOptions::default()).unwrap();
    assert_eq!(textures.len(), 1);
    assert_eq!(textures[0].layout().max_size(), size2(64, 64));
    assert_eq!(textures[0].placements().len(), 2);
}

#[test]
fn repack_falls_back_to_full_size() {
    let options = PackerOptions {
        texture_size: size2(256, 256),
        combine_similar_mappings: false,
        ..PackerOptions::default()
    };
    // Only fits at the full size.
    let mappings: Vec<SourceMapping> = (0..3).map(|i| solid(128, 128, i)).collect();
    let textures = pack(&mappings, &options).unwrap();

    assert_eq!(textures.len(), 1);
    assert_eq!(textures[0].layout().max_size(), size2(256, 256));
    assert_eq!(textures[0].placements().len(), 3);
}

#[test]
fn try_add_rejects_bad_input() {
    let options = no_repack();
    let mappings = vec![solid(8, 8, 0)];
    let mut texture = PendingTexture::new(size2(64, 64), 3, &options);

    assert!(matches!(texture.try_add(0, &mappings, &options), Err(LayoutError::InvalidArgument(_))));
    assert!(matches!(texture.try_add(5, &mappings, &options), Err(LayoutError::InvalidArgument(_))));
    assert!(texture.placements().is_empty());
}

#[test]
fn try_add_rejects_shorter_mapping_list() {
    let options = no_repack();
    let mappings = vec![solid(8, 8, 0), solid(8, 8, 1), solid(4, 4, 2)];
    let mut texture = PendingTexture::new(size2(64, 64), 0, &options);

    assert!(texture.try_add(2, &mappings, &options).is_ok());

    // The placement above refers to an index this list doesn't have.
    let shorter = vec![solid(4, 4, 2)];
    assert!(matches!(texture.try_add(0, &shorter, &options), Err(LayoutError::InvalidArgument(_))));
    assert_eq!(texture.placements().len(), 1);
}

#[test]
fn incompatible_texels() {
    let a = solid(4, 4, 0);
    let mut b = solid(4, 4, 0);
    b.texels.pop();
    let empty = SourceMapping::new(size2(4, 4), 0, Vec::new());

    assert_eq!(mapping_rmsd(&a, &b), None);
    assert_eq!(mapping_rmsd(&empty, &empty), None);
    assert_eq!(mapping_rmsd(&a, &a), Some(0.0));
}
