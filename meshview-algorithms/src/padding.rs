//! Power-of-two padding of volume samples for texture upload

use meshview_core::{Error, Result, VolumeField};
use std::borrow::Cow;

/// Volume samples laid out on power-of-two dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedVolume<'a> {
    /// Power-of-two dimensions of `data`
    pub dimensions: [usize; 3],
    /// Dimensions of the valid region in the lower corner
    pub source_dimensions: [usize; 3],
    pub components: usize,
    /// Fraction of the texture covered by the source on each axis
    pub max_texture_coordinates: [f32; 3],
    pub data: Cow<'a, [f32]>,
}

impl PaddedVolume<'_> {
    /// Whether padding required a copy
    pub fn is_copy(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }
}

/// Smallest power of two that is at least `n` (and at least 1)
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Pad the scalars of `field` to power-of-two dimensions
///
/// Samples outside the source extent are zero. When every axis already is a
/// power of two the scalars are borrowed unchanged and the texture
/// coordinate limits are `(1, 1, 1)`.
///
/// # Errors
/// * `Error::MissingAttribute` if the field has no scalars
pub fn pad_to_power_of_two(field: &VolumeField) -> Result<PaddedVolume<'_>> {
    let scalars = field
        .scalars()
        .ok_or_else(|| Error::MissingAttribute("volume has no point scalars".to_string()))?;
    let source = field.dimensions;
    let padded = source.map(next_power_of_two);
    let components = scalars.components;
    let max_texture_coordinates = [
        source[0] as f32 / padded[0] as f32,
        source[1] as f32 / padded[1] as f32,
        source[2] as f32 / padded[2] as f32,
    ];

    if padded == source {
        return Ok(PaddedVolume {
            dimensions: padded,
            source_dimensions: source,
            components,
            max_texture_coordinates,
            data: Cow::Borrowed(&scalars.values),
        });
    }

    log::debug!("padding volume {:?} to {:?}", source, padded);
    let mut data = vec![0.0f32; padded.iter().product::<usize>() * components];
    let row = source[0] * components;
    for k in 0..source[2] {
        for j in 0..source[1] {
            let src = (source[0] * (j + source[1] * k)) * components;
            let dst = (padded[0] * (j + padded[1] * k)) * components;
            data[dst..dst + row].copy_from_slice(&scalars.values[src..src + row]);
        }
    }

    Ok(PaddedVolume {
        dimensions: padded,
        source_dimensions: source,
        components,
        max_texture_coordinates,
        data: Cow::Owned(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshview_core::DataArray;

    fn ramp_field(dims: [usize; 3], components: usize) -> VolumeField {
        let n = dims.iter().product::<usize>() * components;
        let values = (0..n).map(|v| v as f32 + 1.0).collect();
        VolumeField::with_scalars(dims, DataArray::new("ramp", components, values)).unwrap()
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(5), 8);
        assert_eq!(next_power_of_two(64), 64);
    }

    #[test]
    fn test_padding_sizes_and_scale() {
        let field = ramp_field([5, 3, 8], 1);
        let padded = pad_to_power_of_two(&field).unwrap();
        assert_eq!(padded.dimensions, [8, 4, 8]);
        assert!(padded.is_copy());
        assert_relative_eq!(padded.max_texture_coordinates[0], 5.0 / 8.0);
        assert_relative_eq!(padded.max_texture_coordinates[1], 0.75);
        assert_relative_eq!(padded.max_texture_coordinates[2], 1.0);
        assert_eq!(padded.data.len(), 8 * 4 * 8);
    }

    #[test]
    fn test_padding_keeps_samples_in_place() {
        let field = ramp_field([3, 2, 2], 3);
        let padded = pad_to_power_of_two(&field).unwrap();
        assert_eq!(padded.dimensions, [4, 2, 2]);
        let src = field.scalars().unwrap();
        for k in 0..2 {
            for j in 0..2 {
                for i in 0..4 {
                    let dst = (i + 4 * (j + 2 * k)) * 3;
                    let texel = &padded.data[dst..dst + 3];
                    if i < 3 {
                        assert_eq!(texel, src.tuple(field.index(i, j, k)));
                    } else {
                        assert_eq!(texel, &[0.0f32; 3]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_power_of_two_input_is_borrowed() {
        let field = ramp_field([4, 2, 1], 1);
        let padded = pad_to_power_of_two(&field).unwrap();
        assert!(!padded.is_copy());
        assert_eq!(padded.max_texture_coordinates, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_missing_scalars() {
        let field = VolumeField::new([2, 2, 2]);
        assert!(matches!(pad_to_power_of_two(&field), Err(Error::MissingAttribute(_))));
    }
}
