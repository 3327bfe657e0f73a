//! Numeric comparison of texel data.
//!
//! The packer compares a candidate mapping against the ones already placed in a texture
//! by computing the element-wise difference of their texels and measuring how much that
//! difference deviates from its mean. A constant offset between two images therefore
//! counts as no deviation at all.

use crate::LayoutError;

/// Element-wise difference `a[i] - b[i]`, widened to `f64`.
pub fn difference_array<T>(a: &[T], b: &[T]) -> Result<Vec<f64>, LayoutError>
where
    T: Copy + Into<f64>,
{
    let mut output = Vec::with_capacity(a.len());
    difference_array_into(a, b, &mut output)?;

    Ok(output)
}

/// Same as `difference_array`, writing into an existing buffer.
///
/// The buffer is cleared first, so it can be reused across comparisons.
pub fn difference_array_into<T>(a: &[T], b: &[T], output: &mut Vec<f64>) -> Result<(), LayoutError>
where
    T: Copy + Into<f64>,
{
    if a.len() != b.len() {
        return Err(LayoutError::InvalidArgument("sample arrays have different lengths"));
    }

    output.clear();
    output.extend(a.iter().zip(b).map(|(&a, &b)| {
        let (a, b): (f64, f64) = (a.into(), b.into());
        a - b
    }));

    Ok(())
}

/// Population root mean square deviation of the samples from their mean.
///
/// Fails with `InvalidArgument` if there are no samples.
pub fn root_mean_square_deviation(values: &[f64]) -> Result<f64, LayoutError> {
    if values.is_empty() {
        return Err(LayoutError::InvalidArgument("no samples"));
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_of_squares: f64 = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum();

    Ok((sum_of_squares / n).sqrt())
}

#[test]
fn difference() {
    assert_eq!(
        difference_array(&[10u8, 20, 30], &[1u8, 2, 3]),
        Ok(vec![9.0, 18.0, 27.0]),
    );
    assert_eq!(
        difference_array(&[1i32, 2], &[5i32, -2]),
        Ok(vec![-4.0, 4.0]),
    );
    assert_eq!(
        difference_array(&[0.5f32], &[0.25f32]),
        Ok(vec![0.25]),
    );
    assert_eq!(difference_array::<u8>(&[], &[]), Ok(vec![]));
}

#[test]
fn difference_length_mismatch() {
    assert!(matches!(
        difference_array(&[1u8, 2, 3], &[1u8, 2]),
        Err(LayoutError::InvalidArgument(_))
    ));

    let mut buffer = vec![1.0, 2.0];
    assert!(difference_array_into(&[1u8], &[], &mut buffer).is_err());
    // Left untouched on error.
    assert_eq!(buffer, vec![1.0, 2.0]);
}

#[test]
fn difference_reuses_buffer() {
    let mut buffer = Vec::new();
    difference_array_into(&[3u8, 4, 5, 6], &[1u8, 1, 1, 1], &mut buffer).unwrap();
    assert_eq!(buffer, vec![2.0, 3.0, 4.0, 5.0]);

    difference_array_into(&[200u8], &[255u8], &mut buffer).unwrap();
    assert_eq!(buffer, vec![-55.0]);
}

#[test]
fn rmsd() {
    assert_eq!(root_mean_square_deviation(&[5.0, 5.0, 5.0, 5.0]), Ok(0.0));
    assert_eq!(root_mean_square_deviation(&[42.0]), Ok(0.0));

    let value = root_mean_square_deviation(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    assert!((value - std::f64::consts::SQRT_2).abs() < 1e-12);

    let value = root_mean_square_deviation(&[-1.0, 1.0, -1.0, 1.0]).unwrap();
    assert!((value - 1.0).abs() < 1e-12);
}

#[test]
fn rmsd_empty() {
    assert_eq!(
        root_mean_square_deviation(&[]),
        Err(LayoutError::InvalidArgument("no samples")),
    );
}
