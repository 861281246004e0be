//! In-memory evaluation of a [`Pipeline`] and median compositing.
//!
//! The remote service does the real work; this evaluator exists so the pipeline
//! definition can be checked against synthetic fixtures.

use std::collections::BTreeMap;

use crate::error::RasterError;

use super::pipeline::{BandExpr, BandOp, Pipeline, TransformStep};

/// Small multi-band image with a shared validity mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: BTreeMap<String, Vec<f64>>,
    mask: Vec<bool>,
}

impl Raster {
    /// Empty raster with every pixel valid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bands: BTreeMap::new(),
            mask: vec![true; width * height],
        }
    }

    /// Single-pixel raster from `(band, value)` pairs.
    pub fn pixel<'a>(values: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let mut raster = Raster::new(1, 1);
        for (name, value) in values {
            raster.bands.insert(name.to_string(), vec![value]);
        }
        raster
    }

    /// Add or replace a band.
    pub fn with_band(mut self, name: &str, values: Vec<f64>) -> Result<Self, RasterError> {
        self.set_band(name, values)?;
        Ok(self)
    }

    fn len(&self) -> usize {
        self.width * self.height
    }

    /// Values of a band.
    pub fn band(&self, name: &str) -> Result<&[f64], RasterError> {
        self.bands
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| RasterError::MissingBand(name.to_string()))
    }

    /// Per-pixel validity.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Value at `index` if the pixel is valid.
    pub fn valid_value(&self, name: &str, index: usize) -> Result<Option<f64>, RasterError> {
        let band = self.band(name)?;
        Ok(self.mask[index].then(|| band[index]))
    }

    fn set_band(&mut self, name: &str, values: Vec<f64>) -> Result<(), RasterError> {
        if values.len() != self.len() {
            return Err(RasterError::DimensionMismatch {
                band: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.bands.insert(name.to_string(), values);
        Ok(())
    }

    /// Evaluate an expression for every pixel.
    pub fn evaluate(&self, expr: &BandExpr) -> Result<Vec<f64>, RasterError> {
        for band in expr.referenced_bands() {
            self.band(band)?;
        }
        Ok((0..self.len()).map(|i| self.eval_at(expr, i)).collect())
    }

    // Band presence is checked in `evaluate`.
    fn eval_at(&self, expr: &BandExpr, i: usize) -> f64 {
        match expr {
            BandExpr::Band(name) => self.bands.get(name).map_or(f64::NAN, |b| b[i]),
            BandExpr::Constant(v) => *v,
            BandExpr::Add(a, b) => self.eval_at(a, i) + self.eval_at(b, i),
            BandExpr::Subtract(a, b) => self.eval_at(a, i) - self.eval_at(b, i),
            BandExpr::Multiply(a, b) => self.eval_at(a, i) * self.eval_at(b, i),
            BandExpr::Divide(a, b) => self.eval_at(a, i) / self.eval_at(b, i),
            BandExpr::BitwiseAnd(a, mask) => f64::from(self.eval_at(a, i) as u32 & mask),
            BandExpr::Eq(a, b) => bool_value(self.eval_at(a, i) == self.eval_at(b, i)),
            BandExpr::And(a, b) => {
                bool_value(self.eval_at(a, i) != 0.0 && self.eval_at(b, i) != 0.0)
            }
        }
    }

    /// Apply one operation.
    pub fn apply_op(mut self, op: &BandOp) -> Result<Self, RasterError> {
        match op {
            BandOp::Rescale {
                selector,
                scale,
                offset,
            } => {
                for (name, values) in self.bands.iter_mut() {
                    if selector.matches(name) {
                        values.iter_mut().for_each(|v| *v = *v * scale + offset);
                    }
                }
            }
            BandOp::UpdateMask { condition } => {
                let keep = self.evaluate(condition)?;
                for (valid, k) in self.mask.iter_mut().zip(keep) {
                    *valid = *valid && k != 0.0 && !k.is_nan();
                }
            }
            BandOp::AddBand { name, expr } => {
                let values = self.evaluate(expr)?;
                self.set_band(name, values)?;
            }
        }
        Ok(self)
    }
}

fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl TransformStep {
    /// Apply this step's operations in order.
    pub fn apply(&self, raster: Raster) -> Result<Raster, RasterError> {
        self.ops.iter().try_fold(raster, |r, op| r.apply_op(op))
    }
}

impl Pipeline {
    /// Apply every step in order.
    pub fn apply(&self, raster: Raster) -> Result<Raster, RasterError> {
        self.steps().iter().try_fold(raster, |r, step| step.apply(r))
    }
}

/// Per-pixel median over a stack of images, ignoring masked pixels.
///
/// Output bands are those of the first image; every image must carry them and share
/// its dimensions. A pixel with no valid observation stays masked.
pub fn median_composite(images: &[Raster]) -> Result<Raster, RasterError> {
    let first = images.first().ok_or(RasterError::EmptyCollection)?;
    for image in images {
        if (image.width, image.height) != (first.width, first.height) {
            return Err(RasterError::DimensionMismatch {
                band: "*".to_string(),
                expected: first.len(),
                actual: image.len(),
            });
        }
    }

    let mut out = Raster::new(first.width, first.height);
    for name in first.bands.keys() {
        let mut values = vec![f64::NAN; first.len()];
        for (i, slot) in values.iter_mut().enumerate() {
            let mut samples = Vec::with_capacity(images.len());
            for image in images {
                if let Some(v) = image.valid_value(name, i)? {
                    samples.push(v);
                }
            }
            if let Some(m) = median(&mut samples) {
                *slot = m;
            }
        }
        out.bands.insert(name.clone(), values);
    }

    for i in 0..first.len() {
        out.mask[i] = images.iter().any(|image| image.mask[i]);
    }

    Ok(out)
}

fn median(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some((samples[mid - 1] + samples[mid]) / 2.0)
    } else {
        Some(samples[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::pipeline::{cloud_mask, scale_factors, spectral_indices};

    const EPS: f64 = 1e-9;

    fn qa_pixel(qa: u32) -> Raster {
        Raster::pixel([("QA_PIXEL", f64::from(qa)), ("SR_B4", 0.1)])
    }

    #[test]
    fn cloud_bit_masks_pixel() {
        let out = cloud_mask().apply(qa_pixel(1 << 3)).unwrap();
        assert_eq!(out.mask(), &[false]);
    }

    #[test]
    fn shadow_bit_masks_pixel() {
        let out = cloud_mask().apply(qa_pixel(1 << 4)).unwrap();
        assert_eq!(out.mask(), &[false]);
    }

    #[test]
    fn clear_bits_keep_pixel() {
        // Bits 0..=2 and 5+ carry other flags and must not matter.
        let out = cloud_mask().apply(qa_pixel(0b1_0100_0111)).unwrap();
        assert_eq!(out.mask(), &[true]);
        let out = cloud_mask().apply(qa_pixel(0)).unwrap();
        assert_eq!(out.mask(), &[true]);
    }

    #[test]
    fn ndvi_and_yi_match_formulas() {
        let raster = Raster::pixel([
            ("SR_B5", 0.4),
            ("SR_B4", 0.2),
            ("SR_B3", 0.3),
            ("SR_B2", 0.1),
        ]);
        let out = spectral_indices().apply(raster).unwrap();
        assert!((out.band("NDVI").unwrap()[0] - 1.0 / 3.0).abs() < EPS);
        assert!((out.band("YI").unwrap()[0] - 15.0).abs() < EPS);
    }

    #[test]
    fn scale_factors_touch_only_reflectance_bands() {
        let raster = Raster::pixel([
            ("SR_B4", 10_000.0),
            ("QA_PIXEL", 21824.0),
            ("ST_B10", 5.0),
        ]);
        let out = scale_factors().apply(raster).unwrap();
        assert!((out.band("SR_B4").unwrap()[0] - 0.075).abs() < EPS);
        assert_eq!(out.band("QA_PIXEL").unwrap()[0], 21824.0);
        assert_eq!(out.band("ST_B10").unwrap()[0], 5.0);
    }

    #[test]
    fn full_pipeline_on_raw_pixel() {
        // DN for reflectance r is (r + 0.2) / 0.0000275.
        let dn = |r: f64| (r + 0.2) / 0.0000275;
        let raster = Raster::pixel([
            ("SR_B2", dn(0.1)),
            ("SR_B3", dn(0.3)),
            ("SR_B4", dn(0.2)),
            ("SR_B5", dn(0.4)),
            ("QA_PIXEL", 21824.0),
        ]);
        let out = Pipeline::bloom_detection().apply(raster).unwrap();
        assert_eq!(out.mask(), &[true]);
        assert!((out.band("NDVI").unwrap()[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((out.band("YI").unwrap()[0] - 15.0).abs() < 1e-6);
    }

    #[test]
    fn missing_band_is_reported() {
        let raster = Raster::pixel([("SR_B4", 0.2)]);
        let err = spectral_indices().apply(raster).unwrap_err();
        assert_eq!(err, RasterError::MissingBand("SR_B5".to_string()));
    }

    #[test]
    fn with_band_checks_dimensions() {
        let err = Raster::new(2, 2).with_band("SR_B4", vec![0.1]).unwrap_err();
        assert!(matches!(err, RasterError::DimensionMismatch { expected: 4, actual: 1, .. }));
    }

    #[test]
    fn median_skips_masked_pixels() {
        let mut cloudy = Raster::pixel([("YI", 90.0)]);
        cloudy.mask[0] = false;
        let images = vec![
            Raster::pixel([("YI", 10.0)]),
            cloudy,
            Raster::pixel([("YI", 30.0)]),
            Raster::pixel([("YI", 20.0)]),
        ];
        let out = median_composite(&images).unwrap();
        assert_eq!(out.band("YI").unwrap()[0], 20.0);
        assert_eq!(out.mask(), &[true]);
    }

    #[test]
    fn median_of_even_count_averages_middle() {
        let images = vec![
            Raster::pixel([("NDVI", 0.1)]),
            Raster::pixel([("NDVI", 0.4)]),
            Raster::pixel([("NDVI", 0.2)]),
            Raster::pixel([("NDVI", 0.3)]),
        ];
        let out = median_composite(&images).unwrap();
        assert!((out.band("NDVI").unwrap()[0] - 0.25).abs() < EPS);
    }

    #[test]
    fn fully_masked_pixel_stays_masked() {
        let mut a = Raster::pixel([("YI", 1.0)]);
        a.mask[0] = false;
        let out = median_composite(&[a]).unwrap();
        assert_eq!(out.mask(), &[false]);
        assert!(out.band("YI").unwrap()[0].is_nan());
    }

    #[test]
    fn median_rejects_transposed_shapes() {
        let wide = Raster::new(2, 3).with_band("YI", vec![1.0; 6]).unwrap();
        let tall = Raster::new(3, 2).with_band("YI", vec![2.0; 6]).unwrap();
        let err = median_composite(&[wide, tall]).unwrap_err();
        assert!(matches!(err, RasterError::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_stack_is_an_error() {
        assert_eq!(median_composite(&[]).unwrap_err(), RasterError::EmptyCollection);
    }
}
