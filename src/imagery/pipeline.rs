//! Backend-agnostic description of the per-image band transformation chain.
//!
//! A [`Pipeline`] is an ordered list of named [`TransformStep`]s. Each step is a
//! list of [`BandOp`]s over a band-name-to-band mapping. Nothing here touches pixels:
//! the engine adapter translates a pipeline into the remote service's expression
//! language, and [`super::raster`] evaluates the same pipeline over small in-memory
//! rasters.

use regex::Regex;

/// Landsat 8 quality band.
pub const QA_BAND: &str = "QA_PIXEL";
/// Blue surface reflectance.
pub const BLUE: &str = "SR_B2";
/// Green surface reflectance.
pub const GREEN: &str = "SR_B3";
/// Red surface reflectance.
pub const RED: &str = "SR_B4";
/// Near-infrared surface reflectance.
pub const NIR: &str = "SR_B5";

/// Collection 2 surface reflectance scale factor.
pub const SR_SCALE: f64 = 0.0000275;
/// Collection 2 surface reflectance offset.
pub const SR_OFFSET: f64 = -0.2;
/// QA_PIXEL bit flagging cloud.
pub const QA_CLOUD_BIT: u32 = 3;
/// QA_PIXEL bit flagging cloud shadow.
pub const QA_CLOUD_SHADOW_BIT: u32 = 4;

/// Per-pixel band arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum BandExpr {
    /// Value of a named band.
    Band(String),
    /// Constant value.
    Constant(f64),
    /// Sum.
    Add(Box<BandExpr>, Box<BandExpr>),
    /// Difference.
    Subtract(Box<BandExpr>, Box<BandExpr>),
    /// Product.
    Multiply(Box<BandExpr>, Box<BandExpr>),
    /// Quotient.
    Divide(Box<BandExpr>, Box<BandExpr>),
    /// Integer bitwise AND with a mask.
    BitwiseAnd(Box<BandExpr>, u32),
    /// 1 where equal, else 0.
    Eq(Box<BandExpr>, Box<BandExpr>),
    /// 1 where both are non-zero, else 0.
    And(Box<BandExpr>, Box<BandExpr>),
}

impl BandExpr {
    /// Reference a band by name.
    pub fn band(name: impl Into<String>) -> Self {
        BandExpr::Band(name.into())
    }

    /// A constant.
    pub fn constant(value: f64) -> Self {
        BandExpr::Constant(value)
    }

    /// `self + rhs`.
    pub fn add(self, rhs: BandExpr) -> Self {
        BandExpr::Add(Box::new(self), Box::new(rhs))
    }

    /// `self - rhs`.
    pub fn subtract(self, rhs: BandExpr) -> Self {
        BandExpr::Subtract(Box::new(self), Box::new(rhs))
    }

    /// `self * rhs`.
    pub fn multiply(self, rhs: BandExpr) -> Self {
        BandExpr::Multiply(Box::new(self), Box::new(rhs))
    }

    /// `self / rhs`.
    pub fn divide(self, rhs: BandExpr) -> Self {
        BandExpr::Divide(Box::new(self), Box::new(rhs))
    }

    /// `self & mask`.
    pub fn bitwise_and(self, mask: u32) -> Self {
        BandExpr::BitwiseAnd(Box::new(self), mask)
    }

    /// `self == rhs`.
    pub fn equals(self, rhs: BandExpr) -> Self {
        BandExpr::Eq(Box::new(self), Box::new(rhs))
    }

    /// `self && rhs`.
    pub fn and(self, rhs: BandExpr) -> Self {
        BandExpr::And(Box::new(self), Box::new(rhs))
    }

    /// Normalized difference `(a - b) / (a + b)`.
    pub fn normalized_difference(a: &str, b: &str) -> Self {
        BandExpr::band(a)
            .subtract(BandExpr::band(b))
            .divide(BandExpr::band(a).add(BandExpr::band(b)))
    }

    /// Names of every band the expression reads, in first-use order.
    pub fn referenced_bands(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bands(&mut out);
        out
    }

    fn collect_bands<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            BandExpr::Band(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            BandExpr::Constant(_) => {}
            BandExpr::BitwiseAnd(inner, _) => inner.collect_bands(out),
            BandExpr::Add(a, b)
            | BandExpr::Subtract(a, b)
            | BandExpr::Multiply(a, b)
            | BandExpr::Divide(a, b)
            | BandExpr::Eq(a, b)
            | BandExpr::And(a, b) => {
                a.collect_bands(out);
                b.collect_bands(out);
            }
        }
    }
}

/// Band-name pattern with the remote service's anchored-regex semantics.
#[derive(Debug, Clone)]
pub struct BandSelector {
    pattern: String,
    regex: Regex,
}

impl BandSelector {
    /// Compile a selector. `SR_B.` matches `SR_B2` but not `SR_B10`.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The selector as written.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a band name is selected.
    pub fn matches(&self, band: &str) -> bool {
        self.regex.is_match(band)
    }
}

impl PartialEq for BandSelector {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// One image-to-image operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BandOp {
    /// Replace every selected band with `value * scale + offset`.
    Rescale {
        /// Bands to rewrite in place.
        selector: BandSelector,
        /// Multiplier.
        scale: f64,
        /// Additive offset.
        offset: f64,
    },
    /// Keep only pixels where `condition` is non-zero (and already valid).
    UpdateMask {
        /// Validity condition.
        condition: BandExpr,
    },
    /// Append a derived band.
    AddBand {
        /// Output band name.
        name: String,
        /// Band value.
        expr: BandExpr,
    },
}

/// Named group of operations applied to every image of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformStep {
    /// Step name, for logs and graph inspection.
    pub name: &'static str,
    /// Operations, applied in order.
    pub ops: Vec<BandOp>,
}

/// Ordered chain of transform steps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    steps: Vec<TransformStep>,
}

impl Pipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn then(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Steps in application order.
    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Scale factors, cloud mask, then NDVI and YI.
    pub fn bloom_detection() -> Self {
        Pipeline::new()
            .then(scale_factors())
            .then(cloud_mask())
            .then(spectral_indices())
    }
}

/// Convert Collection 2 digital numbers to surface reflectance.
pub fn scale_factors() -> TransformStep {
    TransformStep {
        name: "apply_scale_factors",
        ops: vec![BandOp::Rescale {
            selector: BandSelector::new("SR_B.").expect("static selector"),
            scale: SR_SCALE,
            offset: SR_OFFSET,
        }],
    }
}

/// Drop pixels flagged as cloud or cloud shadow.
pub fn cloud_mask() -> TransformStep {
    let clear = |bit: u32| {
        BandExpr::band(QA_BAND)
            .bitwise_and(1 << bit)
            .equals(BandExpr::constant(0.0))
    };

    TransformStep {
        name: "cloud_mask",
        ops: vec![BandOp::UpdateMask {
            condition: clear(QA_CLOUD_BIT).and(clear(QA_CLOUD_SHADOW_BIT)),
        }],
    }
}

/// Append NDVI and the yellowness index.
pub fn spectral_indices() -> TransformStep {
    let yi = BandExpr::band(RED)
        .add(BandExpr::band(GREEN))
        .divide(BandExpr::constant(2.0))
        .subtract(BandExpr::band(BLUE))
        .multiply(BandExpr::constant(100.0));

    TransformStep {
        name: "add_indices",
        ops: vec![
            BandOp::AddBand {
                name: "NDVI".to_string(),
                expr: BandExpr::normalized_difference(NIR, RED),
            },
            BandOp::AddBand {
                name: "YI".to_string(),
                expr: yi,
            },
        ],
    }
}
