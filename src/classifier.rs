use ndarray::{Array, ArrayBase, Data, Dimension, Zip};

use crate::LabelCode;
use crate::error::{Error, Result};

/// Linear calibration turning stored scanner samples into Hounsfield units.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Calibration {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        // rounded product plus rounded sum, never fused
        raw * self.slope + self.intercept
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

/// Half-open intensity interval `[low, high)` mapped to one class code.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassRange {
    pub low: f64,
    pub high: f64,
    pub code: LabelCode,
}

impl ClassRange {
    pub const fn new(low: f64, high: f64, code: LabelCode) -> Self {
        Self { low, high, code }
    }

    #[inline]
    pub fn contains(&self, hu: f64) -> bool {
        self.low <= hu && hu < self.high
    }
}

/// Ordered, non-overlapping set of [`ClassRange`]s.
///
/// The table is validated once when it is built; classification then trusts
/// it and never sorts or de-duplicates the ranges.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<ClassRange>", into = "Vec<ClassRange>")
)]
pub struct ClassRangeTable {
    ranges: Vec<ClassRange>,
}

impl ClassRangeTable {
    /// Build a table from ranges given in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRangeTable`] if the table is empty, a bound is
    /// NaN, a range is empty or reversed, or two ranges overlap or are out of
    /// order.
    pub fn new(ranges: Vec<ClassRange>) -> Result<Self> {
        Self::validate(&ranges)?;
        Ok(Self { ranges })
    }

    /// Tissue table used for CT scans: air, lung, adipose tissue, soft
    /// tissue, bone and teeth, coded 0 to 5.
    pub fn ct_tissue() -> Self {
        Self {
            ranges: vec![
                ClassRange::new(-3000.0, -901.0, 0),
                ClassRange::new(-901.0, -499.0, 1),
                ClassRange::new(-499.0, -1.0, 2),
                ClassRange::new(-1.0, 200.0, 3),
                ClassRange::new(200.0, 1700.0, 4),
                ClassRange::new(1700.0, 2000.0, 5),
            ],
        }
    }

    fn validate(ranges: &[ClassRange]) -> Result<()> {
        let invalid = |reason: String| Err(Error::InvalidRangeTable { reason });

        if ranges.is_empty() {
            return invalid("table is empty".to_string());
        }

        for (i, range) in ranges.iter().enumerate() {
            if range.low.is_nan() || range.high.is_nan() {
                return invalid(format!("range #{i} has a NaN bound"));
            }
            if range.low >= range.high {
                return invalid(format!(
                    "range #{i} [{}, {}) is empty",
                    range.low, range.high
                ));
            }
        }

        for (i, pair) in ranges.windows(2).enumerate() {
            if pair[1].low < pair[0].high {
                return invalid(format!(
                    "range #{} [{}, {}) overlaps or precedes range #{i} [{}, {})",
                    i + 1,
                    pair[1].low,
                    pair[1].high,
                    pair[0].low,
                    pair[0].high
                ));
            }
        }

        Ok(())
    }

    pub fn ranges(&self) -> &[ClassRange] {
        &self.ranges
    }

    /// Codes the table can produce, in table order.
    pub fn codes(&self) -> impl Iterator<Item = LabelCode> + '_ {
        self.ranges.iter().map(|range| range.code)
    }

    pub fn max_code(&self) -> LabelCode {
        self.codes().max().unwrap_or(0)
    }

    /// Code of the range containing `hu`, or 0 if no range does.
    #[inline]
    pub fn code_for(&self, hu: f64) -> LabelCode {
        // ranges are sorted by their upper bound
        let candidate = self.ranges.partition_point(|range| range.high <= hu);
        match self.ranges.get(candidate) {
            Some(range) if range.contains(hu) => range.code,
            _ => 0,
        }
    }

    /// Classify every sample of `raw` after applying `calibration`.
    pub fn classify<S, A, D>(
        &self,
        raw: &ArrayBase<S, D>,
        calibration: Calibration,
    ) -> Array<LabelCode, D>
    where
        S: Data<Elem = A>,
        A: Copy + Into<f64> + Sync,
        D: Dimension,
    {
        Zip::from(raw).par_map_collect(|&sample| self.code_for(calibration.apply(sample.into())))
    }
}

impl TryFrom<Vec<ClassRange>> for ClassRangeTable {
    type Error = Error;

    fn try_from(ranges: Vec<ClassRange>) -> Result<Self> {
        Self::new(ranges)
    }
}

impl From<ClassRangeTable> for Vec<ClassRange> {
    fn from(table: ClassRangeTable) -> Self {
        table.ranges
    }
}

impl Default for ClassRangeTable {
    fn default() -> Self {
        Self::ct_tissue()
    }
}
