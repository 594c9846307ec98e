/// The three canonical cross-sections. Each one fixes a single grid axis:
/// Sagittal fixes axis 0, Coronal axis 1 and Axial axis 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    Sagittal,
    Coronal,
    Axial,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Sagittal,
        Orientation::Coronal,
        Orientation::Axial,
    ];

    /// The grid axis held constant by this view.
    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Orientation::Sagittal => 0,
            Orientation::Coronal => 1,
            Orientation::Axial => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Sagittal => "sagittal",
            Orientation::Coronal => "coronal",
            Orientation::Axial => "axial",
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// Zoom applied by the scale resampler, either to every axis or per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScaleFactor {
    Uniform(f64),
    PerAxis([f64; 3]),
}

impl ScaleFactor {
    pub fn factors(self) -> [f64; 3] {
        match self {
            ScaleFactor::Uniform(f) => [f; 3],
            ScaleFactor::PerAxis(f) => f,
        }
    }

    pub fn is_identity(self) -> bool {
        self.factors().iter().all(|&f| f == 1.0)
    }
}

impl From<f64> for ScaleFactor {
    fn from(factor: f64) -> Self {
        ScaleFactor::Uniform(factor)
    }
}

impl From<[f64; 3]> for ScaleFactor {
    fn from(factors: [f64; 3]) -> Self {
        ScaleFactor::PerAxis(factors)
    }
}
