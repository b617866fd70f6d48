//! Parameter registration and storage.
//!
//! Each algorithm describes its parameters with [`ParamSpec`]s. Registering
//! an algorithm reserves a contiguous [`ParamRange`] in the [`ParameterBank`].
//! Values are stored in plain units; persistence uses the normalized `[0,1]`
//! form.

use std::ops::Range;

/// Value domain of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Int { min: i64, max: i64, default: i64 },
    Double { min: f64, max: f64, default: f64 },
    Enum { options: Vec<String>, default: usize },
}

/// Name and domain of a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn int(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Int { min, max, default },
        }
    }

    pub fn double(name: impl Into<String>, default: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Double { min, max, default },
        }
    }

    pub fn choice<S: Into<String>>(
        name: impl Into<String>,
        default: usize,
        options: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Enum {
                options: options.into_iter().map(Into::into).collect(),
                default,
            },
        }
    }

    pub fn default_value(&self) -> f64 {
        match &self.kind {
            ParamKind::Int { default, .. } => *default as f64,
            ParamKind::Double { default, .. } => *default,
            ParamKind::Enum { default, .. } => *default as f64,
        }
    }

    fn bounds(&self) -> (f64, f64) {
        match &self.kind {
            ParamKind::Int { min, max, .. } => (*min as f64, *max as f64),
            ParamKind::Double { min, max, .. } => (*min, *max),
            ParamKind::Enum { options, .. } => (0.0, options.len().saturating_sub(1) as f64),
        }
    }

    fn is_discrete(&self) -> bool {
        !matches!(self.kind, ParamKind::Double { .. })
    }

    /// Clamp to the domain, rounding discrete kinds.
    pub fn constrain(&self, value: f64) -> f64 {
        let (min, max) = self.bounds();
        let v = if value.is_nan() { min } else { value.clamp(min, max) };
        if self.is_discrete() {
            v.round()
        } else {
            v
        }
    }

    pub fn to_normalized(&self, value: f64) -> f64 {
        let (min, max) = self.bounds();
        if max <= min {
            return 0.0;
        }
        ((self.constrain(value) - min) / (max - min)).clamp(0.0, 1.0)
    }

    pub fn from_normalized(&self, normalized: f64) -> f64 {
        let (min, max) = self.bounds();
        let n = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        self.constrain(min + n * (max - min))
    }

    /// Label for an enum value, if this is an enum parameter.
    pub fn display_option(&self, value: f64) -> Option<&str> {
        match &self.kind {
            ParamKind::Enum { options, .. } => {
                options.get(self.constrain(value) as usize).map(String::as_str)
            }
            _ => None,
        }
    }
}

/// Contiguous block of parameter indices owned by one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange {
    pub start: usize,
    pub len: usize,
}

impl ParamRange {
    /// Global index of the algorithm's `local`-th parameter.
    pub fn global(&self, local: usize) -> Option<usize> {
        (local < self.len).then_some(self.start + local)
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Flat store of every registered parameter.
#[derive(Debug, Clone, Default)]
pub struct ParameterBank {
    specs: Vec<ParamSpec>,
    values: Vec<f64>,
}

impl ParameterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a contiguous range for `specs`, initialised to their defaults.
    pub fn register(&mut self, specs: Vec<ParamSpec>) -> ParamRange {
        let start = self.specs.len();
        let len = specs.len();
        for spec in specs {
            self.values.push(spec.default_value());
            self.specs.push(spec);
        }
        ParamRange { start, len }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn spec(&self, index: usize) -> Option<&ParamSpec> {
        self.specs.get(index)
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Set a plain value. Returns the stored (constrained) value.
    pub fn set(&mut self, index: usize, value: f64) -> Option<f64> {
        let spec = self.specs.get(index)?;
        let v = spec.constrain(value);
        self.values[index] = v;
        Some(v)
    }

    pub fn get_normalized(&self, index: usize) -> Option<f64> {
        let spec = self.specs.get(index)?;
        Some(spec.to_normalized(self.values[index]))
    }

    pub fn set_normalized(&mut self, index: usize, normalized: f64) -> Option<f64> {
        let spec = self.specs.get(index)?;
        let v = spec.from_normalized(normalized);
        self.values[index] = v;
        Some(v)
    }

    /// Copy of the values in `range`, as handed to an algorithm.
    pub fn snapshot(&self, range: ParamRange) -> Vec<f64> {
        self.values
            .get(range.indices())
            .map(<[f64]>::to_vec)
            .unwrap_or_default()
    }
}
