//! Read-only values computed from one or more registers
//!
//! A [`DerivedValue`] stores its transform next to the register paths it
//! depends on. Evaluation is pull-based: every call performs fresh reads of
//! the dependencies in declaration order, so a reader always sees a value
//! consistent with the hardware at the time of the call.

use crate::error::{RegisterError, Result};
use crate::map::AddressMap;

/// Pure function from dependency values to the derived value
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    /// `output = raw * scale` over a single dependency
    Linear { scale: f64 },
    /// Arbitrary pure function over all dependencies, in declaration order
    Function(fn(&[u32]) -> f64),
}

impl Transform {
    pub fn apply(&self, values: &[u32]) -> f64 {
        match self {
            Transform::Linear { scale } => values.first().map_or(0.0, |&raw| raw as f64 * scale),
            Transform::Function(f) => f(values),
        }
    }
}

/// How a derived value is rendered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    /// Fixed-point with the given number of decimals, e.g. `{:0.3f}`
    Fixed(usize),
}

impl DisplayFormat {
    pub fn format(&self, value: f64) -> String {
        match *self {
            DisplayFormat::Fixed(precision) => format!("{value:.precision$}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DerivedValue {
    name: String,
    description: Option<String>,
    dependencies: Vec<String>,
    transform: Transform,
    units: Option<String>,
    display: DisplayFormat,
}

impl DerivedValue {
    /// Declare a derived value over the registers at `dependencies`
    ///
    /// A `Linear` transform takes exactly one dependency.
    pub fn new(
        name: impl Into<String>,
        dependencies: Vec<String>,
        transform: Transform,
    ) -> Result<Self> {
        if dependencies.is_empty() {
            return Err(RegisterError::Layout(
                "derived value needs at least one dependency",
            ));
        }
        if matches!(transform, Transform::Linear { .. }) && dependencies.len() != 1 {
            return Err(RegisterError::Layout(
                "linear transform takes exactly one dependency",
            ));
        }

        Ok(Self {
            name: name.into(),
            description: None,
            dependencies,
            transform,
            units: None,
            display: DisplayFormat::Fixed(3),
        })
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_display(mut self, display: DisplayFormat) -> Self {
        self.display = display;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn display(&self) -> DisplayFormat {
        self.display
    }

    /// Apply the transform to already-read dependency values
    pub fn compute(&self, values: &[u32]) -> f64 {
        self.transform.apply(values)
    }

    /// Read every dependency through `map` and apply the transform
    ///
    /// The first failing read is returned as-is; no cached or default value
    /// is substituted.
    pub fn evaluate(&self, map: &AddressMap) -> Result<f64> {
        let values = self
            .dependencies
            .iter()
            .map(|path| map.read(path))
            .collect::<Result<Vec<u32>>>()?;
        Ok(self.compute(&values))
    }
}

/// A derived value's current reading, as exposed to tooling
#[derive(Debug)]
pub struct DerivedReading {
    pub name: String,
    pub value: Result<f64>,
    pub units: Option<String>,
    pub display: DisplayFormat,
}

impl DerivedReading {
    /// Render the value with its display format and units
    pub fn formatted(&self) -> String {
        match &self.value {
            Ok(value) => match &self.units {
                Some(units) => format!("{} {}", self.display.format(*value), units),
                None => self.display.format(*value),
            },
            Err(e) => format!("<error: {e}>"),
        }
    }
}
