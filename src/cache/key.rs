//! Cache keys: parameter vectors, quantities, and qualifiers.
//!
//! Purpose
//! -------
//! Give every cached value a typed address. A value is identified by the
//! parameter vector it was computed for ([`ParameterKey`]) and by what it is
//! ([`EntryKey`] = [`Quantity`] + [`Qualifiers`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Two parameter vectors are the same key iff they have the same length and
//!   bitwise-identical components after folding `-0.0` into `0.0` and every
//!   NaN into one canonical NaN. No tolerance is applied.
//! - `ParameterKey` is cheap to clone (shared slice).
use ndarray::{Array1, ArrayView1};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Exact-match key for a model parameter vector.
#[derive(Debug, Clone)]
pub struct ParameterKey {
    values: Rc<[f64]>,
}

impl ParameterKey {
    pub fn new(values: &[f64]) -> Self {
        ParameterKey { values: Rc::from(values) }
    }

    pub fn from_view(values: ArrayView1<f64>) -> Self {
        ParameterKey { values: values.iter().copied().collect() }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(self.values.to_vec())
    }

    fn canonical_bits(&self) -> impl Iterator<Item = u64> + '_ {
        self.values.iter().map(|&x| canonical_bits(x))
    }
}

/// Bit pattern used for equality and hashing of one component.
fn canonical_bits(x: f64) -> u64 {
    if x == 0.0 {
        0
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}

impl PartialEq for ParameterKey {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.canonical_bits().eq(other.canonical_bits())
    }
}

impl Eq for ParameterKey {}

impl Hash for ParameterKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for bits in self.canonical_bits() {
            bits.hash(state);
        }
    }
}

impl From<&[f64]> for ParameterKey {
    fn from(values: &[f64]) -> Self {
        ParameterKey::new(values)
    }
}

/// Kind of model output stored in a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Model values at the observation sites.
    F,
    /// Jacobian at the observation sites.
    DF,
    /// Model values on the full box grid.
    FBoxes,
    /// Jacobian on the full box grid.
    DFBoxes,
}

impl Quantity {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Quantity::F => 0,
            Quantity::DF => 1,
            Quantity::FBoxes => 2,
            Quantity::DFBoxes => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Quantity::F),
            1 => Some(Quantity::DF),
            2 => Some(Quantity::FBoxes),
            3 => Some(Quantity::DFBoxes),
            _ => None,
        }
    }
}

/// Extra attributes stored next to a payload and compared on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Qualifiers {
    pub derivative_used: bool,
    pub time_dim: Option<usize>,
}

/// Typed address of one cached quantity for a given parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub quantity: Quantity,
    pub qualifiers: Qualifiers,
}

impl EntryKey {
    pub const fn f() -> Self {
        EntryKey {
            quantity: Quantity::F,
            qualifiers: Qualifiers { derivative_used: false, time_dim: None },
        }
    }

    pub const fn df() -> Self {
        EntryKey {
            quantity: Quantity::DF,
            qualifiers: Qualifiers { derivative_used: true, time_dim: None },
        }
    }

    pub const fn f_boxes(time_dim: usize) -> Self {
        EntryKey {
            quantity: Quantity::FBoxes,
            qualifiers: Qualifiers { derivative_used: false, time_dim: Some(time_dim) },
        }
    }

    pub const fn df_boxes(time_dim: usize) -> Self {
        EntryKey {
            quantity: Quantity::DFBoxes,
            qualifiers: Qualifiers { derivative_used: true, time_dim: Some(time_dim) },
        }
    }
}
