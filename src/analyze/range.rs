//! Interval arithmetic for range propagation

use serde::{Deserialize, Serialize};

/// Closed value range `[min_val, max_val]` for interval arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    pub min_val: f64,
    pub max_val: f64,
}

impl Range {
    pub fn new(min_val: f64, max_val: f64) -> Self {
        Self { min_val, max_val }
    }

    /// Maximum absolute value in the range.
    pub fn magnitude(&self) -> f64 {
        self.min_val.abs().max(self.max_val.abs())
    }

    /// Width of the range.
    pub fn width(&self) -> f64 {
        self.max_val - self.min_val
    }
}

/// Observed range of a weight array. Empty input yields the zero range.
pub fn weight_range(weights: &[f32]) -> Range {
    if weights.is_empty() {
        return Range::default();
    }

    let mut min_val = weights[0] as f64;
    let mut max_val = weights[0] as f64;
    for &w in &weights[1..] {
        let v = w as f64;
        if v < min_val {
            min_val = v;
        }
        if v > max_val {
            max_val = v;
        }
    }
    Range { min_val, max_val }
}

/// Propagate a range through a linear layer.
///
/// The product range is the hull of the four endpoint products
/// {w_min·x_min, w_min·x_max, w_max·x_min, w_max·x_max}, scaled by fan-in
/// (worst case for a dot product of that length), with the bias range added
/// componentwise when present.
pub fn propagate_linear(
    input: &Range,
    weights: &Range,
    bias: Option<&Range>,
    fan_in: u32,
) -> Range {
    let products = [
        weights.min_val * input.min_val,
        weights.min_val * input.max_val,
        weights.max_val * input.min_val,
        weights.max_val * input.max_val,
    ];

    let mut prod_min = products[0];
    let mut prod_max = products[0];
    for &p in &products[1..] {
        if p < prod_min {
            prod_min = p;
        }
        if p > prod_max {
            prod_max = p;
        }
    }

    let n = fan_in as f64;
    let mut out = Range::new(prod_min * n, prod_max * n);

    if let Some(b) = bias {
        out.min_val += b.min_val;
        out.max_val += b.max_val;
    }

    out
}

/// Propagate a range through ReLU: [a, b] maps to [max(a,0), max(b,0)].
pub fn propagate_relu(input: &Range) -> Range {
    Range {
        min_val: input.min_val.max(0.0),
        max_val: input.max_val.max(0.0),
    }
}
