use ndarray::{Array2, Axis};
use serde::Deserialize;

const SELU_ALPHA: f32 = 1.673_263_2;
const SELU_SCALE: f32 = 1.050_701;

/// Keras activation names as they appear in a layer config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Elu,
    Selu,
    Sigmoid,
    HardSigmoid,
    Tanh,
    Softplus,
    Softsign,
    Swish,
    Softmax,
}

impl Activation {
    pub fn apply(self, x: &mut Array2<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Relu => x.mapv_inplace(|v| v.max(0.0)),
            Activation::Elu => x.mapv_inplace(|v| if v > 0.0 { v } else { v.exp_m1() }),
            Activation::Selu => x.mapv_inplace(|v| {
                SELU_SCALE * if v > 0.0 { v } else { SELU_ALPHA * v.exp_m1() }
            }),
            Activation::Sigmoid => x.mapv_inplace(sigmoid),
            // Keras 2 piecewise form.
            Activation::HardSigmoid => x.mapv_inplace(|v| (0.2 * v + 0.5).clamp(0.0, 1.0)),
            Activation::Tanh => x.mapv_inplace(f32::tanh),
            Activation::Softplus => x.mapv_inplace(softplus),
            Activation::Softsign => x.mapv_inplace(|v| v / (1.0 + v.abs())),
            Activation::Swish => x.mapv_inplace(|v| v * sigmoid(v)),
            Activation::Softmax => softmax_rows(x),
        }
    }
}

fn sigmoid(v: f32) -> f32 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

fn softplus(v: f32) -> f32 {
    v.max(0.0) + (-v.abs()).exp().ln_1p()
}

fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.axis_iter_mut(Axis(0)) {
        let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/activation.rs"]
mod tests;
