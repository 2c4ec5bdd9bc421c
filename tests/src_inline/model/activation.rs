use ndarray::{Array2, array};

use super::Activation;

fn applied(activation: Activation, values: &[f32]) -> Vec<f32> {
    let mut x = Array2::from_shape_vec((1, values.len()), values.to_vec()).unwrap();
    activation.apply(&mut x);
    x.iter().copied().collect()
}

#[test]
fn test_names_deserialize_like_keras() {
    let names: Vec<Activation> =
        serde_json::from_str(r#"["linear", "relu", "hard_sigmoid", "softmax", "selu"]"#).unwrap();
    assert_eq!(
        names,
        vec![
            Activation::Linear,
            Activation::Relu,
            Activation::HardSigmoid,
            Activation::Softmax,
            Activation::Selu
        ]
    );
    assert!(serde_json::from_str::<Activation>(r#""gelu_fast""#).is_err());
}

#[test]
fn test_relu_and_linear() {
    assert_eq!(applied(Activation::Relu, &[-1.0, 0.0, 2.0]), vec![0.0, 0.0, 2.0]);
    assert_eq!(applied(Activation::Linear, &[-1.0, 3.5]), vec![-1.0, 3.5]);
}

#[test]
fn test_sigmoid_is_bounded_and_stable() {
    let out = applied(Activation::Sigmoid, &[-1000.0, 0.0, 1000.0]);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[1], 0.5);
    assert_eq!(out[2], 1.0);
}

#[test]
fn test_hard_sigmoid_clips() {
    assert_eq!(
        applied(Activation::HardSigmoid, &[-5.0, 0.0, 1.0, 5.0]),
        vec![0.0, 0.5, 0.7, 1.0]
    );
}

#[test]
fn test_elu_selu_softplus_softsign_swish() {
    let elu = applied(Activation::Elu, &[-1.0, 2.0]);
    assert!((elu[0] - (-0.632_120_6)).abs() < 1e-6);
    assert_eq!(elu[1], 2.0);

    let selu = applied(Activation::Selu, &[1.0]);
    assert!((selu[0] - 1.050_701).abs() < 1e-6);

    let softplus = applied(Activation::Softplus, &[0.0, 100.0]);
    assert!((softplus[0] - std::f32::consts::LN_2).abs() < 1e-6);
    assert!((softplus[1] - 100.0).abs() < 1e-4);

    assert_eq!(applied(Activation::Softsign, &[1.0, -3.0]), vec![0.5, -0.75]);

    let swish = applied(Activation::Swish, &[0.0]);
    assert_eq!(swish[0], 0.0);
}

#[test]
fn test_softmax_rows_sum_to_one() {
    let mut x = array![[1.0f32, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
    Activation::Softmax.apply(&mut x);
    for row in x.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-6);
    }
    assert!(x[[0, 2]] > x[[0, 1]]);
    assert!((x[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
}
