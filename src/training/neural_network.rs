//! Neural Network (Multi-Layer Perceptron) implementation
//!
//! Feedforward binary classifier with one sigmoid hidden layer and one
//! sigmoid output unit. Binary cross-entropy loss with an L2 penalty on the
//! hidden-layer weights, trained with mini-batch Adam.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Ix1, Ix2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{PunctualityError, Result};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// Neural Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer size
    pub hidden_units: usize,
    /// Adam step size
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// L2 penalty on hidden-layer weights
    pub penalty: f64,
    /// Seed for weight init and batch shuffling
    pub random_state: u64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_units: 5,
            learning_rate: 0.01,
            max_epochs: 20,
            batch_size: 64,
            penalty: 0.0,
            random_state: 42,
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Adam moment buffers for one parameter tensor
#[derive(Debug, Clone)]
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(a: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(a.raw_dim()),
            v: Array::zeros(a.raw_dim()),
        }
    }

    /// Returns the step to add to the parameter
    fn step(&mut self, grad: &Array<f64, D>, lr: f64, t: i32) -> Array<f64, D> {
        self.m.zip_mut_with(grad, |m, g| *m = BETA1 * *m + (1.0 - BETA1) * g);
        self.v.zip_mut_with(grad, |v, g| *v = BETA2 * *v + (1.0 - BETA2) * g * g);
        let c1 = 1.0 - BETA1.powi(t);
        let c2 = 1.0 - BETA2.powi(t);
        let mut out = self.m.clone();
        out.zip_mut_with(&self.v, |m, v| *m = -lr * (*m / c1) / ((v / c2).sqrt() + EPSILON));
        out
    }
}

/// Weights of both layers
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layers {
    w_hidden: Array2<f64>,
    b_hidden: Array1<f64>,
    w_out: Array2<f64>,
    b_out: Array1<f64>,
}

struct Gradients {
    w_hidden: Array2<f64>,
    b_hidden: Array1<f64>,
    w_out: Array2<f64>,
    b_out: Array1<f64>,
}

/// Multi-Layer Perceptron Classifier for a 0/1 label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    layers: Option<Layers>,
    n_features: usize,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            layers: None,
            n_features: 0,
        }
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PunctualityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PunctualityError::TrainingError(
                "cannot fit a network on zero rows".to_string(),
            ));
        }
        if self.config.hidden_units == 0 || self.config.batch_size == 0 {
            return Err(PunctualityError::InvalidParameter {
                name: "hidden_units/batch_size".to_string(),
                value: format!("{}/{}", self.config.hidden_units, self.config.batch_size),
                reason: "layer size and batch size must be positive".to_string(),
            });
        }

        self.n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut layers = Self::initialize(self.n_features, self.config.hidden_units, &mut rng);

        let mut mw_hidden: Moments<Ix2> = Moments::zeros_like(&layers.w_hidden);
        let mut mb_hidden: Moments<Ix1> = Moments::zeros_like(&layers.b_hidden);
        let mut mw_out: Moments<Ix2> = Moments::zeros_like(&layers.w_out);
        let mut mb_out: Moments<Ix1> = Moments::zeros_like(&layers.b_out);

        let lr = self.config.learning_rate;
        let mut t = 0i32;
        let mut indices: Vec<usize> = (0..n_samples).collect();

        for _epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(self.config.batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch: Array1<f64> = batch.iter().map(|&i| y[i]).collect();

                let grads = self.backward(&layers, &x_batch, &y_batch);

                t = t.saturating_add(1);
                layers.w_hidden += &mw_hidden.step(&grads.w_hidden, lr, t);
                layers.b_hidden += &mb_hidden.step(&grads.b_hidden, lr, t);
                layers.w_out += &mw_out.step(&grads.w_out, lr, t);
                layers.b_out += &mb_out.step(&grads.b_out, lr, t);
            }
        }

        self.layers = Some(layers);
        Ok(())
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let layers = self.layers.as_ref().ok_or(PunctualityError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(PunctualityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let (_, out) = Self::forward(layers, x);
        Ok(out.column(0).to_owned())
    }

    /// Glorot uniform weights, zero biases
    fn initialize(n_in: usize, n_hidden: usize, rng: &mut Xoshiro256PlusPlus) -> Layers {
        let mut glorot = |rows: usize, cols: usize| {
            let limit = (6.0 / (rows + cols) as f64).sqrt();
            Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
        };
        let w_hidden = glorot(n_in, n_hidden);
        let w_out = glorot(n_hidden, 1);
        Layers {
            w_hidden,
            b_hidden: Array1::zeros(n_hidden),
            w_out,
            b_out: Array1::zeros(1),
        }
    }

    /// Hidden activations and output probabilities
    fn forward(layers: &Layers, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let hidden = (x.dot(&layers.w_hidden) + &layers.b_hidden).mapv(sigmoid);
        let out = (hidden.dot(&layers.w_out) + &layers.b_out).mapv(sigmoid);
        (hidden, out)
    }

    fn backward(&self, layers: &Layers, x: &Array2<f64>, y: &Array1<f64>) -> Gradients {
        let n = y.len() as f64;
        let (hidden, out) = Self::forward(layers, x);

        // sigmoid + cross-entropy: dL/dz = p - y
        let y_2d = y.clone().insert_axis(Axis(1));
        let delta_out = (&out - &y_2d) / n;
        let w_out = hidden.t().dot(&delta_out);
        let b_out = delta_out.sum_axis(Axis(0));

        let delta_hidden = delta_out.dot(&layers.w_out.t()) * hidden.mapv(|h| h * (1.0 - h));
        let mut w_hidden = x.t().dot(&delta_hidden);
        if self.config.penalty > 0.0 {
            w_hidden.scaled_add(2.0 * self.config.penalty, &layers.w_hidden);
        }
        let b_hidden = delta_hidden.sum_axis(Axis(0));

        Gradients {
            w_hidden,
            b_hidden,
            w_out,
            b_out,
        }
    }
}
