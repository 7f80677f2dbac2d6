//! Class-conditional accuracy model fitted with expectation-maximisation.
//!
//! Each label function `j` gets a propensity (how often it votes) and two
//! accuracies: `alpha_j = P(positive vote | Y = 1)` and
//! `beta_j = P(negative vote | Y = 0)`, both conditional on voting. Votes are
//! assumed conditionally independent given the true class. Fitting uses
//! only agreement patterns between columns.
//!
//! Regularization shrinks the accuracies toward `prior_accuracy`: a strength
//! of `s` acts like `s` extra votes per label function cast at the prior
//! accuracy. Starting every accuracy above 0.5 fixes the sign ambiguity of
//! the latent class.

use std::time::{Duration, Instant};

use ndarray::ArrayView2;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    data::labels::Label,
    error::{Error, Result},
    model::{LabelModel, LfWeight, MarginalsProvider},
};

const ACCURACY_FLOOR: f64 = 1e-3;
const PRIOR_BOUNDS: (f64, f64) = (0.01, 0.99);

/// EM hyperparameters.
#[derive(Debug, Clone, Serialize)]
pub struct GenerativeModel {
    pub l2: f64,
    pub prior_accuracy: f64,
    pub initial_class_prior: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Wall-clock cap per fit; `None` bounds the fit by iterations only.
    pub time_budget: Option<Duration>,
}

impl Default for GenerativeModel {
    fn default() -> Self {
        Self {
            l2: 0.01,
            prior_accuracy: 0.7,
            initial_class_prior: 0.5,
            max_iterations: 500,
            tolerance: 1e-6,
            time_budget: None,
        }
    }
}

/// Fitted parameters; ephemeral, one per (subset, strength) job.
#[derive(Debug, Clone, Serialize)]
pub struct FittedGenerativeModel {
    class_prior: f64,
    propensity: Vec<f64>,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    pub iterations: usize,
}

impl GenerativeModel {
    fn validate(&self) -> Result<()> {
        if !self.l2.is_finite() || self.l2 < 0.0 {
            return Err(Error::config(format!(
                "regularization strength {} must be finite and non-negative",
                self.l2
            )));
        }
        if !(0.5..1.0).contains(&self.prior_accuracy) {
            return Err(Error::config(format!(
                "prior accuracy {} must lie in [0.5, 1)",
                self.prior_accuracy
            )));
        }
        if !(PRIOR_BOUNDS.0..=PRIOR_BOUNDS.1).contains(&self.initial_class_prior) {
            return Err(Error::config("initial class prior must lie in [0.01, 0.99]"));
        }
        if self.max_iterations == 0 {
            return Err(Error::config("max_iterations must be positive"));
        }
        Ok(())
    }

    /// Regularized accuracy update for one class.
    fn shrink(&self, agreeing: f64, mass: f64) -> f64 {
        let denom = mass + self.l2;
        if denom <= 0.0 {
            return self.prior_accuracy;
        }
        ((agreeing + self.l2 * self.prior_accuracy) / denom)
            .clamp(ACCURACY_FLOOR, 1.0 - ACCURACY_FLOOR)
    }
}

impl LabelModel for GenerativeModel {
    type Fitted = FittedGenerativeModel;

    fn fit(&self, matrix: ArrayView2<'_, Label>) -> Result<FittedGenerativeModel> {
        self.validate()?;
        let (n, k) = matrix.dim();
        if n == 0 {
            return Err(Error::config("label matrix has no rows"));
        }
        if k == 0 {
            return Err(Error::config("label function subset is empty"));
        }

        let propensity: Vec<f64> = matrix
            .columns()
            .into_iter()
            .map(|col| col.iter().filter(|label| label.is_vote()).count() as f64 / n as f64)
            .collect();
        let mut fitted = FittedGenerativeModel {
            class_prior: self.initial_class_prior,
            propensity,
            alpha: vec![self.prior_accuracy; k],
            beta: vec![self.prior_accuracy; k],
            iterations: 0,
        };

        let started = Instant::now();
        let mut posterior = vec![0.0; n];
        let mut delta = f64::INFINITY;
        for iteration in 1..=self.max_iterations {
            // E-step
            for (row, q) in matrix.rows().into_iter().zip(posterior.iter_mut()) {
                *q = fitted.score_row(row.iter().copied());
            }

            // M-step
            delta = 0.0;
            for (j, column) in matrix.columns().into_iter().enumerate() {
                let (mut pos_agree, mut pos_mass) = (0.0_f64, 0.0_f64);
                let (mut neg_agree, mut neg_mass) = (0.0_f64, 0.0_f64);
                for (label, &q) in column.iter().zip(&posterior) {
                    match label {
                        Label::Abstain => continue,
                        Label::Positive => pos_agree += q,
                        Label::Negative => neg_agree += 1.0 - q,
                    }
                    pos_mass += q;
                    neg_mass += 1.0 - q;
                }
                let alpha = self.shrink(pos_agree, pos_mass);
                let beta = self.shrink(neg_agree, neg_mass);
                delta = delta
                    .max((alpha - fitted.alpha[j]).abs())
                    .max((beta - fitted.beta[j]).abs());
                fitted.alpha[j] = alpha;
                fitted.beta[j] = beta;
            }
            let prior = (posterior.iter().sum::<f64>() / n as f64).clamp(PRIOR_BOUNDS.0, PRIOR_BOUNDS.1);
            delta = delta.max((prior - fitted.class_prior).abs());
            fitted.class_prior = prior;
            fitted.iterations = iteration;
            trace!(iteration, delta, prior, "em step");

            if delta < self.tolerance {
                debug!(
                    iterations = iteration,
                    label_functions = k,
                    candidates = n,
                    l2 = self.l2,
                    class_prior = fitted.class_prior,
                    "label model converged"
                );
                return Ok(fitted);
            }
            if self
                .time_budget
                .is_some_and(|budget| started.elapsed() > budget)
            {
                return Err(Error::NonConvergence {
                    iterations: iteration,
                    delta,
                });
            }
        }

        Err(Error::NonConvergence {
            iterations: self.max_iterations,
            delta,
        })
    }

    fn with_regularization(&self, strength: f64) -> Self {
        Self {
            l2: strength,
            ..self.clone()
        }
    }

    fn regularization(&self) -> f64 {
        self.l2
    }
}

impl FittedGenerativeModel {
    /// Posterior P(Y = 1) for one row of votes. All-abstain rows get the class prior.
    fn score_row(&self, row: impl Iterator<Item = Label>) -> f64 {
        let mut log_odds = logit(self.class_prior);
        for (j, label) in row.enumerate() {
            let (alpha, beta) = (self.alpha[j], self.beta[j]);
            log_odds += match label {
                Label::Abstain => 0.0,
                Label::Positive => alpha.ln() - (1.0 - beta).ln(),
                Label::Negative => (1.0 - alpha).ln() - beta.ln(),
            };
        }
        sigmoid(log_odds)
    }
}

impl MarginalsProvider for FittedGenerativeModel {
    fn predict_marginals(&self, matrix: ArrayView2<'_, Label>) -> Result<Vec<f64>> {
        if matrix.ncols() != self.alpha.len() {
            return Err(Error::config(format!(
                "model was fit on {} label functions but matrix has {}",
                self.alpha.len(),
                matrix.ncols()
            )));
        }
        Ok(matrix
            .rows()
            .into_iter()
            .map(|row| self.score_row(row.iter().copied()))
            .collect())
    }

    fn weights(&self) -> Vec<LfWeight> {
        (0..self.alpha.len())
            .map(|j| {
                let accuracy = 0.5 * (self.alpha[j] + self.beta[j]);
                LfWeight {
                    column: j,
                    propensity: self.propensity[j],
                    accuracy_positive: self.alpha[j],
                    accuracy_negative: self.beta[j],
                    weight: logit(accuracy),
                }
            })
            .collect()
    }

    fn class_prior(&self) -> f64 {
        self.class_prior
    }
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::data::{labels::LabelMatrix, Split};

    fn matrix(rows: &[Vec<i8>]) -> Array2<Label> {
        let ids = (0..rows.len() as i64).collect();
        LabelMatrix::from_codes(Split::Train, ids, rows)
            .unwrap()
            .view()
            .to_owned()
    }

    fn model() -> GenerativeModel {
        GenerativeModel {
            max_iterations: 10_000,
            ..GenerativeModel::default()
        }
    }

    #[test]
    fn empty_inputs_are_configuration_errors() {
        let model = model();
        let no_rows = Array2::<Label>::default((0, 3));
        assert!(matches!(model.fit(no_rows.view()), Err(Error::Configuration(_))));
        let no_cols = Array2::<Label>::default((4, 0));
        assert!(matches!(model.fit(no_cols.view()), Err(Error::Configuration(_))));
    }

    #[test]
    fn all_abstain_rows_get_the_class_prior() {
        let labels = matrix(&[vec![1, 1], vec![-1, -1], vec![0, 0], vec![1, -1]]);
        let fitted = model().fit(labels.view()).unwrap();
        let marginals = fitted.predict_marginals(labels.view()).unwrap();
        assert!((marginals[1] - fitted.class_prior()).abs() < 1e-12);
        assert!(marginals.iter().all(|m| (0.0..=1.0).contains(m)));
        assert!(marginals[0] > marginals[2]);
    }

    #[test]
    fn fit_is_deterministic() {
        let labels = matrix(&[vec![1, 0, 1], vec![0, 0, -1], vec![1, 1, 1], vec![-1, 0, 0]]);
        let model = model().with_regularization(1.26);
        let a = model.fit(labels.view()).unwrap();
        let b = model.fit(labels.view()).unwrap();
        assert_eq!(
            a.predict_marginals(labels.view()).unwrap(),
            b.predict_marginals(labels.view()).unwrap()
        );
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let labels = matrix(&[vec![1, 0], vec![0, 1], vec![1, 1], vec![0, 0]]);
        let model = GenerativeModel {
            max_iterations: 1,
            tolerance: 0.0,
            ..GenerativeModel::default()
        };
        assert!(matches!(
            model.fit(labels.view()),
            Err(Error::NonConvergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn time_budget_stops_a_fit_early() {
        let labels = matrix(&[vec![1, 0], vec![0, 1], vec![1, 1], vec![0, 0]]);
        let model = GenerativeModel {
            max_iterations: 1_000_000,
            tolerance: 0.0,
            time_budget: Some(Duration::ZERO),
            ..GenerativeModel::default()
        };
        assert!(matches!(
            model.fit(labels.view()),
            Err(Error::NonConvergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn predicting_with_wrong_width_fails() {
        let labels = matrix(&[vec![1, 0], vec![0, 1]]);
        let fitted = model().fit(labels.view()).unwrap();
        let wider = matrix(&[vec![1, 0, 1]]);
        assert!(fitted.predict_marginals(wider.view()).is_err());
    }
}
