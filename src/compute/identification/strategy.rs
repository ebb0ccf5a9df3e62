//! Search strategies over the normalized parameter space.
//!
//! The engine asks a [`SearchStrategy`] for a population, scores it and
//! hands the fitnesses back. [`CmaEs`] is the standard covariance matrix
//! adaptation evolution strategy, minimizing.
//!
//! ```text
//! x_k = m + sigma * B * D * z_k        z_k ~ N(0, I), C = B D^2 B^T
//! ```

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

use crate::schema::CmaEsConfig;

/// Ask/tell interface of a population-based minimizer.
pub trait SearchStrategy: Send {
    /// Sample the next population.
    fn generate(&mut self) -> Vec<Vec<f64>>;

    /// Adapt to the fitnesses of `population` (lower is better).
    fn update(&mut self, population: &[Vec<f64>], fitnesses: &[f64]);

    /// Number of completed updates.
    fn generation(&self) -> usize;
}

/// Indices of `fitnesses`, best first.
///
/// Stable, so equal fitnesses keep their population order and the
/// first-encountered individual ranks higher.
pub fn rank(fitnesses: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..fitnesses.len()).collect();
    indices.sort_by(|&a, &b| fitnesses[a].total_cmp(&fitnesses[b]));
    indices
}

/// Smallest eigenvalue kept when factoring the covariance.
const EIGEN_FLOOR: f64 = 1e-20;

/// Smallest step size; below it every sample equals the mean anyway.
const SIGMA_FLOOR: f64 = 1e-20;

/// CMA-ES with rank-one and rank-mu covariance updates and cumulative
/// step-size adaptation.
#[derive(Debug, Clone)]
pub struct CmaEs {
    dimension: usize,
    lambda: usize,
    mu: usize,
    initial_mean: DVector<f64>,
    initial_sigma: f64,
    mean: DVector<f64>,
    sigma: f64,
    covariance: DMatrix<f64>,
    /// Evolution path of the covariance.
    p_c: DVector<f64>,
    /// Evolution path of the step size.
    p_sigma: DVector<f64>,
    weights: DVector<f64>,
    mu_eff: f64,
    c_c: f64,
    c_sigma: f64,
    c_1: f64,
    c_mu: f64,
    d_sigma: f64,
    /// `E||N(0, I)||`.
    chi_n: f64,
    generation: usize,
    rng: StdRng,
}

impl CmaEs {
    /// Start from `centroid` with the configured step size and population.
    pub fn new(centroid: &[f64], config: &CmaEsConfig, seed: u64) -> Self {
        let dimension = centroid.len();
        let n = dimension.max(1) as f64;
        let lambda = config.population_size;
        let mu = (lambda / 2).max(1);

        let raw: Vec<f64> = (0..mu)
            .map(|i| (mu as f64 + 0.5).ln() - ((i + 1) as f64).ln())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights = DVector::from_iterator(mu, raw.iter().map(|w| w / total));
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (n + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (n + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / n) / (n + 4.0 + 2.0 * mu_eff / n);
        let c_1 = 2.0 / ((n + 1.3).powi(2) + mu_eff);
        let c_mu =
            (2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((n + 2.0).powi(2) + mu_eff)).min(1.0 - c_1);
        let chi_n = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n));

        let mean = DVector::from_column_slice(centroid);

        Self {
            dimension,
            lambda,
            mu,
            initial_mean: mean.clone(),
            initial_sigma: config.initial_sigma,
            mean,
            sigma: config.initial_sigma,
            covariance: DMatrix::identity(dimension, dimension),
            p_c: DVector::zeros(dimension),
            p_sigma: DVector::zeros(dimension),
            weights,
            mu_eff,
            c_c,
            c_sigma,
            c_1,
            c_mu,
            d_sigma,
            chi_n,
            generation: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current distribution mean.
    pub fn mean(&self) -> Vec<f64> {
        self.mean.iter().copied().collect()
    }

    /// Current global step size.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn population_size(&self) -> usize {
        self.lambda
    }

    fn eigen(&self) -> SymmetricEigen<f64, nalgebra::Dyn> {
        SymmetricEigen::new(self.covariance.clone())
    }

    fn reset(&mut self) {
        self.mean = self.initial_mean.clone();
        self.sigma = self.initial_sigma;
        self.covariance = DMatrix::identity(self.dimension, self.dimension);
        self.p_c = DVector::zeros(self.dimension);
        self.p_sigma = DVector::zeros(self.dimension);
    }
}

impl SearchStrategy for CmaEs {
    fn generate(&mut self) -> Vec<Vec<f64>> {
        let eigen = self.eigen();
        let sqrt_d = DMatrix::from_diagonal(&eigen.eigenvalues.map(|v| v.max(EIGEN_FLOOR).sqrt()));
        let bd = &eigen.eigenvectors * sqrt_d;

        (0..self.lambda)
            .map(|_| {
                let z: DVector<f64> = DVector::from_iterator(
                    self.dimension,
                    (0..self.dimension).map(|_| StandardNormal.sample(&mut self.rng)),
                );
                let x = &self.mean + self.sigma * &bd * z;
                x.iter().copied().collect()
            })
            .collect()
    }

    fn update(&mut self, population: &[Vec<f64>], fitnesses: &[f64]) {
        let ranked = rank(fitnesses);
        let selected: Vec<DVector<f64>> = ranked
            .iter()
            .take(self.mu)
            .map(|&i| DVector::from_column_slice(&population[i]))
            .collect();

        let old_mean = self.mean.clone();
        let mut new_mean = DVector::zeros(self.dimension);
        for (w, x) in self.weights.iter().zip(&selected) {
            new_mean += *w * x;
        }

        let eigen = self.eigen();
        let inv_sqrt_d =
            DMatrix::from_diagonal(&eigen.eigenvalues.map(|v| 1.0 / v.max(EIGEN_FLOOR).sqrt()));
        let c_inv_sqrt = &eigen.eigenvectors * inv_sqrt_d * eigen.eigenvectors.transpose();

        let shift = (&new_mean - &old_mean) / self.sigma;

        self.p_sigma = (1.0 - self.c_sigma) * &self.p_sigma
            + (self.c_sigma * (2.0 - self.c_sigma) * self.mu_eff).sqrt() * &c_inv_sqrt * &shift;

        let p_sigma_norm = self.p_sigma.norm();
        let decay = 1.0 - (1.0 - self.c_sigma).powi(2 * (self.generation as i32 + 1));
        let h_sigma = if p_sigma_norm / decay.sqrt()
            < (1.4 + 2.0 / (self.dimension as f64 + 1.0)) * self.chi_n
        {
            1.0
        } else {
            0.0
        };

        self.p_c = (1.0 - self.c_c) * &self.p_c
            + h_sigma * (self.c_c * (2.0 - self.c_c) * self.mu_eff).sqrt() * &shift;

        let mut rank_mu = DMatrix::zeros(self.dimension, self.dimension);
        for (w, x) in self.weights.iter().zip(&selected) {
            let y = (x - &old_mean) / self.sigma;
            rank_mu += *w * &y * y.transpose();
        }

        let delta_h = (1.0 - h_sigma) * self.c_c * (2.0 - self.c_c);
        self.covariance = (1.0 - self.c_1 - self.c_mu + self.c_1 * delta_h) * &self.covariance
            + self.c_1 * &self.p_c * self.p_c.transpose()
            + self.c_mu * rank_mu;
        self.covariance = (&self.covariance + self.covariance.transpose()) * 0.5;

        self.sigma *= ((self.c_sigma / self.d_sigma) * (p_sigma_norm / self.chi_n - 1.0)).exp();
        self.mean = new_mean;

        let degenerate = !self.sigma.is_finite()
            || self.mean.iter().any(|v| !v.is_finite())
            || self.covariance.iter().any(|v| !v.is_finite());
        if degenerate {
            log::warn!(
                "CMA-ES generation {}: non-finite state, resetting distribution",
                self.generation
            );
            self.reset();
        }
        self.sigma = self.sigma.max(SIGMA_FLOOR);

        self.generation += 1;
    }

    fn generation(&self) -> usize {
        self.generation
    }
}
