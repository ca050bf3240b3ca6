//! Optimizer
//!
//! Bound constrained minimisation of a [`SmoothObjective`] with the spectral projected
//! gradient method: a projected gradient step scaled by the Barzilai-Borwein step
//! length, accepted by a non-monotone Armijo line search over the last few values.
use crate::constants::{ARMIJO_C, INNER_TOL, MAX_INNER_ITER, NONMONOTONE_WINDOW, STEP_MAX, STEP_MIN};
use crate::objective::SmoothObjective;
use log::debug;
use std::collections::VecDeque;

/// Box constraints `lower <= x <= upper`, one pair per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    /// Every parameter in `[0, inf)`.
    pub fn nonnegative(n: usize) -> Self {
        Bounds {
            lower: vec![0.0; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    /// Pin parameter `i` to zero.
    pub fn fix_zero(&mut self, i: usize) {
        self.lower[i] = 0.0;
        self.upper[i] = 0.0;
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Clamp `x` into the box in place.
    pub fn project(&self, x: &mut [f64]) {
        x.iter_mut()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .for_each(|(v, (lo, hi))| *v = v.max(*lo).min(*hi));
    }
}

/// Why the minimiser stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Projected gradient below tolerance.
    Converged,
    /// Iteration budget exhausted.
    IterationLimit,
    /// The line search could not find a decrease, usually at the limit of precision.
    LineSearch,
    /// The objective is not finite at the starting point.
    NonFinite,
}

/// Outcome of a minimisation.
#[derive(Debug, Clone)]
pub struct Solution {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    /// Infinity norm of the projected gradient step at `x`.
    pub projected_gradient: f64,
    pub termination: Termination,
}

/// Spectral projected gradient minimiser.
#[derive(Debug, Clone)]
pub struct ProjectedGradient {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Stop once the infinity norm of `P(x - g) - x` is at most this value.
    pub tol: f64,
    /// Number of past values the non-monotone line search compares against.
    pub window: usize,
}

impl Default for ProjectedGradient {
    fn default() -> Self {
        ProjectedGradient {
            max_iter: MAX_INNER_ITER,
            tol: INNER_TOL,
            window: NONMONOTONE_WINDOW,
        }
    }
}

fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &Bounds) -> f64 {
    x.iter()
        .zip(g.iter())
        .zip(bounds.lower.iter().zip(bounds.upper.iter()))
        .map(|((xi, gi), (lo, hi))| ((xi - gi).max(*lo).min(*hi) - xi).abs())
        .fold(0.0, f64::max)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl ProjectedGradient {
    pub fn new(max_iter: usize, tol: f64) -> Self {
        ProjectedGradient {
            max_iter,
            tol,
            ..Default::default()
        }
    }

    /// Minimise `objective` over `bounds` starting from `x0`.
    pub fn minimize<O: SmoothObjective + ?Sized>(&self, objective: &O, x0: &[f64], bounds: &Bounds) -> Solution {
        assert_eq!(x0.len(), bounds.len(), "Starting point and bounds must have the same length");
        let n = x0.len();
        let mut x = x0.to_vec();
        bounds.project(&mut x);
        let (mut f, mut g) = objective.value_and_gradient(&x);
        if !f.is_finite() {
            return Solution {
                x,
                value: f,
                iterations: 0,
                projected_gradient: f64::INFINITY,
                termination: Termination::NonFinite,
            };
        }

        let mut history: VecDeque<f64> = VecDeque::with_capacity(self.window.max(1));
        history.push_back(f);
        let mut pg = projected_gradient_norm(&x, &g, bounds);
        let mut step = if pg > 0.0 { (1.0 / pg).clamp(STEP_MIN, STEP_MAX) } else { 1.0 };
        let mut termination = Termination::IterationLimit;
        let mut iterations = 0;

        let mut d = vec![0.0; n];
        let mut x_new = vec![0.0; n];
        while iterations < self.max_iter {
            if pg <= self.tol {
                termination = Termination::Converged;
                break;
            }
            iterations += 1;

            for i in 0..n {
                d[i] = (x[i] - step * g[i]).max(bounds.lower[i]).min(bounds.upper[i]) - x[i];
            }
            let gtd = dot(&g, &d);
            if gtd >= 0.0 {
                termination = Termination::LineSearch;
                break;
            }
            let f_ref = history.iter().copied().fold(f64::MIN, f64::max);

            let mut t = 1.0;
            let accepted = loop {
                for i in 0..n {
                    x_new[i] = x[i] + t * d[i];
                }
                let (f_new, g_new) = objective.value_and_gradient(&x_new);
                if f_new.is_finite() && f_new <= f_ref + ARMIJO_C * t * gtd {
                    break Some((f_new, g_new));
                }
                // Safeguarded quadratic interpolation of the step.
                let t_quad = if f_new.is_finite() {
                    -0.5 * t * t * gtd / (f_new - f - t * gtd)
                } else {
                    0.1 * t
                };
                t = if t_quad.is_finite() { t_quad.clamp(0.1 * t, 0.5 * t) } else { 0.5 * t };
                if t * d.iter().fold(0.0, |acc: f64, v| acc.max(v.abs())) < f64::EPSILON {
                    break None;
                }
            };

            let Some((f_new, g_new)) = accepted else {
                termination = Termination::LineSearch;
                break;
            };

            let s: Vec<f64> = x_new.iter().zip(x.iter()).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = g_new.iter().zip(g.iter()).map(|(a, b)| a - b).collect();
            let sty = dot(&s, &y);
            step = if sty <= 0.0 {
                STEP_MAX
            } else {
                (dot(&s, &s) / sty).clamp(STEP_MIN, STEP_MAX)
            };

            x.copy_from_slice(&x_new);
            f = f_new;
            g = g_new;
            if history.len() == self.window.max(1) {
                history.pop_front();
            }
            history.push_back(f);
            pg = projected_gradient_norm(&x, &g, bounds);
        }
        if termination == Termination::IterationLimit && pg <= self.tol {
            termination = Termination::Converged;
        }

        debug!(
            "projected gradient stopped after {} iterations: {:?}, value: {:e}, pg: {:e}",
            iterations, termination, f, pg
        );
        Solution {
            x,
            value: f,
            iterations,
            projected_gradient: pg,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// `sum_i c_i (x_i - t_i)^2` with very different curvatures.
    struct Quadratic {
        curvature: Vec<f64>,
        target: Vec<f64>,
    }

    impl SmoothObjective for Quadratic {
        fn value_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>) {
            let mut v = 0.0;
            let mut g = Vec::with_capacity(x.len());
            for ((xi, ci), ti) in x.iter().zip(self.curvature.iter()).zip(self.target.iter()) {
                v += ci * (xi - ti) * (xi - ti);
                g.push(2.0 * ci * (xi - ti));
            }
            (v, g)
        }
    }

    struct Rosenbrock;

    impl SmoothObjective for Rosenbrock {
        fn value_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>) {
            let (a, b) = (x[0], x[1]);
            let v = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
            let g = vec![-2.0 * (1.0 - a) - 400.0 * a * (b - a * a), 200.0 * (b - a * a)];
            (v, g)
        }
    }

    #[test]
    fn test_unconstrained_quadratic() {
        let obj = Quadratic {
            curvature: vec![1.0, 100.0, 0.01],
            target: vec![1.0, -2.0, 3.0],
        };
        let bounds = Bounds {
            lower: vec![f64::NEG_INFINITY; 3],
            upper: vec![f64::INFINITY; 3],
        };
        let sol = ProjectedGradient::new(5000, 1e-10).minimize(&obj, &[0.0, 0.0, 0.0], &bounds);
        assert_eq!(sol.termination, Termination::Converged);
        assert_relative_eq!(sol.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(sol.x[1], -2.0, epsilon = 1e-6);
        assert_relative_eq!(sol.x[2], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_active_bounds() {
        let obj = Quadratic {
            curvature: vec![1.0, 1.0, 1.0],
            target: vec![1.0, -2.0, 3.0],
        };
        let mut bounds = Bounds::nonnegative(3);
        bounds.fix_zero(2);
        let sol = ProjectedGradient::default().minimize(&obj, &[5.0, 5.0, 5.0], &bounds);
        assert_eq!(sol.termination, Termination::Converged);
        assert_relative_eq!(sol.x[0], 1.0, epsilon = 1e-8);
        assert_eq!(sol.x[1], 0.0);
        assert_eq!(sol.x[2], 0.0);
    }

    #[test]
    fn test_rosenbrock() {
        let bounds = Bounds {
            lower: vec![-5.0, -5.0],
            upper: vec![5.0, 5.0],
        };
        let sol = ProjectedGradient::new(20000, 1e-9).minimize(&Rosenbrock, &[-1.2, 1.0], &bounds);
        assert_relative_eq!(sol.x[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(sol.x[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_non_finite_start() {
        let obj = Quadratic {
            curvature: vec![1.0],
            target: vec![f64::NAN],
        };
        let sol = ProjectedGradient::default().minimize(&obj, &[0.0], &Bounds::nonnegative(1));
        assert_eq!(sol.termination, Termination::NonFinite);
    }
}
