//! # 局所最適化モジュール
//!
//! 箱型制約と不等式制約（`g(x) >= 0`）を持つ最小化問題の記述と、
//! `argmin` の Nelder-Mead 法による実装を提供します。
//!
//! 箱型制約は評価前の射影で、不等式制約は2次ペナルティで扱います。

use std::fmt;

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use tracing::{debug, trace, warn};

/// 目的関数・制約関数
pub type ScalarFn<'a> = Box<dyn Fn(&[f64]) -> f64 + Send + Sync + 'a>;

/// 最小化問題
pub struct OptimizationProblem<'a> {
    objective: ScalarFn<'a>,
    bounds: Vec<(f64, f64)>,
    constraints: Vec<ScalarFn<'a>>,
}

impl<'a> OptimizationProblem<'a> {
    /// # 引数
    ///
    /// * `objective` - 最小化する目的関数
    /// * `bounds` - 各次元の下限・上限
    pub fn new(
        objective: impl Fn(&[f64]) -> f64 + Send + Sync + 'a,
        bounds: Vec<(f64, f64)>,
    ) -> Self {
        Self {
            objective: Box::new(objective),
            bounds,
            constraints: Vec::new(),
        }
    }

    /// 不等式制約 `g(x) >= 0` を追加
    pub fn with_constraint(mut self, constraint: impl Fn(&[f64]) -> f64 + Send + Sync + 'a) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// 箱型制約への射影
    pub fn project(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(&self.bounds)
            .map(|(&value, &(lower, upper))| value.max(lower).min(upper))
            .collect()
    }

    pub fn objective(&self, x: &[f64]) -> f64 {
        (self.objective)(x)
    }

    /// 最大の制約違反量（全制約を満たしていれば0）
    pub fn violation(&self, x: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|g| (-g(x)).max(0.0))
            .fold(0.0, f64::max)
    }

    /// 2乗制約違反量の総和
    fn squared_violation(&self, x: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|g| (-g(x)).max(0.0).powi(2))
            .sum()
    }
}

impl fmt::Debug for OptimizationProblem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationProblem")
            .field("bounds", &self.bounds)
            .field("constraints", &self.constraints.len())
            .finish_non_exhaustive()
    }
}

/// 最小化の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// 解（箱型制約内）
    pub solution: Vec<f64>,
    /// 反復回数
    pub iterations: u64,
    /// 収束し、かつ制約を満たしたか
    pub converged: bool,
}

/// 局所最適化器のインターフェース
pub trait IMinimizer: fmt::Debug {
    fn minimize(&self, problem: &OptimizationProblem<'_>, initial: &[f64]) -> Minimum;
}

/// ペナルティ付き目的関数（argmin 用）
struct PenalizedCost<'p, 'a> {
    problem: &'p OptimizationProblem<'a>,
    penalty_weight: f64,
}

impl CostFunction for PenalizedCost<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        if param.len() != self.problem.dimension() {
            return Err(Error::msg(format!(
                "parameter length {} does not match problem dimension {}",
                param.len(),
                self.problem.dimension()
            )));
        }
        let x = self.problem.project(param);
        Ok(self.problem.objective(&x) + self.penalty_weight * self.problem.squared_violation(&x))
    }
}

/// Nelder-Mead 法による最小化器
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadMinimizer {
    /// 最大反復回数
    pub max_iters: u64,
    /// 単体の目的関数値の標準偏差がこれを下回ったら収束
    pub sd_tolerance: f64,
    /// 解で許容する制約違反量
    pub constraint_tolerance: f64,
    /// 制約違反の2乗に掛ける重み
    pub penalty_weight: f64,
    /// 初期単体の辺長（箱の幅に対する比）
    pub initial_step: f64,
}

impl Default for NelderMeadMinimizer {
    fn default() -> Self {
        Self {
            max_iters: 500,
            sd_tolerance: 1e-9,
            constraint_tolerance: 1e-4,
            penalty_weight: 1e6,
            initial_step: 0.05,
        }
    }
}

impl NelderMeadMinimizer {
    /// 初期単体（始点と、各軸方向に箱の内側へずらした頂点）
    fn initial_simplex(&self, problem: &OptimizationProblem<'_>, start: &[f64]) -> Vec<Vec<f64>> {
        let mut simplex = Vec::with_capacity(start.len() + 1);
        simplex.push(start.to_vec());
        for (i, &(lower, upper)) in problem.bounds().iter().enumerate() {
            let step = self.initial_step * (upper - lower);
            let mut vertex = start.to_vec();
            vertex[i] = if vertex[i] + step <= upper {
                vertex[i] + step
            } else {
                vertex[i] - step
            };
            simplex.push(vertex);
        }
        simplex
    }

    fn run(&self, problem: &OptimizationProblem<'_>, start: &[f64]) -> Result<Minimum, Error> {
        let solver = NelderMead::new(self.initial_simplex(problem, start))
            .with_sd_tolerance(self.sd_tolerance)?;
        let cost = PenalizedCost {
            problem,
            penalty_weight: self.penalty_weight,
        };

        let result = Executor::new(cost, solver)
            .configure(|state| state.max_iters(self.max_iters))
            .run()?;

        let state = result.state();
        let solution = state
            .get_best_param()
            .map(|param| problem.project(param))
            .unwrap_or_else(|| start.to_vec());
        let iterations = state.get_iter();
        let terminated_by_convergence = matches!(
            state.get_termination_reason(),
            Some(TerminationReason::SolverConverged | TerminationReason::TargetCostReached)
        );
        let violation = problem.violation(&solution);

        trace!(
            iterations,
            reason = ?state.get_termination_reason(),
            violation,
            "Nelder-Mead 終了"
        );

        Ok(Minimum {
            converged: terminated_by_convergence && violation <= self.constraint_tolerance,
            solution,
            iterations,
        })
    }
}

impl IMinimizer for NelderMeadMinimizer {
    fn minimize(&self, problem: &OptimizationProblem<'_>, initial: &[f64]) -> Minimum {
        let start = problem.project(initial);
        match self.run(problem, &start) {
            Ok(minimum) => {
                debug!(
                    solution = ?minimum.solution,
                    iterations = minimum.iterations,
                    converged = minimum.converged,
                    "OPTIMIZATION_FINISHED: 局所最適化が終了しました"
                );
                minimum
            }
            Err(error) => {
                warn!(%error, "OPTIMIZATION_ERROR: 局所最適化に失敗しました");
                Minimum {
                    solution: start,
                    iterations: 0,
                    converged: false,
                }
            }
        }
    }
}
