//! # 回避問題ソルバー
//!
//! 1発のミサイルに対する回避速度を、現在速度 `v0` を中心とする箱
//! `[v0 - dvmax, v0 + dvmax]` の中で数値最適化により求めます。
//!
//! - `MaxMinDistanceSolver`: 予測最接近距離を最大化
//! - `MinFuelSolver`: 安全距離を保ちつつ速度変化（燃料消費の代理指標）を最小化
//! - `MaxNextStepDistanceSolver`: 1ステップ先の距離を最大化

use std::fmt;

use crate::evasion::optimizer::{IMinimizer, NelderMeadMinimizer, OptimizationProblem};
use crate::models::{Aircraft, Missile, Vector2, geometry};

/// 回避解
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvasionSolution {
    pub velocity: Vector2,
    pub iterations: u64,
    pub success: bool,
}

/// 回避問題ソルバーのインターフェース
pub trait IEvasionSolver: fmt::Debug {
    /// # 引数
    ///
    /// * `aircraft` - 回避する航空機
    /// * `missile` - 脅威となるミサイル
    /// * `start_velocity` - 探索の始点
    /// * `t` - 現在のモデル時刻
    /// * `dt` - 時間刻み
    fn solve(
        &self,
        aircraft: &Aircraft,
        missile: &Missile,
        start_velocity: Vector2,
        t: f64,
        dt: f64,
    ) -> EvasionSolution;
}

/// 探索範囲（現在速度 ± dvmax）
fn velocity_box(aircraft: &Aircraft) -> Vec<(f64, f64)> {
    let v0 = aircraft.velocity;
    let dvmax = aircraft.dvmax;
    vec![(v0.x - dvmax.x, v0.x + dvmax.x), (v0.y - dvmax.y, v0.y + dvmax.y)]
}

fn velocity_of(x: &[f64]) -> Vector2 {
    Vector2::new(x[0], x[1])
}

fn run_minimizer(
    minimizer: &dyn IMinimizer,
    problem: &OptimizationProblem<'_>,
    start_velocity: Vector2,
) -> EvasionSolution {
    let minimum = minimizer.minimize(problem, &start_velocity.components());
    EvasionSolution {
        velocity: Vector2::from_slice(&minimum.solution).unwrap_or(start_velocity),
        iterations: minimum.iterations,
        success: minimum.converged,
    }
}

/// 最接近距離最大化ソルバー
#[derive(Debug)]
pub struct MaxMinDistanceSolver {
    minimizer: Box<dyn IMinimizer>,
}

impl MaxMinDistanceSolver {
    pub fn new() -> Self {
        Self::with_minimizer(NelderMeadMinimizer::default())
    }

    pub fn with_minimizer(minimizer: impl IMinimizer + 'static) -> Self {
        Self {
            minimizer: Box::new(minimizer),
        }
    }
}

impl Default for MaxMinDistanceSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IEvasionSolver for MaxMinDistanceSolver {
    fn solve(
        &self,
        aircraft: &Aircraft,
        missile: &Missile,
        start_velocity: Vector2,
        _t: f64,
        _dt: f64,
    ) -> EvasionSolution {
        let (xa, xm, vm) = (aircraft.position, missile.position, missile.velocity);
        let problem = OptimizationProblem::new(
            move |x| -geometry::squared_min_distance(xa, velocity_of(x), xm, vm),
            velocity_box(aircraft),
        );
        run_minimizer(self.minimizer.as_ref(), &problem, start_velocity)
    }
}

/// 燃料節約ソルバー
///
/// 燃料消費は速度変化量に比例すると仮定し、予測最接近距離が
/// `safe_distance` 以上となる範囲で `|v - v0|` を最小化します。
#[derive(Debug)]
pub struct MinFuelSolver {
    pub safe_distance: f64,
    minimizer: Box<dyn IMinimizer>,
}

impl MinFuelSolver {
    pub fn new(safe_distance: f64) -> Self {
        Self::with_minimizer(safe_distance, NelderMeadMinimizer::default())
    }

    pub fn with_minimizer(safe_distance: f64, minimizer: impl IMinimizer + 'static) -> Self {
        Self {
            safe_distance,
            minimizer: Box::new(minimizer),
        }
    }
}

impl IEvasionSolver for MinFuelSolver {
    fn solve(
        &self,
        aircraft: &Aircraft,
        missile: &Missile,
        start_velocity: Vector2,
        _t: f64,
        _dt: f64,
    ) -> EvasionSolution {
        let (xa, v0, xm, vm) = (
            aircraft.position,
            aircraft.velocity,
            missile.position,
            missile.velocity,
        );
        let sq_safe_distance = self.safe_distance.powi(2);
        let problem = OptimizationProblem::new(
            move |x| geometry::distance(velocity_of(x), v0),
            velocity_box(aircraft),
        )
        .with_constraint(move |x| {
            geometry::squared_min_distance(xa, velocity_of(x), xm, vm) - sq_safe_distance
        });
        run_minimizer(self.minimizer.as_ref(), &problem, start_velocity)
    }
}

/// 距離関数
#[derive(Debug, Clone, Copy, Default)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Chebyshev,
    Custom(fn(Vector2, Vector2) -> f64),
}

impl DistanceMetric {
    pub fn distance(&self, a: Vector2, b: Vector2) -> f64 {
        match self {
            DistanceMetric::Euclidean => geometry::distance(a, b),
            DistanceMetric::Chebyshev => geometry::chebyshev_distance(a, b),
            DistanceMetric::Custom(metric) => metric(a, b),
        }
    }
}

/// 次ステップ距離最大化ソルバー
///
/// 全軌道ではなく、1ステップ先の予測位置同士の距離だけを見ます。
#[derive(Debug)]
pub struct MaxNextStepDistanceSolver {
    pub metric: DistanceMetric,
    minimizer: Box<dyn IMinimizer>,
}

impl MaxNextStepDistanceSolver {
    pub fn new(metric: DistanceMetric) -> Self {
        Self::with_minimizer(metric, NelderMeadMinimizer::default())
    }

    pub fn with_minimizer(metric: DistanceMetric, minimizer: impl IMinimizer + 'static) -> Self {
        Self {
            metric,
            minimizer: Box::new(minimizer),
        }
    }
}

impl Default for MaxNextStepDistanceSolver {
    fn default() -> Self {
        Self::new(DistanceMetric::Euclidean)
    }
}

impl IEvasionSolver for MaxNextStepDistanceSolver {
    fn solve(
        &self,
        aircraft: &Aircraft,
        missile: &Missile,
        start_velocity: Vector2,
        _t: f64,
        dt: f64,
    ) -> EvasionSolution {
        let xa = aircraft.position;
        let missile_next = missile.position + missile.velocity * dt;
        let metric = self.metric;
        let problem = OptimizationProblem::new(
            move |x| -metric.distance(xa + velocity_of(x) * dt, missile_next),
            velocity_box(aircraft),
        );
        run_minimizer(self.minimizer.as_ref(), &problem, start_velocity)
    }
}
