// 脅威検出と回避戦略の振り分け
pub mod controller;

// 局所最適化器
pub mod optimizer;

// 回避問題ソルバー
pub mod solver;

pub use controller::{
    EvadeResult, IAircraftController, OptimalEvasionController, TargetSeekingController,
    find_threat, steer_towards,
};
pub use optimizer::{IMinimizer, Minimum, NelderMeadMinimizer, OptimizationProblem};
pub use solver::{
    DistanceMetric, EvasionSolution, IEvasionSolver, MaxMinDistanceSolver,
    MaxNextStepDistanceSolver, MinFuelSolver,
};
