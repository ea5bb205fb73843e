//! # Simulation モジュール
//!
//! シナリオ設定から世界モデルを組み立てて実行するシミュレーションエンジンを提供します。
//!
//! ## 主要機能
//!
//! - **世界の構築**: 航空機（コントローラ・回避ソルバー込み）とミサイルシステムの登録
//! - **実行**: 描画面と入力源を渡して固定時間刻みのメインループを回す
//! - **結果集計**: 撃墜の有無、発射数、爆発・自爆したミサイル数の報告
//!
//! ## 登録順
//!
//! 航空機をシナリオ記載順に登録し、その後にミサイルシステムを登録します。
//! 毎ティックの処理順はこの登録順（発射されたミサイルは末尾）になります。
//!
//! ## 使用例
//!
//! ```no_run
//! use evader::scenario::ScenarioConfig;
//! use evader::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/maxmindist.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! let report = engine.run_headless();
//! report.print_summary();
//! # Ok::<(), evader::scenario::ScenarioError>(())
//! ```

use crate::evasion::{
    DistanceMetric, IAircraftController, IEvasionSolver, MaxMinDistanceSolver,
    MaxNextStepDistanceSolver, MinFuelSolver, NelderMeadMinimizer, OptimalEvasionController,
    TargetSeekingController,
};
use crate::input::{IInputSource, NoInput};
use crate::models::{
    Aircraft, Entity, LauncherParams, MissileFactory, MissileSystem, Vector2,
};
use crate::render::{HeadlessSurface, IRenderSurface};
use crate::scenario::{
    AircraftConfig, ControllerConfig, MetricConfig, MissileSystemConfig, ScenarioConfig,
    ScenarioError, SolverConfig,
};
use crate::world::World;
use tracing::{debug, info};

pub struct SimulationEngine {
    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
    world: World,
    initialized: bool,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let world = World::new(scenario.bounds()).with_key_bindings(scenario.key_bindings());
        Self {
            scenario_config: scenario,
            verbose_level,
            world,
            initialized: false,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// 世界モデルにエンティティを登録
    ///
    /// 設定を再検証してから登録します。2回目以降の呼び出しは何もしません。
    pub fn initialize(&mut self) -> Result<(), ScenarioError> {
        if self.initialized {
            return Ok(());
        }
        self.scenario_config.validate()?;

        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        let minimizer = self.scenario_config.optimizer.to_minimizer();
        for config in &self.scenario_config.aircraft {
            let aircraft = build_aircraft(config, &minimizer);
            let id = self.world.add_entity(aircraft);
            if self.verbose_level > 1 {
                debug!(%id, aircraft = %config.id, "航空機を登録しました");
            }
        }

        for config in &self.scenario_config.missile_systems {
            let id = self.world.add_entity(build_missile_system(config));
            if self.verbose_level > 1 {
                debug!(
                    %id,
                    launcher = %config.id,
                    firing_range = config.firing_range,
                    "ミサイルシステムを登録しました"
                );
            }
        }

        self.initialized = true;
        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  航空機: {}機", self.scenario_config.aircraft.len());
            info!("  ミサイルシステム: {}基", self.scenario_config.missile_systems.len());
        }

        Ok(())
    }

    /// シミュレーションを実行して結果を集計
    pub fn run(
        &mut self,
        surface: &mut dyn IRenderSurface,
        input: &mut dyn IInputSource,
    ) -> SimulationReport {
        let sim = &self.scenario_config.sim;
        let final_time = self
            .world
            .run(sim.t_max_s, sim.dt_s, sim.frame_time_s, surface, input);
        let report = self.report(final_time);
        info!(
            final_time = report.final_time,
            aircraft_destroyed = report.aircraft.iter().filter(|a| a.destroyed).count(),
            missiles_fired = report.missiles_fired(),
            "SIMULATION_FINISHED: シミュレーションが終了しました"
        );
        report
    }

    /// 描画・入力・待機なしで実行
    pub fn run_headless(&mut self) -> SimulationReport {
        self.scenario_config.sim.frame_time_s = 0.0;
        let mut surface = HeadlessSurface::new();
        self.run(&mut surface, &mut NoInput)
    }

    /// 現在の世界の状態を集計
    pub fn report(&self, final_time: f64) -> SimulationReport {
        let mut report = SimulationReport {
            final_time,
            ..SimulationReport::default()
        };

        for (_, entity) in self.world.view().iter() {
            match entity {
                Entity::Aircraft(aircraft) => report.aircraft.push(AircraftOutcome {
                    name: aircraft.name.clone(),
                    destroyed: aircraft.destroyed,
                    position: aircraft.position,
                }),
                Entity::MissileSystem(system) => report.launchers.push(LauncherOutcome {
                    name: system.name.clone(),
                    fired_missile_count: system.fired_missile_count,
                }),
                Entity::Missile(missile) if missile.exploded => report.missiles_exploded += 1,
                Entity::Missile(missile) if missile.destroyed => {
                    report.missiles_self_destructed += 1
                }
                Entity::Missile(_) => {}
            }
        }
        report
    }
}

fn build_aircraft(config: &AircraftConfig, minimizer: &NelderMeadMinimizer) -> Aircraft {
    Aircraft::new(
        config.id.clone(),
        config.pos.into(),
        config.vel.into(),
        config.vmax,
        config.dvmax,
        build_controller(&config.controller, minimizer),
    )
}

fn build_controller(
    config: &ControllerConfig,
    minimizer: &NelderMeadMinimizer,
) -> Box<dyn IAircraftController> {
    let target = config.target().map(Vector2::from);
    match config {
        ControllerConfig::TargetSeeking { .. } => Box::new(TargetSeekingController::new(target)),
        ControllerConfig::OptimalEvasion {
            solver,
            start_offset_coeff,
            ..
        } => {
            fn optimal(
                target: Option<Vector2>,
                solver: impl IEvasionSolver + 'static,
                coeff: f64,
            ) -> Box<dyn IAircraftController> {
                Box::new(OptimalEvasionController::new(target, solver).with_start_offset_coeff(coeff))
            }

            let minimizer = minimizer.clone();
            match solver {
                SolverConfig::MaxMinDistance => optimal(
                    target,
                    MaxMinDistanceSolver::with_minimizer(minimizer),
                    *start_offset_coeff,
                ),
                SolverConfig::MinFuel { safe_distance } => optimal(
                    target,
                    MinFuelSolver::with_minimizer(*safe_distance, minimizer),
                    *start_offset_coeff,
                ),
                SolverConfig::MaxNextDistance { metric } => {
                    let metric = match metric {
                        MetricConfig::Euclidean => DistanceMetric::Euclidean,
                        MetricConfig::Chebyshev => DistanceMetric::Chebyshev,
                    };
                    optimal(
                        target,
                        MaxNextStepDistanceSolver::with_minimizer(metric, minimizer),
                        *start_offset_coeff,
                    )
                }
            }
        }
    }
}

fn build_missile_system(config: &MissileSystemConfig) -> MissileSystem {
    MissileSystem::new(
        config.id.clone(),
        config.pos.into(),
        config.vel.into(),
        LauncherParams {
            missile_vmax: config.missile_vmax,
            explosion_range: config.explosion_range,
            rate_of_fire: config.rate_of_fire,
            firing_range: config.firing_range,
            max_firing_angle: config.max_firing_angle,
        },
        MissileFactory::unguided(),
    )
}

/// 航空機ごとの結果
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftOutcome {
    pub name: String,
    pub destroyed: bool,
    pub position: Vector2,
}

/// ミサイルシステムごとの結果
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherOutcome {
    pub name: String,
    pub fired_missile_count: u32,
}

/// 実行結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub final_time: f64,
    pub aircraft: Vec<AircraftOutcome>,
    pub launchers: Vec<LauncherOutcome>,
    pub missiles_exploded: usize,
    pub missiles_self_destructed: usize,
}

impl SimulationReport {
    pub fn missiles_fired(&self) -> u32 {
        self.launchers.iter().map(|l| l.fired_missile_count).sum()
    }

    pub fn print_summary(&self) {
        println!("=== シミュレーション結果 ===");
        println!("終了時刻: {:.2}", self.final_time);
        for aircraft in &self.aircraft {
            let status = if aircraft.destroyed { "撃墜" } else { "健在" };
            println!("  {}: {} (位置 {})", aircraft.name, status, aircraft.position);
        }
        for launcher in &self.launchers {
            println!("  {}: 発射数 {}", launcher.name, launcher.fired_missile_count);
        }
        println!("爆発したミサイル: {}", self.missiles_exploded);
        println!("自爆したミサイル: {}", self.missiles_self_destructed);
    }
}
