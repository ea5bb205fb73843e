//! # 航空機コントローラ
//!
//! 毎ティック、最も近い飛翔中のミサイルを脅威として検出し、回避フック
//! `evade_missile` に判断を委ねます。脅威がない（またはフックが脅威なしと判断した）
//! 場合は目的地へ向けて操舵します。
//!
//! 目的地への操舵則 `v ← v + clip(target − x − v, dvmax)` は、クリップが飽和しない限り
//! 目的地までの距離を指数関数的に減少させ、行き過ぎずに減速しながら到達させます。

use std::fmt;

use crate::evasion::solver::IEvasionSolver;
use crate::models::{Aircraft, EntityId, Missile, Vector2, geometry};
use crate::render::{ArtistHandle, IRenderSurface, Marker};
use crate::world::WorldView;
use tracing::{debug, info};

/// 回避フックの結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvadeResult {
    /// 回避速度が見つかった
    Success(Vector2),
    /// 回避を試みたが解が得られなかった（速度は変更しない）
    Fail,
    /// 回避不要
    NoThreat,
}

/// 最も近い飛翔中のミサイル（同距離なら登録順で先のもの）
pub fn find_threat<'a>(
    aircraft: &Aircraft,
    world: &WorldView<'a>,
) -> Option<(EntityId, &'a Missile)> {
    world
        .missiles()
        .filter(|(_, missile)| !missile.destroyed)
        .min_by(|(_, lhs), (_, rhs)| {
            let lhs = geometry::distance(lhs.position, aircraft.position);
            let rhs = geometry::distance(rhs.position, aircraft.position);
            lhs.total_cmp(&rhs)
        })
}

/// 目的地へ向かう速度
pub fn steer_towards(aircraft: &Aircraft, target: Vector2) -> Vector2 {
    aircraft.velocity
        + geometry::clamp_preserving_direction(
            target - aircraft.position - aircraft.velocity,
            aircraft.dvmax,
        )
}

/// 航空機コントローラのインターフェース
pub trait IAircraftController: fmt::Debug {
    /// 目的地
    fn target(&self) -> Option<Vector2>;

    /// ミサイル検出時の回避フック
    ///
    /// 既定では何もせず `NoThreat` を返します。
    fn evade_missile(
        &self,
        _aircraft: &Aircraft,
        _missile: &Missile,
        _t: f64,
        _dt: f64,
    ) -> EvadeResult {
        EvadeResult::NoThreat
    }

    /// 次の速度を決定
    ///
    /// 撃墜済みなら現在速度をそのまま返します。
    fn next_velocity(&self, aircraft: &Aircraft, world: &WorldView<'_>, t: f64, dt: f64) -> Vector2 {
        if aircraft.destroyed {
            return aircraft.velocity;
        }

        let outcome = match find_threat(aircraft, world) {
            Some((missile_id, missile)) => {
                debug!(
                    aircraft = %aircraft.name,
                    missile = %missile.name,
                    %missile_id,
                    distance = geometry::distance(missile.position, aircraft.position),
                    "MISSILE_DETECTED: ミサイルを検出しました"
                );
                self.evade_missile(aircraft, missile, t, dt)
            }
            None => EvadeResult::NoThreat,
        };

        match outcome {
            EvadeResult::Success(velocity) => velocity,
            EvadeResult::Fail => aircraft.velocity,
            EvadeResult::NoThreat => match self.target() {
                Some(target) => steer_towards(aircraft, target),
                None => aircraft.velocity,
            },
        }
    }

    /// 目的地マーカーを描画
    fn draw(&self, surface: &mut dyn IRenderSurface) -> Vec<ArtistHandle> {
        self.target()
            .map(|target| surface.plot_marker(target, Marker::Waypoint))
            .into_iter()
            .collect()
    }
}

/// 目的地へ向かうだけのコントローラ（回避しない）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TargetSeekingController {
    pub target: Option<Vector2>,
}

impl TargetSeekingController {
    pub fn new(target: Option<Vector2>) -> Self {
        Self { target }
    }
}

impl IAircraftController for TargetSeekingController {
    fn target(&self) -> Option<Vector2> {
        self.target
    }
}

/// 最適回避コントローラ
///
/// 最接近時刻が未来にあるときだけ回避を試みます。探索が勾配0の点で停滞しないよう、
/// 始点を `[v0, v0 − dvmax·c, v0 + dvmax·c]` の順に変えてソルバーを呼び、
/// 成功かつ反復回数が1以上の最初の解を採用します。
#[derive(Debug)]
pub struct OptimalEvasionController {
    pub target: Option<Vector2>,
    /// 追加始点のずらし係数 c（0 < c < 1）
    pub start_offset_coeff: f64,
    solver: Box<dyn IEvasionSolver>,
}

impl OptimalEvasionController {
    pub const DEFAULT_START_OFFSET_COEFF: f64 = 0.9;

    pub fn new(target: Option<Vector2>, solver: impl IEvasionSolver + 'static) -> Self {
        Self {
            target,
            start_offset_coeff: Self::DEFAULT_START_OFFSET_COEFF,
            solver: Box::new(solver),
        }
    }

    pub fn with_start_offset_coeff(mut self, coeff: f64) -> Self {
        self.start_offset_coeff = coeff;
        self
    }

    /// 探索の始点（試行順）
    pub fn start_points(&self, aircraft: &Aircraft) -> [Vector2; 3] {
        let v0 = aircraft.velocity;
        let offset = aircraft.dvmax * self.start_offset_coeff;
        [v0, v0 - offset, v0 + offset]
    }
}

impl IAircraftController for OptimalEvasionController {
    fn target(&self) -> Option<Vector2> {
        self.target
    }

    fn evade_missile(&self, aircraft: &Aircraft, missile: &Missile, t: f64, dt: f64) -> EvadeResult {
        let (xa, v0) = (aircraft.position, aircraft.velocity);
        let (xm, vm) = (missile.position, missile.velocity);
        let t_min = geometry::time_of_closest_approach(xa, v0, xm, vm);
        debug!(
            aircraft = %aircraft.name,
            min_distance = geometry::min_distance(xa, v0, xm, vm),
            t_min,
            "予測最接近"
        );
        if t_min < 0.0 {
            debug!(aircraft = %aircraft.name, "最接近は過去のため回避不要です");
            return EvadeResult::NoThreat;
        }

        for start in self.start_points(aircraft) {
            let solution = self.solver.solve(aircraft, missile, start, t, dt);
            debug!(
                aircraft = %aircraft.name,
                start = %start,
                velocity = %solution.velocity,
                iterations = solution.iterations,
                success = solution.success,
                "EVASION_SOLUTION: 回避解"
            );
            // 反復0回の成功は改善なしとみなす
            if solution.success && solution.iterations > 0 {
                info!(
                    aircraft = %aircraft.name,
                    missile = %missile.name,
                    velocity = %solution.velocity,
                    min_distance = geometry::min_distance(xa, solution.velocity, xm, vm),
                    t,
                    "EVASION_MANEUVER: 回避機動を開始しました"
                );
                return EvadeResult::Success(solution.velocity);
            }
        }

        debug!(aircraft = %aircraft.name, "EVASION_FAILED: 有効な回避解がありません");
        EvadeResult::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evasion::solver::EvasionSolution;
    use crate::models::{MissileLaunch, WorldBounds};
    use crate::world::World;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// 呼び出し始点を記録し、用意した結果を順に返すソルバー
    #[derive(Debug, Clone)]
    struct ScriptedSolver {
        calls: Rc<RefCell<Vec<Vector2>>>,
        results: Vec<EvasionSolution>,
    }

    impl IEvasionSolver for ScriptedSolver {
        fn solve(
            &self,
            _aircraft: &Aircraft,
            _missile: &Missile,
            start_velocity: Vector2,
            _t: f64,
            _dt: f64,
        ) -> EvasionSolution {
            let mut calls = self.calls.borrow_mut();
            let result = self.results[calls.len()];
            calls.push(start_velocity);
            result
        }
    }

    fn solution(velocity: Vector2, iterations: u64, success: bool) -> EvasionSolution {
        EvasionSolution {
            velocity,
            iterations,
            success,
        }
    }

    fn aircraft(velocity: Vector2) -> Aircraft {
        Aircraft::new(
            "Aircraft",
            Vector2::new(25.0, 90.0),
            velocity,
            20.0,
            15.0,
            Box::new(TargetSeekingController::new(None)),
        )
    }

    fn missile(position: Vector2, velocity: Vector2) -> Missile {
        Missile::unguided(MissileLaunch {
            name: "MissileSystem1.Missile0".to_string(),
            position,
            velocity,
            vmax: 50.0,
            explosion_range: 5.0,
            target: EntityId(0),
            owner: EntityId(1),
        })
    }

    fn scripted(results: Vec<EvasionSolution>) -> (OptimalEvasionController, Rc<RefCell<Vec<Vector2>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let solver = ScriptedSolver {
            calls: Rc::clone(&calls),
            results,
        };
        (
            OptimalEvasionController::new(Some(Vector2::new(50.0, 0.0)), solver),
            calls,
        )
    }

    #[test]
    fn test_start_points_order_and_first_accepted() {
        let v0 = Vector2::new(1.0, 2.0);
        let (controller, calls) = scripted(vec![
            solution(Vector2::new(5.0, 5.0), 12, false),
            solution(Vector2::new(6.0, 6.0), 0, true),
            solution(Vector2::new(9.0, 9.0), 3, true),
        ]);
        let aircraft = aircraft(v0);
        let threat = missile(Vector2::new(25.0, 40.0), Vector2::new(0.0, 50.0));

        let result = controller.evade_missile(&aircraft, &threat, 0.0, 0.05);
        assert_eq!(result, EvadeResult::Success(Vector2::new(9.0, 9.0)));
        let offset = Vector2::splat(15.0 * 0.9);
        assert_eq!(*calls.borrow(), vec![v0, v0 - offset, v0 + offset]);
    }

    #[test]
    fn test_stops_at_first_success() {
        let (controller, calls) = scripted(vec![solution(Vector2::new(-3.0, 4.0), 8, true)]);
        let aircraft = aircraft(Vector2::ZERO);
        let threat = missile(Vector2::new(25.0, 40.0), Vector2::new(0.0, 50.0));
        let result = controller.evade_missile(&aircraft, &threat, 0.0, 0.05);
        assert_eq!(result, EvadeResult::Success(Vector2::new(-3.0, 4.0)));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_all_starts_failing_leaves_velocity_unchanged() {
        let failing = solution(Vector2::new(7.0, 7.0), 4, false);
        let (controller, calls) = scripted(vec![failing; 3]);
        let v0 = Vector2::new(2.0, -1.0);
        let mut world = World::new(WorldBounds::default());
        world.add_entity(missile(Vector2::new(25.0, 40.0), Vector2::new(0.0, 50.0)));
        let aircraft = aircraft(v0);

        let velocity = controller.next_velocity(&aircraft, &world.view(), 0.0, 0.05);
        assert_eq!(velocity, v0);
        assert_eq!(calls.borrow().len(), 3);
    }

    #[test]
    fn test_receding_missile_is_no_threat() {
        let (controller, calls) = scripted(Vec::new());
        let mut world = World::new(WorldBounds::default());
        // 航空機より上にいて、さらに上へ遠ざかるミサイル
        world.add_entity(missile(Vector2::new(25.0, 95.0), Vector2::new(0.0, 50.0)));
        let aircraft = aircraft(Vector2::ZERO);

        let velocity = controller.next_velocity(&aircraft, &world.view(), 0.0, 0.05);
        assert!(calls.borrow().is_empty());
        assert_eq!(velocity, steer_towards(&aircraft, Vector2::new(50.0, 0.0)));
    }

    #[test]
    fn test_find_threat_picks_nearest_live_missile() {
        let mut world = World::new(WorldBounds::default());
        let mut inert = missile(Vector2::new(25.0, 88.0), Vector2::ZERO);
        inert.self_destruct();
        world.add_entity(inert);
        let far = world.add_entity(missile(Vector2::new(25.0, 40.0), Vector2::ZERO));
        let near = world.add_entity(missile(Vector2::new(30.0, 80.0), Vector2::ZERO));
        world.add_entity(missile(Vector2::new(20.0, 80.0), Vector2::ZERO));

        let aircraft = aircraft(Vector2::ZERO);
        let found = find_threat(&aircraft, &world.view()).map(|(id, _)| id);
        assert_eq!(found, Some(near));
        assert_ne!(found, Some(far));
    }

    #[test]
    fn test_destroyed_aircraft_is_not_steered() {
        let controller = TargetSeekingController::new(Some(Vector2::new(50.0, 0.0)));
        let mut aircraft = aircraft(Vector2::new(3.0, 3.0));
        aircraft.destroy();
        let world = World::new(WorldBounds::default());
        assert_eq!(
            controller.next_velocity(&aircraft, &world.view(), 0.0, 0.05),
            Vector2::ZERO
        );
    }
}
