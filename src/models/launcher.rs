use std::fmt;

use crate::models::{
    Entity,
    aircraft::Aircraft,
    common::{EntityId, Vector2},
    geometry,
    intercept::solve_firing_solution,
    missile::{Missile, MissileLaunch},
    traits::{IEntity, IPhysicalBody},
};
use crate::render::{self, ArtistHandle, IRenderSurface, Marker};
use crate::world::TickContext;
use tracing::{debug, info};

/// 発射角の基準となる「真上」方向
pub const REFERENCE_UP_AXIS: Vector2 = Vector2::new(0.0, 1.0);

/// ミサイルファクトリ
///
/// 発射諸元からミサイルを生成する差し替え可能な戦略です。
pub struct MissileFactory(Box<dyn Fn(MissileLaunch) -> Missile>);

impl MissileFactory {
    pub fn new(create: impl Fn(MissileLaunch) -> Missile + 'static) -> Self {
        Self(Box::new(create))
    }

    /// 無誘導ミサイルを生成するファクトリ
    pub fn unguided() -> Self {
        Self::new(Missile::unguided)
    }

    pub fn create(&self, launch: MissileLaunch) -> Missile {
        (self.0)(launch)
    }
}

impl Default for MissileFactory {
    fn default() -> Self {
        Self::unguided()
    }
}

impl fmt::Debug for MissileFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MissileFactory(..)")
    }
}

/// ミサイルシステムの性能諸元
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LauncherParams {
    /// 発射するミサイルの速度
    pub missile_vmax: f64,
    /// ミサイルの近接信管作動距離
    pub explosion_range: f64,
    /// 発射間隔の最小値
    pub rate_of_fire: f64,
    /// 射程（この距離を超えたミサイルは自爆させる）
    pub firing_range: f64,
    /// 真上方向からの最大発射角（ラジアン）
    pub max_firing_angle: f64,
}

/// ミサイルシステム（地上発射機）
///
/// 射程内の航空機を見つけると射撃諸元を解いてミサイルを1発発射します。
/// 同時に飛翔させるミサイルは常に1発以下で、ミサイルが射程外に出ると自爆させます。
#[derive(Debug)]
pub struct MissileSystem {
    pub name: String,
    pub position: Vector2,
    pub velocity: Vector2,
    pub params: LauncherParams,
    /// 最後に発射した時刻
    pub last_fire_time: Option<f64>,
    /// 累計発射数
    pub fired_missile_count: u32,
    current_missile: Option<EntityId>,
    factory: MissileFactory,
    artists: Vec<ArtistHandle>,
}

impl MissileSystem {
    pub fn new(
        name: impl Into<String>,
        position: Vector2,
        velocity: Vector2,
        params: LauncherParams,
        factory: MissileFactory,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            velocity,
            params,
            last_fire_time: None,
            fired_missile_count: 0,
            current_missile: None,
            factory,
            artists: Vec::new(),
        }
    }

    /// 現在飛翔中のミサイル
    pub fn current_missile(&self) -> Option<EntityId> {
        self.current_missile
    }

    /// 発射間隔が経過しているか
    pub fn is_ready(&self, t: f64) -> bool {
        self.last_fire_time
            .is_none_or(|last| t >= last + self.params.rate_of_fire)
    }

    /// 射程内の航空機を探す（登録順で最初に見つかったもの）
    pub fn find_target<'a>(&self, ctx: &TickContext<'a>) -> Option<(EntityId, &'a Aircraft)> {
        ctx.world().aircraft().find(|(_, aircraft)| {
            !aircraft.destroyed
                && geometry::distance(aircraft.position, self.position) <= self.params.firing_range
        })
    }

    /// 目標に向けてミサイルを発射
    ///
    /// # 戻り値
    ///
    /// 発射したミサイルのID。射撃解がない、または発射角が許容範囲外の場合は `None`
    pub fn fire(
        &mut self,
        ctx: &mut TickContext<'_>,
        target_id: EntityId,
        target: &Aircraft,
    ) -> Option<EntityId> {
        let solution = solve_firing_solution(
            self.position,
            self.params.missile_vmax,
            target.position,
            target.velocity,
        )?;

        let angle = geometry::angle_between(REFERENCE_UP_AXIS, solution.velocity);
        if angle > self.params.max_firing_angle {
            debug!(
                launcher = %self.name,
                target = %target.name,
                angle,
                max_firing_angle = self.params.max_firing_angle,
                "FIRE_DECLINED: 発射角が許容範囲を超えています"
            );
            return None;
        }

        let missile = self.factory.create(MissileLaunch {
            name: format!("{}.Missile{}", self.name, self.fired_missile_count),
            position: self.position,
            velocity: solution.velocity,
            vmax: self.params.missile_vmax,
            explosion_range: self.params.explosion_range,
            target: target_id,
            owner: ctx.self_id(),
        });
        let missile_name = missile.name.clone();
        let missile_id = ctx.register(Entity::Missile(missile));
        self.current_missile = Some(missile_id);
        self.fired_missile_count += 1;

        info!(
            launcher = %self.name,
            missile = %missile_name,
            target = %target.name,
            velocity_x = solution.velocity.x,
            velocity_y = solution.velocity.y,
            time_to_intercept = solution.time,
            firing_angle = angle,
            t = ctx.t,
            "MISSILE_LAUNCHED: ミサイルを発射しました"
        );
        Some(missile_id)
    }

    /// 飛翔中のミサイルの監視（射程外なら自爆させ、無力化済みなら参照を外す）
    fn supervise_missile(&mut self, ctx: &mut TickContext<'_>) {
        let Some(missile_id) = self.current_missile else {
            return;
        };
        let Some(missile) = ctx.world().get(missile_id).and_then(Entity::as_missile) else {
            self.current_missile = None;
            return;
        };

        if missile.destroyed {
            self.current_missile = None;
        } else if geometry::distance(missile.position, self.position) > self.params.firing_range {
            debug!(
                launcher = %self.name,
                missile = %missile.name,
                "MISSILE_OUT_OF_RANGE: 射程外に出たミサイルを自爆させます"
            );
            ctx.self_destruct_missile(missile_id);
            self.current_missile = None;
        }
    }
}

impl IEntity for MissileSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        self.supervise_missile(ctx);

        if self.current_missile.is_none() && self.is_ready(ctx.t) {
            if let Some((target_id, target)) = self.find_target(ctx) {
                if self.fire(ctx, target_id, target).is_some() {
                    self.last_fire_time = Some(ctx.t);
                }
            }
        }

        self.position += self.velocity * ctx.dt;
    }

    fn draw(&mut self, surface: &mut dyn IRenderSurface) {
        self.artists
            .push(surface.plot_marker(self.position, Marker::Launcher));
    }

    fn erase(&mut self, surface: &mut dyn IRenderSurface) {
        render::remove_artists(surface, &mut self.artists);
    }
}

impl IPhysicalBody for MissileSystem {
    fn position(&self) -> Vector2 {
        self.position
    }

    fn velocity(&self) -> Vector2 {
        self.velocity
    }
}
