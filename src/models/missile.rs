use crate::models::{
    common::{EntityId, Vector2},
    geometry,
    traits::{IEntity, IPhysicalBody},
};
use crate::render::{self, ArtistHandle, IRenderSurface, Marker};
use crate::world::TickContext;
use tracing::{debug, info};

/// ミサイル生成時のパラメータ
///
/// ミサイルシステムがファクトリに渡す発射諸元です。
#[derive(Debug, Clone, PartialEq)]
pub struct MissileLaunch {
    pub name: String,
    pub position: Vector2,
    pub velocity: Vector2,
    pub vmax: f64,
    pub explosion_range: f64,
    pub target: EntityId,
    pub owner: EntityId,
}

/// ミサイル
///
/// 発射時に決まった速度で直進する無誘導弾です。目標が `explosion_range` 以内に入ると
/// 近接信管で爆発して目標を撃墜し、世界座標の境界外に出ると自爆します。
/// いずれの場合も `destroyed` となり、以後は静止したまま登録簿に残ります。
#[derive(Debug)]
pub struct Missile {
    pub name: String,
    pub position: Vector2,
    pub velocity: Vector2,
    /// 最大速度
    pub vmax: f64,
    /// 近接信管の作動距離
    pub explosion_range: f64,
    /// 爆発したか（爆発 ⇒ destroyed）
    pub exploded: bool,
    /// 無力化されたか（destroyed ⇒ 速度0）
    pub destroyed: bool,
    /// 目標の航空機
    pub target: EntityId,
    /// 発射したミサイルシステム
    pub owner: EntityId,
    artists: Vec<ArtistHandle>,
}

impl Missile {
    /// 無誘導ミサイルを作成
    pub fn unguided(launch: MissileLaunch) -> Self {
        Self {
            name: launch.name,
            position: launch.position,
            velocity: launch.velocity,
            vmax: launch.vmax,
            explosion_range: launch.explosion_range,
            exploded: false,
            destroyed: false,
            target: launch.target,
            owner: launch.owner,
            artists: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.destroyed
    }

    fn deactivate(&mut self) {
        self.destroyed = true;
        self.velocity = Vector2::ZERO;
    }

    /// 近接信管による爆発
    pub fn explode(&mut self) {
        self.exploded = true;
        self.deactivate();
    }

    /// 自爆（燃料切れ・戦域外への離脱）
    pub fn self_destruct(&mut self) {
        if self.destroyed {
            return;
        }
        self.deactivate();
        info!(
            missile = %self.name,
            position_x = self.position.x,
            position_y = self.position.y,
            "MISSILE_SELF_DESTRUCT: ミサイルが自爆しました"
        );
    }
}

impl IEntity for Missile {
    fn name(&self) -> &str {
        &self.name
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        let target_distance = ctx
            .world()
            .get(self.target)
            .map(|target| geometry::distance(target.position(), self.position))
            .unwrap_or(f64::INFINITY);

        if !self.destroyed && target_distance <= self.explosion_range {
            self.explode();
            ctx.destroy_aircraft(self.target);
            info!(
                missile = %self.name,
                target = %self.target,
                position_x = self.position.x,
                position_y = self.position.y,
                target_distance,
                t = ctx.t,
                "MISSILE_EXPLODED: ミサイルが目標の近傍で爆発しました"
            );
        }

        // 爆発した量子でも位置積分は行う（速度は0）
        self.position += self.velocity * ctx.dt;

        if !self.destroyed && ctx.bounds.is_outside(self.position) {
            debug!(missile = %self.name, "ミサイルが戦域外に出ました");
            self.self_destruct();
        }
    }

    fn draw(&mut self, surface: &mut dyn IRenderSurface) {
        if self.exploded {
            self.artists
                .push(surface.plot_circle(self.position, self.explosion_range));
        }
        let marker = if self.destroyed {
            Marker::MissileInert
        } else {
            Marker::Missile
        };
        self.artists.push(surface.plot_marker(self.position, marker));
    }

    fn erase(&mut self, surface: &mut dyn IRenderSurface) {
        render::remove_artists(surface, &mut self.artists);
    }
}

impl IPhysicalBody for Missile {
    fn position(&self) -> Vector2 {
        self.position
    }

    fn velocity(&self) -> Vector2 {
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evasion::TargetSeekingController;
    use crate::models::{Aircraft, Entity, WorldBounds};
    use crate::render::HeadlessSurface;
    use crate::world::World;

    fn launch(position: Vector2, velocity: Vector2, target: EntityId) -> MissileLaunch {
        MissileLaunch {
            name: "Launcher.Missile0".to_string(),
            position,
            velocity,
            vmax: 50.0,
            explosion_range: 5.0,
            target,
            owner: EntityId(99),
        }
    }

    fn parked_aircraft(position: Vector2) -> Aircraft {
        Aircraft::new(
            "Aircraft",
            position,
            Vector2::ZERO,
            20.0,
            15.0,
            Box::new(TargetSeekingController::new(None)),
        )
    }

    #[test]
    fn test_missile_explodes_within_range() {
        let mut world = World::new(WorldBounds::default());
        let aircraft_id = world.add_entity(parked_aircraft(Vector2::new(50.0, 50.0)));
        let missile_id = world.add_entity(Missile::unguided(launch(
            Vector2::new(50.0, 46.0),
            Vector2::new(0.0, 10.0),
            aircraft_id,
        )));
        let mut surface = HeadlessSurface::new();
        world.step(0.05, &mut surface);

        let missile = world.get(missile_id).and_then(Entity::as_missile).expect("missile");
        assert!(missile.exploded);
        assert!(missile.destroyed);
        assert_eq!(missile.velocity, Vector2::ZERO);
        assert_eq!(missile.position, Vector2::new(50.0, 46.0));

        let aircraft = world.get(aircraft_id).and_then(Entity::as_aircraft).expect("aircraft");
        assert!(aircraft.destroyed);
        assert_eq!(aircraft.velocity, Vector2::ZERO);
    }

    #[test]
    fn test_missile_self_destructs_out_of_bounds() {
        let mut world = World::new(WorldBounds::default());
        let aircraft_id = world.add_entity(parked_aircraft(Vector2::new(10.0, 10.0)));
        let missile_id = world.add_entity(Missile::unguided(launch(
            Vector2::new(90.0, 99.0),
            Vector2::new(0.0, 50.0),
            aircraft_id,
        )));
        let mut surface = HeadlessSurface::new();
        world.step(0.05, &mut surface);

        let missile = world.get(missile_id).and_then(Entity::as_missile).expect("missile");
        assert!(missile.destroyed);
        assert!(!missile.exploded);
        assert_eq!(missile.velocity, Vector2::ZERO);
        // 境界外へ出た位置で停止する
        assert!(missile.position.y > 100.0);

        let aircraft = world.get(aircraft_id).and_then(Entity::as_aircraft).expect("aircraft");
        assert!(!aircraft.destroyed);
    }

    #[test]
    fn test_destroyed_missile_stays_inert() {
        let mut missile = Missile::unguided(launch(Vector2::new(1.0, 1.0), Vector2::new(3.0, 0.0), EntityId(0)));
        missile.self_destruct();
        assert!(missile.destroyed && !missile.exploded);
        missile.self_destruct();
        assert_eq!(missile.velocity, Vector2::ZERO);

        let mut surface = HeadlessSurface::new();
        missile.draw(&mut surface);
        let markers: Vec<_> = surface.artists().cloned().collect();
        assert_eq!(
            markers,
            vec![render::Artist::Marker {
                position: Vector2::new(1.0, 1.0),
                marker: Marker::MissileInert
            }]
        );
        missile.erase(&mut surface);
        assert_eq!(surface.artist_count(), 0);
    }
}
