use crate::evasion::IAircraftController;
use crate::models::{
    common::Vector2,
    geometry,
    traits::{IEntity, IPhysicalBody},
};
use crate::render::{self, ArtistHandle, IRenderSurface, Marker};
use crate::world::TickContext;
use tracing::{debug, info};

/// 航空機
///
/// 操縦は装着されたコントローラに委ね、その結果の速度を `vmax` で方向を保ったまま
/// クリップしてから位置を積分します。撃墜されると速度0で停止し、以後は操縦されません。
#[derive(Debug)]
pub struct Aircraft {
    pub name: String,
    pub position: Vector2,
    pub velocity: Vector2,
    /// 軸ごとの最大速度
    pub vmax: Vector2,
    /// 軸ごとの単位時間あたり最大速度変化
    pub dvmax: Vector2,
    /// 撃墜されたか（destroyed ⇒ 速度0）
    pub destroyed: bool,
    controller: Box<dyn IAircraftController>,
    artists: Vec<ArtistHandle>,
}

impl Aircraft {
    pub fn new(
        name: impl Into<String>,
        position: Vector2,
        velocity: Vector2,
        vmax: impl Into<Vector2>,
        dvmax: impl Into<Vector2>,
        controller: Box<dyn IAircraftController>,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            velocity,
            vmax: vmax.into(),
            dvmax: dvmax.into(),
            destroyed: false,
            controller,
            artists: Vec::new(),
        }
    }

    pub fn controller(&self) -> &dyn IAircraftController {
        self.controller.as_ref()
    }

    /// 撃墜（不可逆）
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.velocity = Vector2::ZERO;
        info!(
            aircraft = %self.name,
            position_x = self.position.x,
            position_y = self.position.y,
            "AIRCRAFT_DESTROYED: 航空機が撃墜されました"
        );
    }
}

impl IEntity for Aircraft {
    fn name(&self) -> &str {
        &self.name
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        if !self.destroyed {
            self.velocity = self
                .controller
                .next_velocity(self, &ctx.world(), ctx.t, ctx.dt);
        }
        self.velocity = geometry::clamp_preserving_direction(self.velocity, self.vmax);
        self.position += self.velocity * ctx.dt;

        debug!(
            aircraft = %self.name,
            t = ctx.t,
            position = %self.position,
            velocity = %self.velocity,
            "航空機状態"
        );
    }

    fn draw(&mut self, surface: &mut dyn IRenderSurface) {
        let marker = if self.destroyed {
            Marker::AircraftDestroyed
        } else {
            Marker::Aircraft
        };
        self.artists.push(surface.plot_marker(self.position, marker));
        self.artists.extend(self.controller.draw(surface));
    }

    fn erase(&mut self, surface: &mut dyn IRenderSurface) {
        render::remove_artists(surface, &mut self.artists);
    }
}

impl IPhysicalBody for Aircraft {
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
    use crate::models::WorldBounds;
    use crate::render::{Artist, HeadlessSurface};
    use crate::world::World;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_tick_moves_toward_target() {
        let target = Vector2::new(50.0, 0.0);
        let start = Vector2::new(25.0, 90.0);
        let mut world = World::new(WorldBounds::default());
        let id = world.add_entity(Aircraft::new(
            "Aircraft",
            start,
            Vector2::ZERO,
            20.0,
            15.0,
            Box::new(TargetSeekingController::new(Some(target))),
        ));
        let mut surface = HeadlessSurface::new();
        world.step(0.05, &mut surface);

        let aircraft = world.get(id).and_then(|e| e.as_aircraft()).expect("aircraft");
        assert!(!aircraft.destroyed);
        // target - x = (25, -90) を dvmax=15 でクリップ → (25, -90) * 15/90
        let expected_v = Vector2::new(25.0, -90.0) * (15.0 / 90.0);
        assert_relative_eq!(aircraft.velocity.x, expected_v.x, epsilon = 1e-12);
        assert_relative_eq!(aircraft.velocity.y, expected_v.y, epsilon = 1e-12);
        assert!(aircraft.velocity.cross(&(target - start)).abs() < 1e-9);
        let expected_x = start + expected_v * 0.05;
        assert_relative_eq!(aircraft.position.x, expected_x.x, epsilon = 1e-12);
        assert_relative_eq!(aircraft.position.y, expected_x.y, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_clamped_to_vmax() {
        let mut world = World::new(WorldBounds::default());
        let id = world.add_entity(Aircraft::new(
            "Aircraft",
            Vector2::new(50.0, 50.0),
            Vector2::new(40.0, 10.0),
            20.0,
            15.0,
            Box::new(TargetSeekingController::new(None)),
        ));
        let mut surface = HeadlessSurface::new();
        world.step(0.1, &mut surface);
        let aircraft = world.get(id).and_then(|e| e.as_aircraft()).expect("aircraft");
        assert_relative_eq!(aircraft.velocity.x, 20.0);
        assert_relative_eq!(aircraft.velocity.y, 5.0);
        assert_relative_eq!(aircraft.position.x, 52.0);
        assert_relative_eq!(aircraft.position.y, 50.5);
    }

    #[test]
    fn test_destroy_is_terminal() {
        let mut aircraft = Aircraft::new(
            "Aircraft",
            Vector2::new(10.0, 10.0),
            Vector2::new(3.0, 4.0),
            20.0,
            15.0,
            Box::new(TargetSeekingController::new(Some(Vector2::new(50.0, 0.0)))),
        );
        aircraft.destroy();
        assert!(aircraft.destroyed);
        assert_eq!(aircraft.velocity, Vector2::ZERO);

        let mut world = World::new(WorldBounds::default());
        let id = world.add_entity(aircraft);
        let mut surface = HeadlessSurface::new();
        world.step(0.05, &mut surface);
        world.step(0.05, &mut surface);
        let aircraft = world.get(id).and_then(|e| e.as_aircraft()).expect("aircraft");
        assert_eq!(aircraft.velocity, Vector2::ZERO);
        assert_eq!(aircraft.position, Vector2::new(10.0, 10.0));

        // 撃墜マーカーと目的地マーカー
        let artists: Vec<Artist> = surface.artists().cloned().collect();
        assert_eq!(artists.len(), 2);
        assert!(artists.contains(&Artist::Marker {
            position: Vector2::new(10.0, 10.0),
            marker: Marker::AircraftDestroyed
        }));
        assert!(artists.contains(&Artist::Marker {
            position: Vector2::new(50.0, 0.0),
            marker: Marker::Waypoint
        }));
    }
}
