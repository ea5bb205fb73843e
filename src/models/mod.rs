// 基本的なデータ型
pub mod common;

// 幾何計算と射撃解算
pub mod geometry;
pub mod intercept;

// エンティティの能力（trait）定義
pub mod traits;

// 各エンティティモデルの実装
pub mod aircraft;
pub mod launcher;
pub mod missile;

// 便利な re-export
pub use aircraft::Aircraft;
pub use common::*;
pub use intercept::{FiringSolution, solve_firing_solution};
pub use launcher::{LauncherParams, MissileFactory, MissileSystem, REFERENCE_UP_AXIS};
pub use missile::{Missile, MissileLaunch};
pub use traits::*;

use crate::render::IRenderSurface;
use crate::world::TickContext;

/// レジストリに登録されるエンティティ
#[derive(Debug)]
pub enum Entity {
    Aircraft(Aircraft),
    Missile(Missile),
    MissileSystem(MissileSystem),
}

impl Entity {
    pub fn as_aircraft(&self) -> Option<&Aircraft> {
        match self {
            Entity::Aircraft(aircraft) => Some(aircraft),
            _ => None,
        }
    }

    pub fn as_missile(&self) -> Option<&Missile> {
        match self {
            Entity::Missile(missile) => Some(missile),
            _ => None,
        }
    }

    pub fn as_missile_system(&self) -> Option<&MissileSystem> {
        match self {
            Entity::MissileSystem(system) => Some(system),
            _ => None,
        }
    }

    fn as_entity(&self) -> &dyn IEntity {
        match self {
            Entity::Aircraft(aircraft) => aircraft,
            Entity::Missile(missile) => missile,
            Entity::MissileSystem(system) => system,
        }
    }

    fn as_entity_mut(&mut self) -> &mut dyn IEntity {
        match self {
            Entity::Aircraft(aircraft) => aircraft,
            Entity::Missile(missile) => missile,
            Entity::MissileSystem(system) => system,
        }
    }
}

impl IEntity for Entity {
    fn name(&self) -> &str {
        self.as_entity().name()
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        self.as_entity_mut().advance(ctx);
    }

    fn draw(&mut self, surface: &mut dyn IRenderSurface) {
        self.as_entity_mut().draw(surface);
    }

    fn erase(&mut self, surface: &mut dyn IRenderSurface) {
        self.as_entity_mut().erase(surface);
    }
}

impl IPhysicalBody for Entity {
    fn position(&self) -> Vector2 {
        match self {
            Entity::Aircraft(aircraft) => aircraft.position,
            Entity::Missile(missile) => missile.position,
            Entity::MissileSystem(system) => system.position,
        }
    }

    fn velocity(&self) -> Vector2 {
        match self {
            Entity::Aircraft(aircraft) => aircraft.velocity,
            Entity::Missile(missile) => missile.velocity,
            Entity::MissileSystem(system) => system.velocity,
        }
    }
}

impl From<Aircraft> for Entity {
    fn from(aircraft: Aircraft) -> Self {
        Entity::Aircraft(aircraft)
    }
}

impl From<Missile> for Entity {
    fn from(missile: Missile) -> Self {
        Entity::Missile(missile)
    }
}

impl From<MissileSystem> for Entity {
    fn from(system: MissileSystem) -> Self {
        Entity::MissileSystem(system)
    }
}
