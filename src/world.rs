//! # World モジュール
//!
//! エンティティの登録簿（レジストリ）と固定時間刻みのメインループを提供します。
//!
//! ## レジストリ
//!
//! 登録順が保持され、その順序で `erase()` → `draw()` → `advance()` が呼ばれます。
//! エンティティは `EntityId` で参照され、ID は登録順に単調増加します。
//! 破壊されたエンティティは削除されず、`destroyed` フラグで論理的に退役します。
//!
//! ## ティック中の変更
//!
//! エンティティ *i* の `advance()` 中は、他のエンティティを読み取り専用の
//! `WorldView` で参照し、他者への作用は `WorldCommand` として `TickContext` に積みます。
//! コマンドは *i* の処理直後、次のエンティティに進む前に適用されます。
//! ティック中に登録されたエンティティ（発射されたミサイル）は末尾に追加され、
//! **同じティックの走査に含まれます**。
//!
//! ## ループ
//!
//! `t <= tmax` かつ終了要求がない間、一時停止中でなければ `t += dt` してから全エンティティを
//! 処理し、各量子の終わりにフレーム時間だけ待機して入力イベントを反映します。

use std::time::Duration;

use crate::input::{IInputSource, InputEvent, KeyBindings};
use crate::models::{Aircraft, Entity, EntityId, IEntity, Missile, MissileSystem, WorldBounds};
use crate::render::IRenderSurface;
use tracing::{debug, info, warn};

/// レジストリ内の1エントリ
#[derive(Debug)]
pub struct Registered {
    pub id: EntityId,
    pub entity: Entity,
}

/// 他エンティティへの作用
#[derive(Debug)]
pub enum WorldCommand {
    /// 航空機を撃墜する
    DestroyAircraft(EntityId),
    /// ミサイルを自爆させる
    SelfDestructMissile(EntityId),
    /// 新しいエンティティを登録する（IDは払い出し済み）
    Register(EntityId, Entity),
}

/// 処理中のエンティティ以外のレジストリを読み取るビュー
///
/// 処理中エンティティの前後のスライスを保持し、登録順での走査とIDによる検索を提供します。
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    head: &'a [Registered],
    tail: &'a [Registered],
}

impl<'a> WorldView<'a> {
    /// レジストリ全体のビュー
    pub fn new(entities: &'a [Registered]) -> Self {
        Self {
            head: entities,
            tail: &[],
        }
    }

    /// 処理中エンティティを除いたビュー
    pub fn around(head: &'a [Registered], tail: &'a [Registered]) -> Self {
        Self { head, tail }
    }

    /// IDでエンティティを検索
    pub fn get(&self, id: EntityId) -> Option<&'a Entity> {
        lookup(self.head, id).or_else(|| lookup(self.tail, id))
    }

    /// 登録順に走査
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &'a Entity)> + 'a {
        let (head, tail) = (self.head, self.tail);
        head.iter().chain(tail).map(|entry| (entry.id, &entry.entity))
    }

    pub fn aircraft(&self) -> impl Iterator<Item = (EntityId, &'a Aircraft)> + 'a {
        self.iter()
            .filter_map(|(id, entity)| entity.as_aircraft().map(|aircraft| (id, aircraft)))
    }

    pub fn missiles(&self) -> impl Iterator<Item = (EntityId, &'a Missile)> + 'a {
        self.iter()
            .filter_map(|(id, entity)| entity.as_missile().map(|missile| (id, missile)))
    }

    pub fn missile_systems(&self) -> impl Iterator<Item = (EntityId, &'a MissileSystem)> + 'a {
        self.iter().filter_map(|(id, entity)| {
            entity.as_missile_system().map(|system| (id, system))
        })
    }
}

fn lookup(entries: &[Registered], id: EntityId) -> Option<&Entity> {
    entries
        .binary_search_by_key(&id, |entry| entry.id)
        .ok()
        .map(|index| &entries[index].entity)
}

/// 1エンティティの `advance()` に渡される文脈
pub struct TickContext<'a> {
    /// 現在のモデル時刻
    pub t: f64,
    /// 時間刻み
    pub dt: f64,
    /// 世界座標の境界
    pub bounds: WorldBounds,
    self_id: EntityId,
    world: WorldView<'a>,
    next_id: &'a mut u64,
    commands: Vec<WorldCommand>,
}

impl<'a> TickContext<'a> {
    pub fn new(
        t: f64,
        dt: f64,
        bounds: WorldBounds,
        self_id: EntityId,
        world: WorldView<'a>,
        next_id: &'a mut u64,
    ) -> Self {
        Self {
            t,
            dt,
            bounds,
            self_id,
            world,
            next_id,
            commands: Vec::new(),
        }
    }

    /// 処理中エンティティ自身のID
    pub fn self_id(&self) -> EntityId {
        self.self_id
    }

    /// 他エンティティのビュー
    pub fn world(&self) -> WorldView<'a> {
        self.world
    }

    pub fn destroy_aircraft(&mut self, id: EntityId) {
        self.commands.push(WorldCommand::DestroyAircraft(id));
    }

    pub fn self_destruct_missile(&mut self, id: EntityId) {
        self.commands.push(WorldCommand::SelfDestructMissile(id));
    }

    /// 新しいエンティティを登録し、そのIDを返す
    ///
    /// 実際の追加は処理中エンティティの `advance()` 完了後です。
    pub fn register(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(*self.next_id);
        *self.next_id += 1;
        self.commands.push(WorldCommand::Register(id, entity));
        id
    }

    pub fn commands(&self) -> &[WorldCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<WorldCommand> {
        self.commands
    }
}

/// ループの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Paused,
    Terminated,
}

/// 世界モデル
#[derive(Debug)]
pub struct World {
    bounds: WorldBounds,
    entities: Vec<Registered>,
    next_id: u64,
    time: f64,
    paused: bool,
    exit: bool,
    terminated: bool,
    key_bindings: KeyBindings,
}

impl World {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            bounds,
            entities: Vec::new(),
            next_id: 0,
            time: 0.0,
            paused: false,
            exit: false,
            terminated: false,
            key_bindings: KeyBindings::default(),
        }
    }

    pub fn with_key_bindings(mut self, key_bindings: KeyBindings) -> Self {
        self.key_bindings = key_bindings;
        self
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// 現在のモデル時刻
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn state(&self) -> LoopState {
        if self.terminated {
            LoopState::Terminated
        } else if self.paused {
            LoopState::Paused
        } else {
            LoopState::Running
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }

    /// エンティティを末尾に登録
    pub fn add_entity(&mut self, entity: impl Into<Entity>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push(Registered {
            id,
            entity: entity.into(),
        });
        id
    }

    /// エンティティを登録簿から取り除く
    ///
    /// ループ自体は使用しません（エンティティは `destroyed` で退役します）。
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self
            .entities
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()?;
        Some(self.entities.remove(index).entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        lookup(&self.entities, id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let index = self
            .entities
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()?;
        Some(&mut self.entities[index].entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// レジストリ全体のビュー（登録順）
    pub fn view(&self) -> WorldView<'_> {
        WorldView::new(&self.entities)
    }

    /// 一時停止の切り替え
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        info!(paused = self.paused, "SIMULATION_PAUSE_TOGGLED: 一時停止状態を切り替えました");
    }

    /// 終了要求
    pub fn request_exit(&mut self) {
        info!("SIMULATION_EXIT_REQUESTED: 終了が要求されました");
        self.exit = true;
    }

    /// キー入力の処理
    pub fn on_key_press(&mut self, key: &str) {
        debug!(key, "キーが押されました");
        match self.key_bindings.resolve(key) {
            Some(event) => self.handle_input(event),
            None => debug!(key, "割り当てのないキーです"),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyPress(key) => self.on_key_press(&key),
            InputEvent::TogglePause => self.toggle_pause(),
            InputEvent::Exit => self.request_exit(),
        }
    }

    /// メインループの実行
    ///
    /// # 引数
    ///
    /// * `tmax` - 終了時刻
    /// * `dt` - 時間刻み
    /// * `frame_time` - 各量子の終わりに待機する実時間（秒）
    /// * `surface` - 描画面
    /// * `input` - 入力源。一時停止中に解除イベントが来なければループは終わりません
    ///
    /// # 戻り値
    ///
    /// 最終モデル時刻
    pub fn run(
        &mut self,
        tmax: f64,
        dt: f64,
        frame_time: f64,
        surface: &mut dyn IRenderSurface,
        input: &mut dyn IInputSource,
    ) -> f64 {
        info!(tmax, dt, frame_time, entities = self.entities.len(), "=== シミュレーション実行開始 ===");
        self.terminated = false;

        while !self.exit && self.time <= tmax {
            if !self.paused {
                self.step(dt, surface);
            }
            if frame_time > 0.0 {
                std::thread::sleep(Duration::from_secs_f64(frame_time));
            }
            for event in input.poll() {
                self.handle_input(event);
            }
        }

        self.terminated = true;
        info!(final_time = self.time, "=== シミュレーション完了 ===");
        self.time
    }

    /// 1量子分の処理（時刻を進めて全エンティティを処理）
    pub fn step(&mut self, dt: f64, surface: &mut dyn IRenderSurface) {
        let title = format!("t = {:.2}", self.time);
        debug!("{}", title);
        surface.set_title(&title);
        self.time += dt;

        let t = self.time;
        // 走査中に末尾へ追加されたエンティティも同じ量子で処理する
        let mut index = 0;
        while index < self.entities.len() {
            let commands = {
                let (head, rest) = self.entities.split_at_mut(index);
                let Some((current, tail)) = rest.split_first_mut() else {
                    break;
                };
                current.entity.erase(surface);
                current.entity.draw(surface);
                let mut ctx = TickContext::new(
                    t,
                    dt,
                    self.bounds,
                    current.id,
                    WorldView::around(head, tail),
                    &mut self.next_id,
                );
                current.entity.advance(&mut ctx);
                ctx.into_commands()
            };
            self.apply_commands(commands);
            index += 1;
        }
    }

    fn apply_commands(&mut self, commands: Vec<WorldCommand>) {
        for command in commands {
            match command {
                WorldCommand::DestroyAircraft(id) => match self.get_mut(id) {
                    Some(Entity::Aircraft(aircraft)) => aircraft.destroy(),
                    _ => warn!(%id, "撃墜対象の航空機が見つかりません"),
                },
                WorldCommand::SelfDestructMissile(id) => match self.get_mut(id) {
                    Some(Entity::Missile(missile)) => missile.self_destruct(),
                    _ => warn!(%id, "自爆対象のミサイルが見つかりません"),
                },
                WorldCommand::Register(id, entity) => {
                    debug!(%id, name = entity.name(), "エンティティを登録しました");
                    self.entities.push(Registered { id, entity });
                }
            }
        }
    }
}
