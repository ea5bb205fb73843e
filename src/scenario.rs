//! # Scenario モジュール
//!
//! YAML で記述されたシナリオ（世界の境界、航空機、ミサイルシステム、最適化器の設定）の
//! 読み込みと検証、および組み込みデモシナリオを提供します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::evasion::NelderMeadMinimizer;
use crate::input::{InputEvent, KeyBindings, ScriptedInput};
use crate::models::{Vector2, WorldBounds};

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "unnamed".to_string(),
            description: String::new(),
        }
    }
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    /// 各量子の終わりに待機する実時間
    pub frame_time_s: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_s: 0.05,
            t_max_s: 20.0,
            frame_time_s: 0.05,
        }
    }
}

/// 世界設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    pub region_rect: RegionRect,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionRect {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Default for RegionRect {
    fn default() -> Self {
        Self {
            xmin: 0.0,
            xmax: 100.0,
            ymin: 0.0,
            ymax: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl From<Position2D> for Vector2 {
    fn from(position: Position2D) -> Self {
        Vector2::new(position.x, position.y)
    }
}

/// 軸ごとの上限（スカラーなら全軸共通）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AxisLimit {
    Scalar(f64),
    PerAxis([f64; 2]),
}

impl AxisLimit {
    fn components(&self) -> [f64; 2] {
        match *self {
            AxisLimit::Scalar(value) => [value, value],
            AxisLimit::PerAxis(values) => values,
        }
    }
}

impl From<AxisLimit> for Vector2 {
    fn from(limit: AxisLimit) -> Self {
        Vector2::from(limit.components())
    }
}

impl fmt::Display for AxisLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisLimit::Scalar(value) => write!(f, "{value}"),
            AxisLimit::PerAxis([x, y]) => write!(f, "[{x}, {y}]"),
        }
    }
}

/// 最適化器設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iters: u64,
    pub sd_tolerance: f64,
    pub constraint_tolerance: f64,
    pub penalty_weight: f64,
    pub initial_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let defaults = NelderMeadMinimizer::default();
        Self {
            max_iters: defaults.max_iters,
            sd_tolerance: defaults.sd_tolerance,
            constraint_tolerance: defaults.constraint_tolerance,
            penalty_weight: defaults.penalty_weight,
            initial_step: defaults.initial_step,
        }
    }
}

impl OptimizerConfig {
    pub fn to_minimizer(&self) -> NelderMeadMinimizer {
        NelderMeadMinimizer {
            max_iters: self.max_iters,
            sd_tolerance: self.sd_tolerance,
            constraint_tolerance: self.constraint_tolerance,
            penalty_weight: self.penalty_weight,
            initial_step: self.initial_step,
        }
    }
}

/// 入力設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub pause_keys: Vec<String>,
    pub exit_keys: Vec<String>,
    /// 量子番号を指定したキー入力
    pub script: Vec<ScriptedKey>,
}

impl Default for InputConfig {
    fn default() -> Self {
        let bindings = KeyBindings::default();
        Self {
            pause_keys: bindings.pause_keys,
            exit_keys: bindings.exit_keys,
            script: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptedKey {
    pub frame: u64,
    pub key: String,
}

/// 距離関数の設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricConfig {
    #[default]
    Euclidean,
    Chebyshev,
}

/// 回避ソルバー設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverConfig {
    MaxMinDistance,
    MinFuel {
        safe_distance: f64,
    },
    MaxNextDistance {
        #[serde(default)]
        metric: MetricConfig,
    },
}

fn default_start_offset_coeff() -> f64 {
    0.9
}

/// 航空機コントローラ設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerConfig {
    TargetSeeking {
        #[serde(default)]
        target: Option<Position2D>,
    },
    OptimalEvasion {
        #[serde(default)]
        target: Option<Position2D>,
        solver: SolverConfig,
        #[serde(default = "default_start_offset_coeff")]
        start_offset_coeff: f64,
    },
}

impl ControllerConfig {
    pub fn target(&self) -> Option<Position2D> {
        match self {
            ControllerConfig::TargetSeeking { target }
            | ControllerConfig::OptimalEvasion { target, .. } => *target,
        }
    }

    fn describe(&self) -> String {
        match self {
            ControllerConfig::TargetSeeking { .. } => "目的地追従（回避なし）".to_string(),
            ControllerConfig::OptimalEvasion { solver, .. } => match solver {
                SolverConfig::MaxMinDistance => "最適回避（最接近距離最大化）".to_string(),
                SolverConfig::MinFuel { safe_distance } => {
                    format!("最適回避（燃料最小化, 安全距離 {safe_distance}）")
                }
                SolverConfig::MaxNextDistance { metric } => {
                    format!("最適回避（次ステップ距離最大化, {metric:?}）")
                }
            },
        }
    }
}

/// 航空機設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AircraftConfig {
    pub id: String,
    pub pos: Position2D,
    #[serde(default)]
    pub vel: Position2D,
    pub vmax: AxisLimit,
    pub dvmax: AxisLimit,
    pub controller: ControllerConfig,
}

/// ミサイルシステム設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissileSystemConfig {
    pub id: String,
    pub pos: Position2D,
    #[serde(default)]
    pub vel: Position2D,
    pub missile_vmax: f64,
    pub explosion_range: f64,
    pub rate_of_fire: f64,
    pub firing_range: f64,
    /// 真上方向からの最大発射角（ラジアン）
    pub max_firing_angle: f64,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub meta: ScenarioMeta,
    #[serde(default)]
    pub sim: SimulationConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub input: InputConfig,
    pub aircraft: Vec<AircraftConfig>,
    #[serde(default)]
    pub missile_systems: Vec<MissileSystemConfig>,
}

/// 組み込みデモ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    /// 回避しない航空機
    NoEvasion,
    /// 最接近距離を最大化して回避
    MaxMinDist,
    /// 安全距離6を保ちつつ燃料を節約して回避
    MinFuel,
    /// 次ステップの距離を最大化して回避
    MaxNextDist,
}

impl DemoKind {
    pub const ALL: [DemoKind; 4] = [
        DemoKind::NoEvasion,
        DemoKind::MaxMinDist,
        DemoKind::MinFuel,
        DemoKind::MaxNextDist,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoKind::NoEvasion => "noevasion",
            DemoKind::MaxMinDist => "maxmindist",
            DemoKind::MinFuel => "minfuel",
            DemoKind::MaxNextDist => "maxnextdist",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DemoKind::NoEvasion => "回避せずに目的地へ向かう航空機",
            DemoKind::MaxMinDist => "予測最接近距離を最大化して回避する航空機",
            DemoKind::MinFuel => "安全距離を保ちつつ燃料消費を最小化して回避する航空機",
            DemoKind::MaxNextDist => "次ステップでのミサイルとの距離を最大化して回避する航空機",
        }
    }

    fn controller(&self) -> ControllerConfig {
        let target = Some(Position2D { x: 50.0, y: 0.0 });
        let solver = match self {
            DemoKind::NoEvasion => return ControllerConfig::TargetSeeking { target },
            DemoKind::MaxMinDist => SolverConfig::MaxMinDistance,
            DemoKind::MinFuel => SolverConfig::MinFuel { safe_distance: 6.0 },
            DemoKind::MaxNextDist => SolverConfig::MaxNextDistance {
                metric: MetricConfig::Euclidean,
            },
        };
        ControllerConfig::OptimalEvasion {
            target,
            solver,
            start_offset_coeff: default_start_offset_coeff(),
        }
    }
}

impl FromStr for DemoKind {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DemoKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ScenarioError::UnknownDemo(s.to_string()))
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&contents, &path.display().to_string())
    }

    /// YAML文字列からシナリオ設定を読み込み
    ///
    /// # 引数
    ///
    /// * `yaml` - YAML文字列
    /// * `origin` - エラーメッセージに使う出所（ファイル名など）
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig =
            serde_yaml::from_str(yaml).map_err(|source| ScenarioError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 組み込みデモのシナリオ
    ///
    /// 航空機は (25, 90) から目的地 (50, 0) を目指し、(75, 0) と (25, 0) の
    /// 2基のミサイルシステムが迎撃します。
    pub fn demo(kind: DemoKind) -> Self {
        let missile_system = |id: &str, x: f64| MissileSystemConfig {
            id: id.to_string(),
            pos: Position2D { x, y: 0.0 },
            vel: Position2D::default(),
            missile_vmax: 50.0,
            explosion_range: 5.0,
            rate_of_fire: 2.0,
            firing_range: 50.0,
            max_firing_angle: 1.5,
        };

        Self {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: kind.name().to_string(),
                description: kind.description().to_string(),
            },
            sim: SimulationConfig {
                dt_s: 0.05,
                t_max_s: 20.0,
                frame_time_s: 0.05,
            },
            world: WorldConfig::default(),
            optimizer: OptimizerConfig::default(),
            input: InputConfig::default(),
            aircraft: vec![AircraftConfig {
                id: "Aircraft".to_string(),
                pos: Position2D { x: 25.0, y: 90.0 },
                vel: Position2D::default(),
                vmax: AxisLimit::Scalar(20.0),
                dvmax: AxisLimit::Scalar(15.0),
                controller: kind.controller(),
            }],
            missile_systems: vec![
                missile_system("MissileSystem1", 75.0),
                missile_system("MissileSystem2", 25.0),
            ],
        }
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        fn invalid(message: String) -> Result<(), ScenarioError> {
            Err(ScenarioError::Validation(message))
        }

        // 時間設定の検証
        if !(self.sim.dt_s > 0.0) {
            return invalid("dt_s must be positive".to_string());
        }
        if !(self.sim.t_max_s > 0.0) {
            return invalid("t_max_s must be positive".to_string());
        }
        if !(self.sim.frame_time_s >= 0.0) {
            return invalid("frame_time_s must be non-negative".to_string());
        }

        // 座標範囲の検証
        let region = &self.world.region_rect;
        if !(region.xmin < region.xmax && region.ymin < region.ymax) {
            return invalid("Invalid region bounds".to_string());
        }

        // 最適化器の検証
        let optimizer = &self.optimizer;
        if optimizer.max_iters == 0 {
            return invalid("optimizer.max_iters must be positive".to_string());
        }
        if !(optimizer.sd_tolerance >= 0.0
            && optimizer.constraint_tolerance >= 0.0
            && optimizer.penalty_weight > 0.0
            && optimizer.initial_step > 0.0)
        {
            return invalid("Invalid optimizer settings".to_string());
        }

        let mut ids = std::collections::HashSet::new();

        for aircraft in &self.aircraft {
            if !ids.insert(aircraft.id.as_str()) {
                return invalid(format!("Duplicate id {}", aircraft.id));
            }
            if !self.is_position_in_bounds(aircraft.pos) {
                return invalid(format!("Aircraft {} outside region bounds", aircraft.id));
            }
            let limits = [aircraft.vmax, aircraft.dvmax];
            if limits
                .iter()
                .flat_map(AxisLimit::components)
                .any(|value| !(value >= 0.0))
            {
                return invalid(format!("Aircraft {} vmax/dvmax must be non-negative", aircraft.id));
            }
            match &aircraft.controller {
                ControllerConfig::TargetSeeking { .. } => {}
                ControllerConfig::OptimalEvasion {
                    solver,
                    start_offset_coeff,
                    ..
                } => {
                    if !(*start_offset_coeff > 0.0 && *start_offset_coeff < 1.0) {
                        return invalid(format!(
                            "Aircraft {} start_offset_coeff {} must be in (0, 1)",
                            aircraft.id, start_offset_coeff
                        ));
                    }
                    if let SolverConfig::MinFuel { safe_distance } = solver {
                        if !(*safe_distance > 0.0) {
                            return invalid(format!(
                                "Aircraft {} safe_distance must be positive",
                                aircraft.id
                            ));
                        }
                    }
                }
            }
        }

        for system in &self.missile_systems {
            if !ids.insert(system.id.as_str()) {
                return invalid(format!("Duplicate id {}", system.id));
            }
            let non_negative = [
                system.missile_vmax,
                system.explosion_range,
                system.rate_of_fire,
                system.firing_range,
            ];
            if non_negative.iter().any(|value| !(*value >= 0.0)) {
                return invalid(format!(
                    "MissileSystem {} parameters must be non-negative",
                    system.id
                ));
            }
            if !(0.0..=std::f64::consts::PI).contains(&system.max_firing_angle) {
                return invalid(format!(
                    "MissileSystem {} max_firing_angle {} must be in [0, π]",
                    system.id, system.max_firing_angle
                ));
            }
        }

        Ok(())
    }

    /// 位置が領域内かどうかをチェック
    fn is_position_in_bounds(&self, position: Position2D) -> bool {
        self.bounds().contains(position.into())
    }

    pub fn bounds(&self) -> WorldBounds {
        let region = &self.world.region_rect;
        WorldBounds::new(
            Vector2::new(region.xmin, region.ymin),
            Vector2::new(region.xmax, region.ymax),
        )
    }

    pub fn key_bindings(&self) -> KeyBindings {
        KeyBindings {
            pause_keys: self.input.pause_keys.clone(),
            exit_keys: self.input.exit_keys.clone(),
        }
    }

    /// スクリプト入力源
    pub fn scripted_input(&self) -> ScriptedInput {
        ScriptedInput::new(
            self.input
                .script
                .iter()
                .map(|entry| (entry.frame, InputEvent::KeyPress(entry.key.clone())))
                .collect(),
        )
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}", self.sim.dt_s);
        println!("最大時間: {:.1}", self.sim.t_max_s);
        println!("フレーム時間: {:.3}秒", self.sim.frame_time_s);
        let region = &self.world.region_rect;
        println!(
            "世界範囲: x=[{}, {}], y=[{}, {}]",
            region.xmin, region.xmax, region.ymin, region.ymax
        );
        println!();

        println!("=== 航空機 ===");
        for aircraft in &self.aircraft {
            println!(
                "  {}: 位置 ({}, {}), vmax {}, dvmax {}",
                aircraft.id, aircraft.pos.x, aircraft.pos.y, aircraft.vmax, aircraft.dvmax
            );
            println!("    コントローラ: {}", aircraft.controller.describe());
            if let Some(target) = aircraft.controller.target() {
                println!("    目的地: ({}, {})", target.x, target.y);
            }
        }
        println!();

        println!("=== ミサイルシステム ===");
        for system in &self.missile_systems {
            println!(
                "  {}: 位置 ({}, {}), 射程 {}, 発射間隔 {}, 最大発射角 {:.2}rad",
                system.id,
                system.pos.x,
                system.pos.y,
                system.firing_range,
                system.rate_of_fire,
                system.max_firing_angle
            );
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML解析エラー {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_yaml::Error,
    },

    #[error("設定検証エラー: {0}")]
    Validation(String),

    #[error("不明なデモ名です: {0}")]
    UnknownDemo(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
meta:
  name: sample
  description: two launchers
sim:
  dt_s: 0.1
  t_max_s: 5.0
aircraft:
  - id: Aircraft
    pos: { x: 25.0, y: 90.0 }
    vmax: 20.0
    dvmax: [15.0, 10.0]
    controller:
      kind: optimal_evasion
      target: { x: 50.0, y: 0.0 }
      solver:
        type: min_fuel
        safe_distance: 6.0
missile_systems:
  - id: MissileSystem1
    pos: { x: 75.0, y: 0.0 }
    missile_vmax: 50.0
    explosion_range: 5.0
    rate_of_fire: 2.0
    firing_range: 50.0
    max_firing_angle: 1.5
input:
  script:
    - { frame: 3, key: escape }
"#;

    #[test]
    fn test_parse_from_file() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write");

        let config = ScenarioConfig::from_file(file.path()).expect("parse");
        assert_eq!(config.meta.name, "sample");
        assert_eq!(config.sim.dt_s, 0.1);
        assert_eq!(config.sim.frame_time_s, 0.05);
        assert_eq!(config.world.region_rect.xmax, 100.0);
        assert_eq!(config.aircraft[0].dvmax, AxisLimit::PerAxis([15.0, 10.0]));
        assert_eq!(Vector2::from(config.aircraft[0].vmax), Vector2::splat(20.0));
        assert_eq!(
            config.aircraft[0].controller,
            ControllerConfig::OptimalEvasion {
                target: Some(Position2D { x: 50.0, y: 0.0 }),
                solver: SolverConfig::MinFuel { safe_distance: 6.0 },
                start_offset_coeff: 0.9,
            }
        );
        assert_eq!(config.missile_systems.len(), 1);
        assert_eq!(config.key_bindings(), KeyBindings::default());
        assert_eq!(config.scripted_input().remaining(), 1);
    }

    #[test]
    fn test_missing_file() {
        let result = ScenarioConfig::from_file("does/not/exist.yaml");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error_reports_origin() {
        let error = ScenarioConfig::from_yaml_str("aircraft: [", "broken.yaml").unwrap_err();
        assert!(matches!(error, ScenarioError::Parse { .. }));
        assert!(error.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ScenarioConfig::demo(DemoKind::MinFuel);
        assert!(config.validate().is_ok());

        config.sim.dt_s = 0.0;
        assert!(matches!(config.validate(), Err(ScenarioError::Validation(_))));

        let mut config = ScenarioConfig::demo(DemoKind::MaxMinDist);
        config.aircraft[0].pos = Position2D { x: 150.0, y: 50.0 };
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::demo(DemoKind::MaxMinDist);
        config.missile_systems[1].id = "MissileSystem1".to_string();
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::demo(DemoKind::MaxNextDist);
        config.missile_systems[0].max_firing_angle = 4.0;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::demo(DemoKind::MaxNextDist);
        if let ControllerConfig::OptimalEvasion {
            start_offset_coeff, ..
        } = &mut config.aircraft[0].controller
        {
            *start_offset_coeff = 1.0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demo_kinds() {
        for kind in DemoKind::ALL {
            assert_eq!(kind.name().parse::<DemoKind>().expect("known demo"), kind);
            let config = ScenarioConfig::demo(kind);
            assert!(config.validate().is_ok());
            assert_eq!(config.aircraft.len(), 1);
            assert_eq!(config.missile_systems.len(), 2);
        }
        assert!(matches!(
            "optimal".parse::<DemoKind>(),
            Err(ScenarioError::UnknownDemo(_))
        ));
    }

    #[test]
    fn test_scenario_files_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        for kind in DemoKind::ALL {
            let path = dir.join(format!("{}.yaml", kind.name()));
            let config = ScenarioConfig::from_file(&path).expect("scenario file");
            assert_eq!(config.meta.name, kind.name());
            assert_eq!(config.aircraft[0].controller, ScenarioConfig::demo(kind).aircraft[0].controller);
        }
    }
}
