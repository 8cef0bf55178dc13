use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::SimError;
use crate::models::{ReflectionBounds, Vector3};

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// 時間刻み Δt（秒）
    pub dt_s: f64,
    /// 総実行時間（秒）
    pub t_max_s: f64,
}

/// 座標（YAMLでは `[x, y]` または `[x, y, z]`）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Point(pub Vector3);

impl TryFrom<Vec<f64>> for Point {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y] => Ok(Point(Vector3::planar(*x, *y))),
            [x, y, z] => Ok(Point(Vector3::new(*x, *y, *z))),
            other => Err(format!("座標は2要素または3要素で指定してください: {:?}", other)),
        }
    }
}

impl From<Point> for Vec<f64> {
    fn from(point: Point) -> Self {
        vec![point.0.x, point.0.y, point.0.z]
    }
}

impl From<Vector3> for Point {
    fn from(v: Vector3) -> Self {
        Point(v)
    }
}

/// アンカー設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnchorConfig {
    /// 省略時は `A{index}`
    #[serde(default)]
    pub id: Option<String>,
    pub pos: Point,
}

/// タグ設定
///
/// 移動センサー専用の項目はファイル上は省略可能にしておき、
/// 欠落は初期化時の検証で `InvalidConfiguration` として報告します。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TagConfig {
    /// 省略時は `T{index}`
    #[serde(default)]
    pub id: Option<String>,
    pub pos: Point,
    #[serde(default)]
    pub velocity: Option<Point>,
    #[serde(default)]
    pub lower_bound: Option<Point>,
    #[serde(default)]
    pub upper_bound: Option<Point>,
}

impl TagConfig {
    /// 速度と反射境界。いずれかが欠けていれば `None`。
    pub fn motion(&self) -> Option<(Vector3, ReflectionBounds)> {
        let velocity = self.velocity?;
        let lower = self.lower_bound?;
        let upper = self.upper_bound?;
        Some((velocity.0, ReflectionBounds::new(lower.0, upper.0)))
    }
}

/// センサーネットワーク設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// 全センサー共通の探知半径
    pub sensing_radius: f64,
    /// タグ同士の近傍リンクを有効にするか
    #[serde(default = "default_tag_links")]
    pub tag_links: bool,
    /// タグの不確かさ初期値
    #[serde(default = "default_initial_uncertainty")]
    pub initial_uncertainty: f64,
    pub anchors: Vec<AnchorConfig>,
    pub tags: Vec<TagConfig>,
}

fn default_tag_links() -> bool {
    true
}

fn default_initial_uncertainty() -> f64 {
    70.0
}

impl NetworkConfig {
    pub fn anchor_id(&self, index: usize) -> String {
        self.anchors[index]
            .id
            .clone()
            .unwrap_or_else(|| format!("A{}", index))
    }

    pub fn tag_id(&self, index: usize) -> String {
        self.tags[index]
            .id
            .clone()
            .unwrap_or_else(|| format!("T{}", index))
    }

    /// ネットワーク設定の検証
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.sensing_radius.is_finite() && self.sensing_radius > 0.0) {
            return Err(SimError::invalid_configuration(format!(
                "sensing_radius must be positive: {}",
                self.sensing_radius
            )));
        }
        if !(self.initial_uncertainty.is_finite() && self.initial_uncertainty > 0.0) {
            return Err(SimError::invalid_configuration(format!(
                "initial_uncertainty must be positive: {}",
                self.initial_uncertainty
            )));
        }

        let mut seen = HashSet::new();
        for index in 0..self.anchors.len() {
            let id = self.anchor_id(index);
            if !self.anchors[index].pos.0.is_finite() {
                return Err(SimError::invalid_configuration(format!(
                    "anchor {} has a non-finite position",
                    id
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(SimError::invalid_configuration(format!("duplicate sensor id {}", id)));
            }
        }

        for index in 0..self.tags.len() {
            let id = self.tag_id(index);
            let tag = &self.tags[index];
            let Some((velocity, bounds)) = tag.motion() else {
                return Err(SimError::invalid_configuration(format!(
                    "tag {} requires velocity, lower_bound and upper_bound",
                    id
                )));
            };
            for (field, value) in [
                ("pos", tag.pos.0),
                ("velocity", velocity),
                ("lower_bound", bounds.lower),
                ("upper_bound", bounds.upper),
            ] {
                if !value.is_finite() {
                    return Err(SimError::invalid_configuration(format!(
                        "tag {} has a non-finite {}: {}",
                        id, field, value
                    )));
                }
            }
            if bounds.lower.x > bounds.upper.x || bounds.lower.y > bounds.upper.y {
                return Err(SimError::invalid_configuration(format!(
                    "tag {} has lower_bound {} above upper_bound {}",
                    id, bounds.lower, bounds.upper
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(SimError::invalid_configuration(format!("duplicate sensor id {}", id)));
            }
        }

        Ok(())
    }
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub network: NetworkConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// 10m × 10m の基準アリーナ（アンカー6基、タグ3基）
    pub fn reference_arena() -> Self {
        let anchors = [(0.2, 0.2), (4.0, 0.2), (3.0, 9.8), (9.8, 6.0), (9.8, 9.8), (0.2, 5.0)]
            .into_iter()
            .map(|(x, y)| AnchorConfig {
                id: None,
                pos: Vector3::planar(x, y).into(),
            })
            .collect();

        let tags = [
            ((1.0, 2.0), (0.2, 0.5), (1.0, 1.0), (5.0, 7.0)),
            ((5.0, 5.0), (-0.3, 0.4), (7.0, 6.0), (10.0, 9.0)),
            ((9.0, 1.0), (0.1, 0.7), (3.0, 0.5), (9.5, 5.5)),
        ]
        .into_iter()
        .map(|(pos, vel, lower, upper)| TagConfig {
            id: None,
            pos: Vector3::planar(pos.0, pos.1).into(),
            velocity: Some(Vector3::planar(vel.0, vel.1).into()),
            lower_bound: Some(Vector3::planar(lower.0, lower.1).into()),
            upper_bound: Some(Vector3::planar(upper.0, upper.1).into()),
        })
        .collect();

        Self {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: "reference_arena".to_string(),
                description: "10m四方のアリーナにアンカー6基とタグ3基を配置した基準シナリオ".to_string(),
            },
            sim: SimulationConfig {
                dt_s: 0.1,
                t_max_s: 20.0,
            },
            network: NetworkConfig {
                sensing_radius: 7.0,
                tag_links: true,
                initial_uncertainty: 70.0,
                anchors,
                tags,
            },
        }
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.sim.dt_s.is_finite() && self.sim.dt_s > 0.0) {
            return Err(SimError::invalid_configuration(format!(
                "dt_s must be positive: {}",
                self.sim.dt_s
            )));
        }
        if !(self.sim.t_max_s.is_finite() && self.sim.t_max_s > 0.0) {
            return Err(SimError::invalid_configuration(format!(
                "t_max_s must be positive: {}",
                self.sim.t_max_s
            )));
        }

        self.network.validate()
    }

    /// 実行ステップ数（時刻 0, Δt, 2Δt, … < t_max の個数）
    pub fn total_steps(&self) -> u64 {
        (self.sim.t_max_s / self.sim.dt_s).ceil() as u64
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒 ({}ステップ)", self.sim.t_max_s, self.total_steps());
        println!();

        println!("=== センサーネットワーク ===");
        println!("探知半径: {:.2}", self.network.sensing_radius);
        println!("タグ間リンク: {}", if self.network.tag_links { "有効" } else { "無効" });
        println!("不確かさ初期値: {:.1}", self.network.initial_uncertainty);
        println!("アンカー: {}基", self.network.anchors.len());
        for (index, anchor) in self.network.anchors.iter().enumerate() {
            println!("  {}: {}", self.network.anchor_id(index), anchor.pos.0);
        }
        println!("タグ: {}基", self.network.tags.len());
        for (index, tag) in self.network.tags.iter().enumerate() {
            let velocity = tag.velocity.map(|v| v.0.to_string()).unwrap_or_else(|| "-".to_string());
            println!("  {}: {} (速度: {})", self.network.tag_id(index), tag.pos.0, velocity);
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(#[from] SimError),
}
