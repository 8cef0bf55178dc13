use tracing::{debug, trace};

use crate::error::SimError;
use crate::models::{
    common::{SensorKind, TimeStep, Vector3},
    sensor::{Anchor, NeighborMap, Sensor, Tag},
    traits::{IMovable, ISensor},
};
use crate::scenario::NetworkConfig;
use crate::snapshot::{AnchorSnapshot, NetworkSnapshot, TagSnapshot};

/// ネットワークの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// 構築直後（ステップ未実行）
    Ready,
    /// 1回以上ステップを実行済み
    Stepped,
}

/// センサーネットワーク
///
/// アンカーとタグの2つの互いに素なコレクションを排他的に所有し、
/// 固定時間刻みで状態を進めます。外部には [`NetworkSnapshot`] のコピーだけを渡します。
#[derive(Debug, Clone)]
pub struct SensorNetwork {
    anchors: Vec<Anchor>,
    tags: Vec<Tag>,
    steps_taken: u64,
    elapsed: f64,
}

impl SensorNetwork {
    /// 設定からネットワークを構築
    ///
    /// 全センサーの近傍マップは最初の `step` まで空です。
    pub fn initialize(config: &NetworkConfig) -> Result<Self, SimError> {
        config.validate()?;

        let radius = config.sensing_radius;
        let anchors: Vec<Anchor> = config
            .anchors
            .iter()
            .enumerate()
            .map(|(index, anchor)| Anchor::new(config.anchor_id(index), anchor.pos.0, radius))
            .collect();

        let tags = config
            .tags
            .iter()
            .enumerate()
            .map(|(index, tag)| {
                let id = config.tag_id(index);
                let (velocity, bounds) = tag.motion().ok_or_else(|| {
                    SimError::invalid_configuration(format!(
                        "tag {} requires velocity, lower_bound and upper_bound",
                        id
                    ))
                })?;
                Ok(Tag::new(id, tag.pos.0, radius, velocity, bounds, config.initial_uncertainty))
            })
            .collect::<Result<Vec<Tag>, SimError>>()?;

        debug!(
            "センサーネットワーク初期化: アンカー{}基, タグ{}基, 探知半径 {:.2}",
            anchors.len(),
            tags.len(),
            radius
        );

        Ok(Self {
            anchors,
            tags,
            steps_taken: 0,
            elapsed: 0.0,
        })
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn state(&self) -> NetworkState {
        if self.steps_taken == 0 {
            NetworkState::Ready
        } else {
            NetworkState::Stepped
        }
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// これまでに進めた時間の合計（秒）
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// 1ステップ進める
    ///
    /// 1. 全タグを移動
    /// 2. 移動後の配置で全タグの近傍マップを再計算
    /// 3. 全タグの近傍マップが確定してから不確かさを更新
    pub fn step(&mut self, dt: TimeStep, include_tag_links: bool) {
        for tag in &mut self.tags {
            tag.move_agent(dt.get());
        }

        let neighbor_maps: Vec<NeighborMap> = self
            .tags
            .iter()
            .map(|tag| tag.compute_neighbors(&self.anchors, &self.tags, include_tag_links))
            .collect();
        for (tag, neighbors) in self.tags.iter_mut().zip(neighbor_maps) {
            tag.replace_neighbors(neighbors);
        }

        for tag in &mut self.tags {
            tag.update_uncertainty();
            trace!(
                "{}: 位置 {} 近傍 {} 不確かさ {:.3}",
                tag.get_id(),
                tag.get_position(),
                tag.neighbor_count(),
                tag.uncertainty()
            );
        }

        self.steps_taken += 1;
        self.elapsed += dt.get();
    }

    /// 現在状態の読み取り専用コピー
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            step: self.steps_taken,
            time: self.elapsed,
            anchors: self.anchors.iter().map(AnchorSnapshot::from).collect(),
            tags: self.tags.iter().map(TagSnapshot::from).collect(),
        }
    }

    fn find(&self, id: &str) -> Option<&dyn ISensor> {
        self.anchors
            .iter()
            .find(|anchor| anchor.get_id() == id)
            .map(|anchor| anchor as &dyn ISensor)
            .or_else(|| {
                self.tags
                    .iter()
                    .find(|tag| tag.get_id() == id)
                    .map(|tag| tag as &dyn ISensor)
            })
    }

    /// IDを所属コレクションから解決し、種別と位置を返す
    pub fn locate(&self, id: &str) -> Option<(SensorKind, Vector3)> {
        self.find(id).map(|sensor| (sensor.get_kind(), sensor.get_position()))
    }

    /// 指定IDのセンサーのコピー
    pub fn sensor(&self, id: &str) -> Option<Sensor> {
        self.anchors
            .iter()
            .find(|anchor| anchor.get_id() == id)
            .cloned()
            .map(Sensor::Fixed)
            .or_else(|| {
                self.tags
                    .iter()
                    .find(|tag| tag.get_id() == id)
                    .cloned()
                    .map(Sensor::Mobile)
            })
    }
}
