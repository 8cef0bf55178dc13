use std::collections::HashMap;

use serde::Serialize;

use crate::error::SimError;
use crate::models::{
    common::{SensorKind, Vector3},
    traits::{IMovable, ISensor},
};

/// 不確かさの増減率（近傍数1つあたり）
pub const UNCERTAINTY_GROWTH: f64 = 1.02;

/// 不確かさが変化しない近傍数
pub const NEIGHBOR_EQUILIBRIUM: i32 = 3;

/// 近傍数に対する不確かさの乗数 `1.02^(3 - n)`
///
/// 近傍が2以下なら増加、ちょうど3なら不変、4以上なら幾何級数的に減少します。
pub fn uncertainty_factor(neighbor_count: usize) -> f64 {
    let n = i32::try_from(neighbor_count).unwrap_or(i32::MAX);
    UNCERTAINTY_GROWTH.powi(NEIGHBOR_EQUILIBRIUM.saturating_sub(n))
}

/// 近傍エントリ
///
/// 距離に加えて相手の種別を保持するので、描画側はIDの文字列から
/// アンカーかタグかを推測する必要がありません。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    /// 近傍センサーまでの距離
    pub distance: f64,
    /// 近傍センサーの種別
    pub kind: SensorKind,
}

/// 近傍ID → 近傍エントリ
pub type NeighborMap = HashMap<String, Neighbor>;

/// 固定センサー（アンカー）
///
/// 既知の固定位置を持つ基準点です。移動せず、近傍マップも持ちません。
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    id: String,
    location: Vector3,
    sensing_range: f64,
}

impl Anchor {
    pub fn new(id: impl Into<String>, location: Vector3, sensing_range: f64) -> Self {
        Self {
            id: id.into(),
            location,
            sensing_range,
        }
    }
}

impl ISensor for Anchor {
    fn get_id(&self) -> &str {
        &self.id
    }

    fn get_kind(&self) -> SensorKind {
        SensorKind::Fixed
    }

    fn get_position(&self) -> Vector3 {
        self.location
    }

    fn get_sensing_range(&self) -> f64 {
        self.sensing_range
    }
}

/// タグの反射境界（x, y 各軸で独立に判定する矩形）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionBounds {
    /// 左下隅
    pub lower: Vector3,
    /// 右上隅
    pub upper: Vector3,
}

impl ReflectionBounds {
    pub fn new(lower: Vector3, upper: Vector3) -> Self {
        Self { lower, upper }
    }

    /// 1軸分の反射判定。移動前の位置で速度の符号を決める。
    fn reflect_axis(position: f64, lower: f64, upper: f64, velocity: f64) -> f64 {
        if position < lower {
            velocity.abs()
        } else if position > upper {
            -velocity.abs()
        } else {
            velocity
        }
    }

    /// 現在位置に応じて境界内向きに補正した速度を返す（z成分はそのまま）
    pub fn reflect(&self, position: Vector3, velocity: Vector3) -> Vector3 {
        Vector3::new(
            Self::reflect_axis(position.x, self.lower.x, self.upper.x, velocity.x),
            Self::reflect_axis(position.y, self.lower.y, self.upper.y, velocity.y),
            velocity.z,
        )
    }
}

/// 移動センサー（タグ）
///
/// 速度と反射境界に従って移動し、毎ステップ近傍マップと
/// 位置推定の不確かさを更新します。
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    id: String,
    location: Vector3,
    sensing_range: f64,
    velocity: Vector3,
    bounds: ReflectionBounds,
    uncertainty: f64,
    neighbors: NeighborMap,
}

impl Tag {
    /// 新しいタグを作成します（近傍マップは空）
    pub fn new(
        id: impl Into<String>,
        location: Vector3,
        sensing_range: f64,
        velocity: Vector3,
        bounds: ReflectionBounds,
        uncertainty: f64,
    ) -> Self {
        Self {
            id: id.into(),
            location,
            sensing_range,
            velocity,
            bounds,
            uncertainty,
            neighbors: NeighborMap::new(),
        }
    }

    pub fn bounds(&self) -> ReflectionBounds {
        self.bounds
    }

    pub fn uncertainty(&self) -> f64 {
        self.uncertainty
    }

    pub fn neighbors(&self) -> &NeighborMap {
        &self.neighbors
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// 近傍マップを計算して返す（自身の状態は変更しない）
    ///
    /// 探知範囲未満の距離にある全アンカーと、`include_tag_links` が真なら
    /// 自身以外の全タグを近傍とします。
    pub fn compute_neighbors(
        &self,
        anchors: &[Anchor],
        tags: &[Tag],
        include_tag_links: bool,
    ) -> NeighborMap {
        let mut neighbors = NeighborMap::new();

        for anchor in anchors {
            self.link_if_in_range(anchor, &mut neighbors);
        }

        if include_tag_links {
            for tag in tags.iter().filter(|tag| tag.id != self.id) {
                self.link_if_in_range(tag, &mut neighbors);
            }
        }

        neighbors
    }

    fn link_if_in_range(&self, other: &dyn ISensor, neighbors: &mut NeighborMap) {
        if self.in_range_of(other) {
            neighbors.insert(
                other.get_id().to_string(),
                Neighbor {
                    distance: self.distance_to(other),
                    kind: other.get_kind(),
                },
            );
        }
    }

    /// 近傍マップを一から作り直す
    pub fn recompute_neighbors(&mut self, anchors: &[Anchor], tags: &[Tag], include_tag_links: bool) {
        let neighbors = self.compute_neighbors(anchors, tags, include_tag_links);
        self.replace_neighbors(neighbors);
    }

    /// 近傍マップを丸ごと置き換える（部分的な更新はしない）
    pub(crate) fn replace_neighbors(&mut self, neighbors: NeighborMap) {
        self.neighbors = neighbors;
    }

    /// 現在の近傍数から不確かさを更新
    pub fn update_uncertainty(&mut self) {
        self.uncertainty *= uncertainty_factor(self.neighbors.len());
    }
}

impl ISensor for Tag {
    fn get_id(&self) -> &str {
        &self.id
    }

    fn get_kind(&self) -> SensorKind {
        SensorKind::Mobile
    }

    fn get_position(&self) -> Vector3 {
        self.location
    }

    fn get_sensing_range(&self) -> f64 {
        self.sensing_range
    }
}

impl IMovable for Tag {
    /// 境界反射つきの移動
    ///
    /// 反射判定は移動前の位置で行うため、境界を最大 `|velocity| * dt` だけ
    /// 越えることがあります。位置のクランプは行いません。
    fn move_agent(&mut self, dt: f64) {
        self.velocity = self.bounds.reflect(self.location, self.velocity);
        self.location = self.location + self.velocity * dt;
    }

    fn get_velocity(&self) -> Vector3 {
        self.velocity
    }
}

/// センサー（固定 / 移動の直和型）
#[derive(Debug, Clone, PartialEq)]
pub enum Sensor {
    Fixed(Anchor),
    Mobile(Tag),
}

impl Sensor {
    /// 移動処理。固定センサーに対しては `InvalidOperation` を返す。
    pub fn move_sensor(&mut self, dt: f64) -> Result<(), SimError> {
        match self {
            Sensor::Fixed(anchor) => Err(SimError::invalid_operation(format!(
                "固定センサー {} は移動できません",
                anchor.id
            ))),
            Sensor::Mobile(tag) => {
                tag.move_agent(dt);
                Ok(())
            }
        }
    }

    /// 不確かさの更新。固定センサーに対しては `InvalidOperation` を返す。
    pub fn update_uncertainty(&mut self) -> Result<(), SimError> {
        match self {
            Sensor::Fixed(anchor) => Err(SimError::invalid_operation(format!(
                "固定センサー {} は不確かさを持ちません",
                anchor.id
            ))),
            Sensor::Mobile(tag) => {
                tag.update_uncertainty();
                Ok(())
            }
        }
    }

    fn as_sensor(&self) -> &dyn ISensor {
        match self {
            Sensor::Fixed(anchor) => anchor as &dyn ISensor,
            Sensor::Mobile(tag) => tag as &dyn ISensor,
        }
    }
}

impl ISensor for Sensor {
    fn get_id(&self) -> &str {
        self.as_sensor().get_id()
    }

    fn get_kind(&self) -> SensorKind {
        self.as_sensor().get_kind()
    }

    fn get_position(&self) -> Vector3 {
        self.as_sensor().get_position()
    }

    fn get_sensing_range(&self) -> f64 {
        self.as_sensor().get_sensing_range()
    }
}

impl From<Anchor> for Sensor {
    fn from(anchor: Anchor) -> Self {
        Sensor::Fixed(anchor)
    }
}

impl From<Tag> for Sensor {
    fn from(tag: Tag) -> Self {
        Sensor::Mobile(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tag_at(id: &str, x: f64, y: f64, range: f64) -> Tag {
        Tag::new(
            id,
            Vector3::planar(x, y),
            range,
            Vector3::ZERO,
            ReflectionBounds::new(Vector3::planar(0.0, 0.0), Vector3::planar(10.0, 10.0)),
            70.0,
        )
    }

    #[test]
    fn test_move_reflects_before_moving() {
        let mut tag = Tag::new(
            "T0",
            Vector3::planar(0.0, 0.0),
            7.0,
            Vector3::planar(-1.0, -1.0),
            ReflectionBounds::new(Vector3::planar(1.0, 1.0), Vector3::planar(5.0, 5.0)),
            70.0,
        );

        tag.move_agent(1.0);

        assert_eq!(tag.get_velocity(), Vector3::planar(1.0, 1.0));
        assert_eq!(tag.get_position(), Vector3::planar(1.0, 1.0));
    }

    #[test]
    fn test_move_overshoots_bound_without_clamping() {
        // 境界内から外へ出る移動はその場では補正されない
        let mut tag = Tag::new(
            "T0",
            Vector3::planar(4.5, 3.0),
            7.0,
            Vector3::planar(1.0, 0.0),
            ReflectionBounds::new(Vector3::planar(1.0, 1.0), Vector3::planar(5.0, 5.0)),
            70.0,
        );

        tag.move_agent(1.0);
        assert_eq!(tag.get_position(), Vector3::planar(5.5, 3.0));
        assert_eq!(tag.get_velocity(), Vector3::planar(1.0, 0.0));

        tag.move_agent(1.0);
        assert_eq!(tag.get_velocity(), Vector3::planar(-1.0, 0.0));
        assert_eq!(tag.get_position(), Vector3::planar(4.5, 3.0));
    }

    #[test]
    fn test_reflect_axes_independently() {
        let bounds = ReflectionBounds::new(Vector3::planar(1.0, 1.0), Vector3::planar(5.0, 5.0));
        let v = bounds.reflect(Vector3::planar(0.0, 6.0), Vector3::new(-2.0, 3.0, 0.5));
        assert_eq!(v, Vector3::new(2.0, -3.0, 0.5));

        let v = bounds.reflect(Vector3::planar(3.0, 3.0), Vector3::planar(-2.0, 3.0));
        assert_eq!(v, Vector3::planar(-2.0, 3.0));
    }

    #[test]
    fn test_move_fixed_sensor_fails() {
        let mut sensor = Sensor::from(Anchor::new("A0", Vector3::planar(1.0, 1.0), 7.0));
        let result = sensor.move_sensor(1.0);
        assert!(matches!(result, Err(SimError::InvalidOperation(_))));
        assert_eq!(sensor.get_position(), Vector3::planar(1.0, 1.0));
        assert!(matches!(sensor.update_uncertainty(), Err(SimError::InvalidOperation(_))));
    }

    #[test]
    fn test_move_mobile_sensor_through_enum() {
        let mut sensor = Sensor::from(Tag::new(
            "T0",
            Vector3::planar(2.0, 2.0),
            7.0,
            Vector3::planar(0.5, 0.0),
            ReflectionBounds::new(Vector3::planar(1.0, 1.0), Vector3::planar(5.0, 5.0)),
            70.0,
        ));
        sensor.move_sensor(2.0).unwrap();
        assert_eq!(sensor.get_position(), Vector3::planar(3.0, 2.0));
        assert_eq!(sensor.get_kind(), SensorKind::Mobile);
    }

    #[test]
    fn test_neighbors_strictly_inside_range() {
        let anchors = vec![
            Anchor::new("A0", Vector3::planar(0.0, 0.0), 5.0),
            Anchor::new("A1", Vector3::planar(8.0, 0.0), 5.0),
            Anchor::new("A2", Vector3::planar(6.0, 4.0), 5.0),
        ];
        let mut tag = tag_at("T0", 3.0, 0.0, 5.0);

        tag.recompute_neighbors(&anchors, &[], false);

        assert_eq!(tag.neighbor_count(), 1);
        assert_relative_eq!(tag.neighbors()["A0"].distance, 3.0);
        assert_eq!(tag.neighbors()["A0"].kind, SensorKind::Fixed);
        // ちょうど探知範囲の距離は近傍に含めない
        assert!(!tag.neighbors().contains_key("A1"));
        assert!(!tag.neighbors().contains_key("A2"));
    }

    #[test]
    fn test_in_range_of_excludes_boundary() {
        let tag = tag_at("T0", 0.0, 0.0, 5.0);
        let inside = Anchor::new("A0", Vector3::planar(3.0, 3.9), 5.0);
        let boundary = Anchor::new("A1", Vector3::planar(3.0, 4.0), 5.0);

        assert!(tag.in_range_of(&inside));
        assert!(!tag.in_range_of(&boundary));
    }

    #[test]
    fn test_tag_links_exclude_self() {
        let tags = vec![tag_at("T0", 0.0, 0.0, 7.0), tag_at("T1", 1.0, 0.0, 7.0)];

        let with_links = tags[0].compute_neighbors(&[], &tags, true);
        assert_eq!(with_links.len(), 1);
        assert_eq!(with_links["T1"].kind, SensorKind::Mobile);
        assert!(!with_links.contains_key("T0"));

        let without_links = tags[0].compute_neighbors(&[], &tags, false);
        assert!(without_links.is_empty());
    }

    #[test]
    fn test_recompute_replaces_previous_neighbors() {
        let near = vec![Anchor::new("A0", Vector3::planar(1.0, 0.0), 7.0)];
        let far = vec![Anchor::new("A9", Vector3::planar(100.0, 0.0), 7.0)];
        let mut tag = tag_at("T0", 0.0, 0.0, 7.0);

        tag.recompute_neighbors(&near, &[], false);
        assert_eq!(tag.neighbor_count(), 1);

        tag.recompute_neighbors(&far, &[], false);
        assert_eq!(tag.neighbor_count(), 0);
    }

    #[test]
    fn test_new_tags_do_not_share_neighbor_maps() {
        let anchors = vec![Anchor::new("A0", Vector3::planar(1.0, 0.0), 7.0)];
        let mut first = tag_at("T0", 0.0, 0.0, 7.0);
        let second = tag_at("T1", 50.0, 0.0, 7.0);

        first.recompute_neighbors(&anchors, &[], false);

        assert_eq!(first.neighbor_count(), 1);
        assert!(second.neighbors().is_empty());
    }

    #[test]
    fn test_uncertainty_factor() {
        assert_relative_eq!(uncertainty_factor(0), 1.02f64.powi(3));
        assert_relative_eq!(uncertainty_factor(2), 1.02);
        assert_eq!(uncertainty_factor(3), 1.0);
        assert_relative_eq!(uncertainty_factor(5), 1.0 / 1.02f64.powi(2));
    }

    #[test]
    fn test_uncertainty_unchanged_with_three_neighbors() {
        let anchors: Vec<Anchor> = (0..3)
            .map(|i| Anchor::new(format!("A{i}"), Vector3::planar(i as f64, 1.0), 7.0))
            .collect();
        let mut tag = tag_at("T0", 0.0, 0.0, 7.0);
        tag.recompute_neighbors(&anchors, &[], false);
        tag.update_uncertainty();
        assert_relative_eq!(tag.uncertainty(), 70.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uncertainty_grows_without_neighbors() {
        let mut tag = tag_at("T0", 0.0, 0.0, 7.0);
        tag.update_uncertainty();
        assert!(tag.uncertainty() > 70.0);
        assert_relative_eq!(tag.uncertainty(), 70.0 * 1.02f64.powi(3), epsilon = 1e-9);
    }

    #[test]
    fn test_uncertainty_shrinks_with_four_or_more_neighbors() {
        let anchors: Vec<Anchor> = (0..4)
            .map(|i| Anchor::new(format!("A{i}"), Vector3::planar(i as f64, 1.0), 7.0))
            .collect();
        let mut tag = tag_at("T0", 0.0, 0.0, 7.0);
        tag.recompute_neighbors(&anchors, &[], false);
        tag.update_uncertainty();
        assert!(tag.uncertainty() < 70.0);
        assert_relative_eq!(tag.uncertainty(), 70.0 / 1.02, epsilon = 1e-9);
    }
}
