//! # Snapshot モジュール
//!
//! 各ステップ後のネットワーク状態を、描画・出力側へ渡すための
//! 読み取り専用コピーとして表現します。スナップショットはセンサーへの
//! 参照を一切持たないため、受け取った側が状態を変更することはできません。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Anchor, IMovable, ISensor, Neighbor, SensorKind, Tag, Vector3};

/// アンカーの状態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorSnapshot {
    pub id: String,
    pub kind: SensorKind,
    pub position: Vector3,
}

impl From<&Anchor> for AnchorSnapshot {
    fn from(anchor: &Anchor) -> Self {
        Self {
            id: anchor.get_id().to_string(),
            kind: anchor.get_kind(),
            position: anchor.get_position(),
        }
    }
}

/// タグの状態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSnapshot {
    pub id: String,
    pub kind: SensorKind,
    pub position: Vector3,
    pub velocity: Vector3,
    pub uncertainty: f64,
    /// 近傍ID → 距離・種別（ID順）
    pub neighbors: BTreeMap<String, Neighbor>,
}

impl From<&Tag> for TagSnapshot {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.get_id().to_string(),
            kind: tag.get_kind(),
            position: tag.get_position(),
            velocity: tag.get_velocity(),
            uncertainty: tag.uncertainty(),
            neighbors: tag
                .neighbors()
                .iter()
                .map(|(id, neighbor)| (id.clone(), *neighbor))
                .collect(),
        }
    }
}

/// 近傍関係を描画用に解決した辺
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    /// 近傍マップを持つタグのID
    pub from: String,
    /// 近傍センサーのID
    pub to: String,
    /// 近傍センサーの種別（アンカーとの辺かタグ同士の辺か）
    pub kind: SensorKind,
    pub from_position: Vector3,
    pub to_position: Vector3,
    pub distance: f64,
}

/// ネットワーク全体のスナップショット
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    /// これまでに実行したステップ数
    pub step: u64,
    /// 経過時間（秒）
    pub time: f64,
    pub anchors: Vec<AnchorSnapshot>,
    pub tags: Vec<TagSnapshot>,
}

impl NetworkSnapshot {
    pub fn tag(&self, id: &str) -> Option<&TagSnapshot> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    /// IDから位置を引く。アンカー・タグの両方を探索する。
    pub fn position_of(&self, id: &str) -> Option<Vector3> {
        self.anchors
            .iter()
            .find(|anchor| anchor.id == id)
            .map(|anchor| anchor.position)
            .or_else(|| self.tag(id).map(|tag| tag.position))
    }

    /// 全タグの近傍関係を辺のリストに展開
    ///
    /// 相手の種別は近傍エントリに記録されたものを使い、位置は
    /// 所属するコレクションから ID で解決します。
    pub fn edges(&self) -> Vec<Edge> {
        self.tags
            .iter()
            .flat_map(|tag| {
                tag.neighbors.iter().filter_map(move |(id, neighbor)| {
                    let to_position = match neighbor.kind {
                        SensorKind::Fixed => self
                            .anchors
                            .iter()
                            .find(|anchor| &anchor.id == id)
                            .map(|anchor| anchor.position),
                        SensorKind::Mobile => self.tag(id).map(|other| other.position),
                    }?;
                    Some(Edge {
                        from: tag.id.clone(),
                        to: id.clone(),
                        kind: neighbor.kind,
                        from_position: tag.position,
                        to_position,
                        distance: neighbor.distance,
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReflectionBounds;

    fn sample() -> NetworkSnapshot {
        let anchors = vec![Anchor::new("A0", Vector3::planar(0.0, 0.0), 7.0)];
        let mut tags = vec![
            Tag::new(
                "T0",
                Vector3::planar(1.0, 0.0),
                7.0,
                Vector3::ZERO,
                ReflectionBounds::new(Vector3::ZERO, Vector3::planar(10.0, 10.0)),
                70.0,
            ),
            Tag::new(
                "T1",
                Vector3::planar(1.0, 2.0),
                7.0,
                Vector3::planar(0.1, 0.0),
                ReflectionBounds::new(Vector3::ZERO, Vector3::planar(10.0, 10.0)),
                70.0,
            ),
        ];
        let maps: Vec<_> = tags
            .iter()
            .map(|tag| tag.compute_neighbors(&anchors, &tags, true))
            .collect();
        for (tag, map) in tags.iter_mut().zip(maps) {
            tag.replace_neighbors(map);
        }

        NetworkSnapshot {
            step: 1,
            time: 0.1,
            anchors: anchors.iter().map(AnchorSnapshot::from).collect(),
            tags: tags.iter().map(TagSnapshot::from).collect(),
        }
    }

    #[test]
    fn test_position_lookup() {
        let snapshot = sample();
        assert_eq!(snapshot.position_of("A0"), Some(Vector3::planar(0.0, 0.0)));
        assert_eq!(snapshot.position_of("T1"), Some(Vector3::planar(1.0, 2.0)));
        assert_eq!(snapshot.position_of("X9"), None);
    }

    #[test]
    fn test_edges_carry_neighbor_kind() {
        let edges = sample().edges();
        // T0: A0, T1 / T1: A0, T0
        assert_eq!(edges.len(), 4);

        let anchor_edge = edges
            .iter()
            .find(|edge| edge.from == "T1" && edge.to == "A0")
            .unwrap();
        assert_eq!(anchor_edge.kind, SensorKind::Fixed);
        assert_eq!(anchor_edge.to_position, Vector3::planar(0.0, 0.0));

        let tag_edge = edges
            .iter()
            .find(|edge| edge.from == "T0" && edge.to == "T1")
            .unwrap();
        assert_eq!(tag_edge.kind, SensorKind::Mobile);
        assert_eq!(tag_edge.to_position, Vector3::planar(1.0, 2.0));
        assert_eq!(tag_edge.distance, 2.0);
    }

    #[test]
    fn test_serializes_kinds_in_upper_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"kind\":\"FIXED\""));
        assert!(json.contains("\"kind\":\"MOBILE\""));
        assert!(json.contains("\"uncertainty\":70.0"));
    }
}
