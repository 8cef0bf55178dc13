//! # Simulation モジュール
//!
//! 測位ネットワークシミュレーションの時間進行を管理するエンジンを提供します。
//!
//! 固定時間刻み（Δt）でセンサーネットワークを進め、各ステップ後の
//! スナップショットを呼び出し側のシンクへ渡します。描画やファイル出力は
//! シンク側の責務で、エンジン自体はファイルシステムに依存しません。
//!
//! ## シミュレーション処理順序
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **移動処理**: 全タグを境界反射つきで移動
//! 2. **近傍処理**: 移動後の配置で全タグの近傍マップを再計算
//! 3. **不確かさ処理**: 確定した近傍数から全タグの不確かさを更新
//!
//! 実行ステップ数は `ceil(t_max / Δt)` で、終了時刻の判定は
//! エンジン側の停止方針です（ネットワーク自体は何ステップでも進められます）。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! let scenario = ScenarioConfig::from_file("scenarios/reference_arena.yaml")?;
//! let mut engine = SimulationEngine::new(scenario)?;
//! let summary = engine.run(|snapshot| {
//!     println!("{} {}", snapshot.step, snapshot.tags.len());
//!     Ok::<(), std::io::Error>(())
//! })?;
//! ```

use crate::error::SimError;
use crate::models::{ISensor, SensorNetwork, TimeStep, Vector3};
use crate::scenario::ScenarioConfig;
use crate::snapshot::NetworkSnapshot;
use tracing::{debug, info};

/// 進行状況をログ出力する間隔（ステップ数）
const PROGRESS_INTERVAL: u64 = 100;

pub struct SimulationEngine {
    scenario: ScenarioConfig,
    network: SensorNetwork,
    dt: TimeStep,
    total_steps: u64,
    tag_links: bool,
}

/// 実行終了時のタグ状態
#[derive(Debug, Clone, PartialEq)]
pub struct TagSummary {
    pub id: String,
    pub position: Vector3,
    pub uncertainty: f64,
    pub neighbor_count: usize,
}

/// 実行結果の要約
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub elapsed: f64,
    pub tag_links: bool,
    pub tags: Vec<TagSummary>,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig) -> Result<Self, SimError> {
        scenario.validate()?;
        let dt = TimeStep::new(scenario.sim.dt_s)?;
        let network = SensorNetwork::initialize(&scenario.network)?;

        info!(
            "シミュレーションエンジン初期化: {} (Δt={:.3}秒, {}ステップ)",
            scenario.meta.name,
            scenario.sim.dt_s,
            scenario.total_steps()
        );

        Ok(Self {
            dt,
            total_steps: scenario.total_steps(),
            tag_links: scenario.network.tag_links,
            network,
            scenario,
        })
    }

    /// タグ間リンクの有無をシナリオ設定から上書き
    pub fn with_tag_links(mut self, enabled: bool) -> Self {
        self.tag_links = enabled;
        self
    }

    pub fn tag_links(&self) -> bool {
        self.tag_links
    }

    pub fn dt(&self) -> f64 {
        self.dt.get()
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn step_count(&self) -> u64 {
        self.network.steps_taken()
    }

    pub fn current_time(&self) -> f64 {
        self.network.elapsed()
    }

    pub fn network(&self) -> &SensorNetwork {
        &self.network
    }

    pub fn is_finished(&self) -> bool {
        self.step_count() >= self.total_steps
    }

    /// 1ステップ進めてスナップショットを返す
    pub fn step(&mut self) -> NetworkSnapshot {
        self.network.step(self.dt, self.tag_links);
        self.network.snapshot()
    }

    /// 終了時刻まで実行し、各ステップ後のスナップショットを `sink` へ渡す
    ///
    /// `sink` がエラーを返した時点で実行を中断し、そのエラーを返します。
    pub fn run<F, E>(&mut self, mut sink: F) -> Result<RunSummary, E>
    where
        F: FnMut(&NetworkSnapshot) -> Result<(), E>,
    {
        info!(
            "=== シミュレーション実行開始 (タグ間リンク: {}) ===",
            if self.tag_links { "有効" } else { "無効" }
        );

        while !self.is_finished() {
            let snapshot = self.step();
            sink(&snapshot)?;

            if snapshot.step % PROGRESS_INTERVAL == 0 {
                let progress = snapshot.step as f64 / self.total_steps as f64 * 100.0;
                info!(
                    "進行状況: {:.1}% ({:.1}/{:.1}秒)",
                    progress, snapshot.time, self.scenario.sim.t_max_s
                );
            }
        }

        let summary = self.summary();
        info!("=== シミュレーション完了 ===");
        info!("総ステップ数: {}", summary.steps);
        info!("経過時間: {:.2}秒", summary.elapsed);

        Ok(summary)
    }

    /// シナリオから初期状態を作り直す
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.network = SensorNetwork::initialize(&self.scenario.network)?;
        debug!("ネットワークを初期状態にリセットしました");
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps: self.network.steps_taken(),
            elapsed: self.network.elapsed(),
            tag_links: self.tag_links,
            tags: self
                .network
                .tags()
                .iter()
                .map(|tag| TagSummary {
                    id: tag.get_id().to_string(),
                    position: tag.get_position(),
                    uncertainty: tag.uncertainty(),
                    neighbor_count: tag.neighbor_count(),
                })
                .collect(),
        }
    }
}
