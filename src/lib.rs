//! 2次元測位センサーネットワークのシミュレーションエンジン
//!
//! 固定アンカーと移動タグを所有する [`models::SensorNetwork`] を固定時間刻みで進め、
//! 各ステップ後の状態を [`snapshot::NetworkSnapshot`] として描画・出力側へ渡します。

pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
pub mod snapshot;

pub use error::SimError;
