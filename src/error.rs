//! シミュレーションコアのエラー型

use thiserror::Error;

/// シミュレーションコアで発生するエラー
///
/// どちらも呼び出し元に即座に返される同期的な失敗で、リトライは行いません。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// 対象センサーでは実行できない操作（固定センサーの移動など）
    #[error("無効な操作: {0}")]
    InvalidOperation(String),

    /// 初期化時に検出された設定不備
    #[error("無効な設定: {0}")]
    InvalidConfiguration(String),
}

impl SimError {
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
