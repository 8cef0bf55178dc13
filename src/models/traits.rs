use crate::models::common::*;

/// 全てのセンサーが実装する基本インターフェース
pub trait ISensor {
    /// センサーIDの取得
    fn get_id(&self) -> &str;

    /// センサー種別の取得
    fn get_kind(&self) -> SensorKind;

    /// 現在位置（真値）の取得
    fn get_position(&self) -> Vector3;

    /// 探知範囲の取得
    fn get_sensing_range(&self) -> f64;

    /// 他センサーとの距離
    fn distance_to(&self, other: &dyn ISensor) -> f64 {
        self.get_position().distance_to(&other.get_position())
    }

    /// 他センサーが探知範囲内（厳密に未満）にあるか
    fn in_range_of(&self, other: &dyn ISensor) -> bool {
        self.distance_to(other) < self.get_sensing_range()
    }
}

/// 移動可能なセンサーのインターフェース
pub trait IMovable {
    /// 移動処理
    fn move_agent(&mut self, dt: f64);

    /// 現在速度の取得
    fn get_velocity(&self) -> Vector3;
}
