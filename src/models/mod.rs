// 基本的なデータ型（ベクトル、センサー種別）
pub mod common;

// センサーの基本インターフェース（trait）定義
pub mod traits;

// センサーモデルとネットワーク
pub mod sensor;
pub mod network;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use sensor::{Anchor, Neighbor, NeighborMap, ReflectionBounds, Sensor, Tag, uncertainty_factor};
pub use network::{NetworkState, SensorNetwork};
