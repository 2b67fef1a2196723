//! App - アプリケーション層
//!
//! ports と domain を組み合わせてディスパッチャを実装します。
//!
//! # 主要コンポーネント
//! - **DispatcherBuilder**: 構築とワイヤリング（fail-fast 検証）
//! - **TaskDispatcher**: 登録表 + 発火の入口
//! - **Firing / FiringReport**: 受け付けた発火のハンドルと結果
//! - **DispatcherConfig**: 設定（JSON / 環境変数）
//! - **DispatcherStatus**: 状態スナップショット

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod firing;
mod registry;
pub mod status;

pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::config::{ConfigError, DispatcherConfig};
pub use self::dispatcher::TaskDispatcher;
pub use self::firing::{Firing, FiringReport};
pub use self::status::{DispatcherStatus, ShutdownReport};
