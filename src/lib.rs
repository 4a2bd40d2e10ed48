//! AskIt Q&A クライアントの投影レイヤー。
//!
//! リモートのドキュメントストアをライブ購読し、検索語・カテゴリで絞り込んだビューと
//! 活動量から導出したバッジをアプリ側へ提供する。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use shared::config::AppConfig;
pub use shared::error::{AppError, Result};
pub use state::AppState;

/// ログ設定の初期化。`RUST_LOG` が無ければ `askit_core=debug,info` を使う。
///
/// 既にグローバルなサブスクライバーが設定済みの場合は何もしない。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askit_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
