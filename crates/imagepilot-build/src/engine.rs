//! コンテナエンジンとの境界
//!
//! オーケストレータが使うのは build と push の2操作だけ。

use crate::events::{EngineError, EventStream};
use crate::reference::ImageRef;

/// build 呼び出しの入力
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// ビルドコンテキストの tar(.gz) アーカイブ
    pub context: Vec<u8>,
    pub tags: Vec<String>,
    pub dockerfile: String,
}

/// push 呼び出しの入力
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub image: ImageRef,
    /// `base64url(json({username, password}))`
    pub encoded_auth: String,
}

/// イメージのビルドとプッシュを行うエンジン
///
/// どちらも呼び出し自体の失敗は `Err`、呼び出し後の進捗は [`EventStream`] で返す。
#[allow(async_fn_in_trait)]
pub trait ImageEngine {
    async fn build(&self, request: BuildRequest) -> Result<EventStream<'_>, EngineError>;
    async fn push(&self, request: PushRequest) -> Result<EventStream<'_>, EngineError>;
}
