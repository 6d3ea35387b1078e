//! エンジンからのイベントストリーム
//!
//! build/push のレスポンスは改行区切りの JSON オブジェクト列。
//! ここではバイトストリームを遅延的にデコードして [`EngineEvent`] の列に変換します。

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// エンジン呼び出しとイベント読み取りのエラー
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed event: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid registry auth: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// エラー詳細（`errorDetail` フィールド）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// 1行分のイベント。未知のフィールドは無視する
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub stream: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "errorDetail")]
    pub error_detail: Option<ErrorDetail>,
    pub progress: Option<String>,
    pub id: Option<String>,
}

impl EngineEvent {
    pub fn log(text: impl Into<String>) -> Self {
        Self {
            stream: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            status: Some(text.into()),
            ..Default::default()
        }
    }

    /// `error` を優先し、なければ `errorDetail.message` を返す
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().or_else(|| {
            self.error_detail
                .as_ref()
                .and_then(|detail| detail.message.as_deref())
        })
    }
}

pub type EventStream<'a> = BoxStream<'a, Result<EngineEvent, EngineError>>;

/// バイトストリームを遅延デコードするイベントストリームを作成
///
/// チャンク境界をまたぐ JSON はバッファして次のチャンクを待つ。
/// 不正な JSON か途中で切れた入力は [`EngineError::Malformed`] を1回返して終了し、
/// 下位ストリームのエラーは [`EngineError::Io`] として返して終了する。
/// 呼び出しごとに独立したデコーダを作るので、同じ入力から何度でも作り直せる。
pub fn decode_events<S>(bytes: S) -> EventStream<'static>
where
    S: futures_util::Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    let decoder = EventDecoder {
        inner: bytes.boxed(),
        buf: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(decoder, |mut decoder| async move {
        let next = decoder.next_event().await?;
        Some((next, decoder))
    })
    .boxed()
}

/// メモリ上のバイト列からイベントストリームを作成
pub fn decode_slice(bytes: impl Into<Bytes>) -> EventStream<'static> {
    let bytes = bytes.into();
    decode_events(stream::once(async move { Ok(bytes) }))
}

struct EventDecoder {
    inner: BoxStream<'static, std::io::Result<Bytes>>,
    buf: Vec<u8>,
    pending: VecDeque<Result<EngineEvent, EngineError>>,
    done: bool,
}

impl EventDecoder {
    async fn next_event(&mut self) -> Option<Result<EngineEvent, EngineError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.buf.extend_from_slice(&chunk);
                    self.drain_complete();
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.buf.clear();
                    return Some(Err(EngineError::Io(e)));
                }
                None => {
                    self.done = true;
                    return self.finish();
                }
            }
        }
    }

    /// バッファ中の完結した JSON 値をすべて取り出す
    fn drain_complete(&mut self) {
        let mut values =
            serde_json::Deserializer::from_slice(&self.buf).into_iter::<EngineEvent>();
        let mut failed = false;

        for value in values.by_ref() {
            match value {
                Ok(event) => self.pending.push_back(Ok(event)),
                // 値が途中で切れている: 次のチャンクを待つ
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    self.pending.push_back(Err(EngineError::Malformed(e)));
                    failed = true;
                    break;
                }
            }
        }

        let consumed = values.byte_offset();
        if failed {
            self.done = true;
            self.buf.clear();
        } else {
            self.buf.drain(..consumed);
        }
    }

    /// ストリーム終端で残ったバッファを処理
    fn finish(&mut self) -> Option<Result<EngineEvent, EngineError>> {
        let rest = std::mem::take(&mut self.buf);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        tracing::debug!("Event stream ended with {} undecoded bytes", rest.len());
        Some(serde_json::from_slice::<EngineEvent>(&rest).map_err(EngineError::Malformed))
    }
}
