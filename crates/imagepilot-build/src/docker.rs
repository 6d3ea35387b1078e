//! bollard による [`ImageEngine`] 実装

use crate::auth::decode_auth_header;
use crate::engine::{BuildRequest, ImageEngine, PushRequest};
use crate::events::{EngineError, EngineEvent, ErrorDetail, EventStream};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::{BuildInfo, PushImageInfo};
use bollard::query_parameters::{BuildImageOptionsBuilder, PushImageOptionsBuilder};
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use http_body_util::{Either, Full};

impl From<BuildInfo> for EngineEvent {
    fn from(info: BuildInfo) -> Self {
        Self {
            stream: info.stream,
            status: info.status,
            error: info.error,
            error_detail: info.error_detail.map(|detail| ErrorDetail {
                code: None,
                message: detail.message,
            }),
            progress: info.progress,
            id: info.id,
        }
    }
}

impl From<PushImageInfo> for EngineEvent {
    fn from(info: PushImageInfo) -> Self {
        Self {
            status: info.status,
            error: info.error,
            progress: info.progress,
            ..Default::default()
        }
    }
}

/// Docker デーモンに接続するエンジン
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// DOCKER_HOST のスキーム（unix / tcp / http など）に従って接続
    ///
    /// 未設定ならローカルのソケットを使う。接続自体は最初のリクエストまで遅延される。
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_defaults()?;
        Ok(Self::new(docker))
    }
}

/// 最初の要素がエラーなら呼び出し自体の失敗として返す
///
/// bollard は接続エラーや 4xx/5xx をストリームの最初の要素として返すため。
async fn first_error_as_call_failure<'a, S>(stream: S) -> Result<EventStream<'a>, EngineError>
where
    S: Stream<Item = Result<EngineEvent, EngineError>> + Send + 'a,
{
    let mut stream = stream.boxed();
    match stream.next().await {
        Some(Err(e)) => Err(e),
        first => Ok(stream::iter(first).chain(stream).boxed()),
    }
}

impl ImageEngine for DockerEngine {
    async fn build(&self, request: BuildRequest) -> Result<EventStream<'_>, EngineError> {
        let tag = request.tags.first().map(String::as_str).unwrap_or_default();
        if request.tags.len() > 1 {
            tracing::warn!("Only the first tag is applied at build time: {}", tag);
        }

        let options = BuildImageOptionsBuilder::default()
            .dockerfile(&request.dockerfile)
            .t(tag)
            .rm(true) // 中間コンテナを削除
            .build();

        tracing::debug!("Build options: {:?}", options);

        let body = Full::new(Bytes::from(request.context));
        let stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)))
            .map(|item| item.map(EngineEvent::from).map_err(EngineError::from));

        first_error_as_call_failure(stream).await
    }

    async fn push(&self, request: PushRequest) -> Result<EventStream<'_>, EngineError> {
        let auth = decode_auth_header(&request.encoded_auth)
            .map_err(|e| EngineError::Auth(e.to_string()))?;

        let credentials = DockerCredentials {
            username: Some(auth.username),
            password: Some(auth.password),
            serveraddress: Some(request.image.registry.to_string()),
            ..Default::default()
        };

        let options = PushImageOptionsBuilder::default()
            .tag(&request.image.tag)
            .build();

        let repository = request.image.repository();
        tracing::debug!("Pushing {} (tag {})", repository, request.image.tag);

        let stream = self
            .docker
            .push_image(&repository, Some(options), Some(credentials))
            .map(|item| item.map(EngineEvent::from).map_err(EngineError::from));

        first_error_as_call_failure(stream).await
    }
}
