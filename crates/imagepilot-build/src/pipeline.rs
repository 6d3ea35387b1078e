//! ビルドからプッシュまでの一連の処理
//!
//! 認証情報の解決 → Dockerfile の確認 → コンテキスト作成 → build → push を
//! 順番に実行します。どのフェーズの失敗も全体の失敗になり、リトライはしません。

use crate::auth::{RegistryAuth, RegistryCredentials, encode_auth};
use crate::context::ContextBuilder;
use crate::dockerfile::DOCKERFILE_NAME;
use crate::engine::{BuildRequest, ImageEngine, PushRequest};
use crate::error::{BuildError, BuildResult};
use crate::events::{EngineError, EventStream};
use crate::progress::BuildProgress;
use crate::reference::{ImageRef, Registry};
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;

/// パイプラインの入力
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image_name: String,
    pub tag: String,
    pub registry: Registry,
    /// 呼び出し側が指定した認証情報（ローカルの config.json が優先される）
    pub credentials: RegistryCredentials,
    pub context_dir: PathBuf,
}

impl PipelineConfig {
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::new(self.registry.clone(), &self.image_name, &self.tag)
    }
}

/// 処理フェーズ（ログ用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ResolveCredentials,
    ValidateDockerfile,
    Archive,
    Build,
    StreamBuildOutput,
    Push,
    StreamPushOutput,
    Done,
}

/// イベントストリームの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Build,
    Push,
}

pub struct ImagePipeline<E> {
    engine: E,
    auth: RegistryAuth,
    progress: BuildProgress,
}

impl<E: ImageEngine> ImagePipeline<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            auth: RegistryAuth::new(),
            progress: BuildProgress::new("Building and pushing Docker image..."),
        }
    }

    /// 認証情報マネージャーを指定
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_progress(mut self, progress: BuildProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn progress(&self) -> &BuildProgress {
        &self.progress
    }

    /// イメージをビルドしてレジストリにプッシュ
    ///
    /// # Returns
    /// プッシュしたイメージ参照
    pub async fn run(&self, config: &PipelineConfig) -> BuildResult<ImageRef> {
        let result = self.run_phases(config).await;
        match &result {
            Ok(image) => self.progress.finish(&format!("Pushed {}", image)),
            Err(e) => self.progress.finish_error(&e.to_string()),
        }
        result
    }

    async fn run_phases(&self, config: &PipelineConfig) -> BuildResult<ImageRef> {
        tracing::debug!(phase = ?Phase::ResolveCredentials);
        let credentials = self.resolve_credentials(config)?;

        tracing::debug!(phase = ?Phase::ValidateDockerfile);
        let dockerfile_path = config.context_dir.join(DOCKERFILE_NAME);
        if !dockerfile_path.is_file() {
            return Err(BuildError::DockerfileMissing(dockerfile_path));
        }

        tracing::debug!(phase = ?Phase::Archive);
        let context = ContextBuilder::create_context(&config.context_dir)?;

        let image = config.image_ref();
        self.build(&image, context).await?;
        self.progress.build_complete();
        println!();
        println!("{} Docker image built successfully.", "✓".green());

        self.push(&image, &credentials).await?;
        self.progress.push_complete();
        println!();
        println!("{} Docker image pushed successfully.", "✓".green());

        tracing::debug!(phase = ?Phase::Done);
        Ok(image)
    }

    /// ローカルの認証情報を優先し、なければ呼び出し側の値を使う
    fn resolve_credentials(&self, config: &PipelineConfig) -> BuildResult<RegistryCredentials> {
        let credentials = match self.auth.get_credentials(&config.registry) {
            Ok(local) => {
                println!(
                    "{} Using local Docker credentials for {} (username: {})",
                    "✓".green(),
                    config.registry,
                    local.username
                );
                local
            }
            Err(e) => {
                tracing::debug!("Local Docker credentials not usable: {}", e);
                config.credentials.clone()
            }
        };

        if !credentials.is_complete() {
            return Err(BuildError::CredentialsMissing {
                registry: config.registry.to_string(),
            });
        }

        Ok(credentials)
    }

    async fn build(&self, image: &ImageRef, context: Vec<u8>) -> BuildResult<()> {
        tracing::debug!(phase = ?Phase::Build);
        tracing::info!("Building image: {}", image);
        println!("{}", "Building Docker image...".cyan());
        println!("Build logs:");

        let request = BuildRequest {
            context,
            tags: vec![image.to_string()],
            dockerfile: DOCKERFILE_NAME.to_string(),
        };
        let events = self
            .engine
            .build(request)
            .await
            .map_err(BuildError::BuildFailed)?;

        tracing::debug!(phase = ?Phase::StreamBuildOutput);
        let reported = drain_events(events, StreamKind::Build)
            .await
            .map_err(BuildError::BuildStream)?;
        if reported > 0 {
            tracing::warn!("Build reported {} error(s) for {}", reported, image);
        }

        tracing::info!("Successfully built: {}", image);
        Ok(())
    }

    async fn push(&self, image: &ImageRef, credentials: &RegistryCredentials) -> BuildResult<()> {
        let encoded_auth = encode_auth(credentials)?;

        tracing::debug!(phase = ?Phase::Push);
        println!("{}", "Pushing Docker image...".cyan());
        println!("  → {}", image.to_string().cyan());

        let request = PushRequest {
            image: image.clone(),
            encoded_auth,
        };
        let events = self
            .engine
            .push(request)
            .await
            .map_err(BuildError::PushFailed)?;

        tracing::debug!(phase = ?Phase::StreamPushOutput);
        let reported = drain_events(events, StreamKind::Push)
            .await
            .map_err(BuildError::PushStream)?;
        if reported > 0 {
            tracing::warn!("Push reported {} error(s) for {}", reported, image);
        }

        Ok(())
    }
}

/// ストリームを最後まで読み、出力を表示する
///
/// ストリーム内の `error` は表示するだけで中断しない。
/// 中断するのは読み取り自体の失敗（不正な JSON・通信エラー）のみ。
/// 戻り値は表示した `error` の件数。
async fn drain_events(
    mut events: EventStream<'_>,
    kind: StreamKind,
) -> Result<usize, EngineError> {
    let mut reported = 0;

    while let Some(event) = events.next().await {
        let event = event?;

        if let Some(message) = event.error_message() {
            reported += 1;
            let label = match kind {
                StreamKind::Build => "Build error:",
                StreamKind::Push => "Push error:",
            };
            println!("{} {} {}", "✗".red(), label.red(), message);
            continue;
        }

        match kind {
            StreamKind::Build => {
                if let Some(text) = &event.stream {
                    // ビルドステップの出力
                    print!("{}", text);
                    std::io::stdout().flush().ok();
                }
            }
            StreamKind::Push => {
                if let Some(status) = &event.status {
                    match &event.progress {
                        Some(progress) => println!("  {} {}", status, progress),
                        None => println!("  {}", status),
                    }
                }
            }
        }
    }

    Ok(reported)
}
