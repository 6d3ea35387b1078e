use base64::Engine;
use imagepilot_build::{
    BuildProgress, BuildRequest, EngineError, EventStream, ImageEngine, ImagePipeline,
    PipelineConfig, PushRequest, Registry, RegistryAuth, RegistryCredentials, decode_slice,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// build/push の呼び出しを記録し、固定のレスポンスを返すエンジン
pub struct MockEngine {
    build_response: Result<String, String>,
    push_response: Result<String, String>,
    pub builds: Mutex<Vec<BuildRequest>>,
    pub pushes: Mutex<Vec<PushRequest>>,
}

impl MockEngine {
    pub fn new(build_body: &str, push_body: &str) -> Self {
        Self {
            build_response: Ok(build_body.to_string()),
            push_response: Ok(push_body.to_string()),
            builds: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_build(mut self, message: &str) -> Self {
        self.build_response = Err(message.to_string());
        self
    }

    pub fn failing_push(mut self, message: &str) -> Self {
        self.push_response = Err(message.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.builds.lock().unwrap().len() + self.pushes.lock().unwrap().len()
    }
}

impl ImageEngine for MockEngine {
    async fn build(&self, request: BuildRequest) -> Result<EventStream<'_>, EngineError> {
        self.builds.lock().unwrap().push(request);
        match &self.build_response {
            Ok(body) => Ok(decode_slice(body.clone())),
            Err(message) => Err(EngineError::Transport(message.clone())),
        }
    }

    async fn push(&self, request: PushRequest) -> Result<EventStream<'_>, EngineError> {
        self.pushes.lock().unwrap().push(request);
        match &self.push_response {
            Ok(body) => Ok(decode_slice(body.clone())),
            Err(message) => Err(EngineError::Transport(message.clone())),
        }
    }
}

/// 一時ディレクトリ上のビルドコンテキストと Docker 設定
pub struct TestProject {
    pub root: TempDir,
    pub docker_config: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            docker_config: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write_dockerfile(&self, content: &str) {
        fs::write(self.root.path().join("Dockerfile"), content).unwrap();
    }

    pub fn write_docker_config(&self, content: &str) {
        fs::write(self.docker_config.path().join("config.json"), content).unwrap();
    }

    /// `host` の `user:pass` を auths に持つ config.json を書く
    pub fn store_credentials(&self, host: &str, user_pass: &str) {
        let auth = base64::engine::general_purpose::STANDARD.encode(user_pass);
        self.write_docker_config(&format!(
            r#"{{"auths": {{"{}": {{"auth": "{}"}}}}}}"#,
            host, auth
        ));
    }

    pub fn config(&self, registry: &str, username: &str, password: &str) -> PipelineConfig {
        PipelineConfig {
            image_name: "app".to_string(),
            tag: "v1".to_string(),
            registry: Registry::parse(registry),
            credentials: RegistryCredentials::new(username, password),
            context_dir: self.path(),
        }
    }

    pub fn pipeline(&self, engine: MockEngine) -> ImagePipeline<MockEngine> {
        ImagePipeline::new(engine)
            .with_auth(RegistryAuth::with_config_path(
                self.docker_config.path().join("config.json"),
            ))
            .with_progress(BuildProgress::hidden())
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
