//! レジストリ認証処理
//!
//! Docker config.json から認証情報を取得し、push 用の X-Registry-Auth 値に変換します。

use crate::error::{BuildError, BuildResult};
use crate::reference::Registry;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    /// 認証情報 (レジストリ -> AuthEntry)
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

/// 認証エントリ
#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// レジストリのユーザー名とパスワード
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl RegistryCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// ユーザー名とパスワードの両方が揃っているか
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// 認証情報を push 用ヘッダ値にエンコード
///
/// `base64url(json({"username": .., "password": ..}))`
pub fn encode_auth(credentials: &RegistryCredentials) -> BuildResult<String> {
    let json =
        serde_json::to_vec(credentials).map_err(|e| BuildError::Encode(e.to_string()))?;
    Ok(URL_SAFE.encode(json))
}

/// [`encode_auth`] の逆変換
pub fn decode_auth_header(encoded: &str) -> BuildResult<RegistryCredentials> {
    let json = URL_SAFE
        .decode(encoded)
        .map_err(|e| BuildError::Encode(format!("invalid base64 in auth header: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| BuildError::Encode(format!("invalid JSON in auth header: {}", e)))
}

/// レジストリ認証を管理
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// 新しい RegistryAuth を作成
    ///
    /// `DOCKER_CONFIG` が設定されていればその下の config.json、
    /// なければ ~/.docker/config.json を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    /// 指定したパスの config.json を使用
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// レジストリの認証情報を取得
    ///
    /// # Returns
    /// * `Ok(credentials)` - 認証情報が見つかった場合
    /// * `Err(ConfigNotFound | ConfigParse)` - config.json が無い・読めない場合
    /// * `Err(CredentialsNotFound)` - レジストリのエントリが無い場合
    /// * `Err(CredentialFormat)` - エントリはあるがデコードできない場合
    pub fn get_credentials(&self, registry: &Registry) -> BuildResult<RegistryCredentials> {
        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Err(BuildError::ConfigNotFound(self.config_path.clone()));
        }

        let config = self.load_docker_config()?;

        // 1. auths セクションを確認
        if let Some(auth_entry) = config.auths.get(registry.as_str())
            && let Some(auth_b64) = &auth_entry.auth
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return self.decode_auth(auth_b64, registry);
        }

        // 2. credential helper を確認
        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            match self.get_from_helper(helper, registry) {
                Ok(Some(creds)) => return Ok(creds),
                Ok(None) => {}
                Err(e) => tracing::debug!("Credential helper {} failed: {}", helper, e),
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Err(BuildError::CredentialsNotFound {
            registry: registry.to_string(),
        })
    }

    /// Docker config.json を読み込み
    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::ConfigParse {
                path: self.config_path.clone(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::ConfigParse {
            path: self.config_path.clone(),
            message: e.to_string(),
        })
    }

    /// Base64エンコードされた認証情報をデコード
    fn decode_auth(&self, auth_b64: &str, registry: &Registry) -> BuildResult<RegistryCredentials> {
        let decoded = STANDARD
            .decode(auth_b64)
            .map_err(|e| BuildError::CredentialFormat {
                registry: registry.to_string(),
                message: format!("Failed to decode auth: {}", e),
            })?;

        let auth_str = String::from_utf8(decoded).map_err(|e| BuildError::CredentialFormat {
            registry: registry.to_string(),
            message: format!("Invalid UTF-8 in auth: {}", e),
        })?;

        // "username:password"。パスワード側の ':' は保持する
        let (username, password) =
            auth_str
                .split_once(':')
                .ok_or_else(|| BuildError::CredentialFormat {
                    registry: registry.to_string(),
                    message: "expected username:password".to_string(),
                })?;

        Ok(RegistryCredentials::new(username, password))
    }

    /// credential helper から認証情報を取得
    fn get_from_helper(
        &self,
        helper: &str,
        registry: &Registry,
    ) -> BuildResult<Option<RegistryCredentials>> {
        let helper_cmd = format!("docker-credential-{}", helper);

        let mut child = Command::new(&helper_cmd)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::CredentialsNotFound {
                registry: format!("{} ({} unavailable: {})", registry, helper_cmd, e),
            })?;

        // レジストリ名を stdin に渡す
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_str().as_bytes()).ok();
        }

        let output = child
            .wait_with_output()
            .map_err(|e| BuildError::CredentialsNotFound {
                registry: format!("{} ({} failed: {})", registry, helper_cmd, e),
            })?;

        if !output.status.success() {
            tracing::debug!(
                "Credential helper returned error for {}: {}",
                registry,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(None);
        }

        let response: CredentialResponse =
            serde_json::from_slice(&output.stdout).map_err(|e| BuildError::CredentialFormat {
                registry: registry.to_string(),
                message: format!("Failed to parse credential helper response: {}", e),
            })?;

        Ok(Some(RegistryCredentials::new(
            response.username,
            response.secret,
        )))
    }
}
