//! レジストリとイメージ参照

use std::fmt;

/// スキームを取り除いたレジストリアドレス
///
/// 認証情報の検索とイメージ参照の組み立ての両方で同じ値を使う。
/// 取り除くのは先頭の `https://` / `http://` のみで、ポートやパスはそのまま残す。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registry(String);

impl Registry {
    pub fn parse(raw: &str) -> Self {
        let host = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
            .unwrap_or(raw);
        Self(host.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<registry>/<name>:<tag>` 形式の完全なイメージ参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: Registry,
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(registry: Registry, name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// タグなしのリポジトリ名（push API に渡す形式）
    pub fn repository(&self) -> String {
        format!("{}/{}", self.registry, self.name)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.name, self.tag)
    }
}
