//! Dockerfile の生成
//!
//! ベースイメージと追加命令から最小限の Dockerfile を Tera でレンダリングします。

use crate::error::{BuildError, BuildResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tera::{Context, Tera};

/// ビルドコンテキスト内の Dockerfile 名
pub const DOCKERFILE_NAME: &str = "Dockerfile";

const DOCKERFILE_TEMPLATE: &str = "FROM {{ base_image }}\n\
{% for line in instructions %}{{ line }}\n{% endfor %}";

/// Dockerfile の1命令（`RUN apk add git` など）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub keyword: String,
    pub value: String,
}

impl Instruction {
    pub fn new(keyword: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            value: value.into(),
        }
    }
}

/// `KEY=value` 形式をパースする（最初の `=` で分割）
///
/// 内容はそのまま書き出すので、KEY に空白を含むものは受け付けない。
impl FromStr for Instruction {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((keyword, value))
                if !keyword.is_empty() && !keyword.contains(char::is_whitespace) =>
            {
                Ok(Self::new(keyword, value))
            }
            _ => Err(BuildError::InvalidInstruction(s.to_string())),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword, self.value)
    }
}

/// 生成する Dockerfile の内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileSpec {
    base_image: String,
    instructions: Vec<Instruction>,
}

impl DockerfileSpec {
    pub fn new(base_image: impl Into<String>, instructions: Vec<Instruction>) -> BuildResult<Self> {
        let base_image = base_image.into();
        if base_image.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "base image must not be empty".to_string(),
            ));
        }
        Ok(Self {
            base_image,
            instructions,
        })
    }

    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Dockerfile の本文をレンダリング
    pub fn render(&self) -> BuildResult<String> {
        let lines: Vec<String> = self.instructions.iter().map(|i| i.to_string()).collect();

        let mut context = Context::new();
        context.insert("base_image", &self.base_image);
        context.insert("instructions", &lines);

        // Dockerfile なので HTML エスケープはしない
        Ok(Tera::one_off(DOCKERFILE_TEMPLATE, &context, false)?)
    }

    /// `dir/Dockerfile` に書き出す（既存ファイルは上書き）
    pub fn write_to(&self, dir: &Path) -> BuildResult<PathBuf> {
        let content = self.render()?;
        let path = dir.join(DOCKERFILE_NAME);

        std::fs::write(&path, content).map_err(|source| BuildError::TemplateIo {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Dockerfile written: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_render_exact_bytes() {
        let spec = DockerfileSpec::new(
            "X",
            vec![Instruction::new("RUN", "a"), Instruction::new("CMD", "b")],
        )
        .unwrap();

        assert_eq!(spec.render().unwrap(), "FROM X\nRUN a\nCMD b\n");
    }

    #[test]
    fn test_render_no_instructions() {
        let spec = DockerfileSpec::new("scratch", vec![]).unwrap();
        assert_eq!(spec.render().unwrap(), "FROM scratch\n");
    }

    #[test]
    fn test_render_does_not_escape() {
        let spec = DockerfileSpec::new(
            "golang:1.18-alpine",
            vec![
                Instruction::new("RUN", "apk add --no-cache git && echo '<ok>'"),
                Instruction::new("CMD", r#"["go", "run"]"#),
            ],
        )
        .unwrap();

        assert_eq!(
            spec.render().unwrap(),
            "FROM golang:1.18-alpine\nRUN apk add --no-cache git && echo '<ok>'\nCMD [\"go\", \"run\"]\n"
        );
    }

    #[test]
    fn test_write_to_overwrites() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(DOCKERFILE_NAME), "FROM old\nRUN stale\n").unwrap();

        let spec = DockerfileSpec::new("alpine:3.20", vec![Instruction::new("WORKDIR", "/app")])
            .unwrap();
        let path = spec.write_to(temp_dir.path()).unwrap();

        assert_eq!(path, temp_dir.path().join("Dockerfile"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "FROM alpine:3.20\nWORKDIR /app\n"
        );
    }

    #[test]
    fn test_write_to_missing_dir() {
        let temp_dir = tempdir().unwrap();
        let spec = DockerfileSpec::new("alpine", vec![]).unwrap();

        let result = spec.write_to(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(BuildError::TemplateIo { .. })));
    }

    #[test]
    fn test_empty_base_image() {
        assert!(matches!(
            DockerfileSpec::new("  ", vec![]),
            Err(BuildError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_instruction() {
        let instr: Instruction = "RUN=apk add git".parse().unwrap();
        assert_eq!(instr, Instruction::new("RUN", "apk add git"));
        assert_eq!(instr.to_string(), "RUN apk add git");
    }

    #[test]
    fn test_parse_instruction_splits_on_first_equals() {
        let instr: Instruction = "ENV=GOFLAGS=-mod=vendor".parse().unwrap();
        assert_eq!(instr.to_string(), "ENV GOFLAGS=-mod=vendor");
    }

    #[test]
    fn test_parse_instruction_invalid() {
        assert!(matches!(
            "RUN apk add git".parse::<Instruction>(),
            Err(BuildError::InvalidInstruction(_))
        ));
        assert!(matches!(
            "=value".parse::<Instruction>(),
            Err(BuildError::InvalidInstruction(_))
        ));
    }

    #[test]
    fn test_parse_instruction_rejects_padded_keyword() {
        for raw in ["RUN =x", " RUN=x", "\tCMD=x"] {
            assert!(
                matches!(
                    raw.parse::<Instruction>(),
                    Err(BuildError::InvalidInstruction(_))
                ),
                "{:?} should be rejected",
                raw
            );
        }

        // 値側の空白はそのまま残す
        let instr: Instruction = "RUN= echo hi ".parse().unwrap();
        assert_eq!(instr.to_string(), "RUN  echo hi ");
    }
}
