use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tar::Builder;

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// エントリ名はコンテキストからの相対パスを `/` 区切りにしたもの。
    /// ルートディレクトリ自体はエントリに含めない。
    pub fn create_context(context_path: &Path) -> BuildResult<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        // tarアーカイブの作成
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            // コンテキストディレクトリを再帰的に追加
            Self::append_tree(&mut tar, context_path, Path::new("")).map_err(BuildError::ArchiveIo)?;

            let encoder = tar.into_inner().map_err(BuildError::ArchiveIo)?;
            encoder.finish().map_err(BuildError::ArchiveIo)?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());

        // コンテキストサイズの警告
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// ディレクトリを再帰的に追加する
    ///
    /// シンボリックリンクは辿らず、リンクのままエントリにする。
    fn append_tree<W: Write>(
        tar: &mut Builder<W>,
        dir: &Path,
        prefix: &Path,
    ) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            // 名前は OsStr のまま連結する（非UTF-8でも置換しない）
            let name = prefix.join(entry.file_name());

            if entry.file_type()?.is_dir() {
                tar.append_dir(&name, &path)?;
                Self::append_tree(tar, &path, &name)?;
            } else {
                tar.append_path_with_name(&path, &name)?;
            }
        }
        Ok(())
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "Build context is large ({}MB); consider moving unrelated files out of the context directory",
                size / 1024 / 1024
            );
        }
    }
}
