use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// 進捗の最大値
pub const PROGRESS_MAX: u64 = 100;

/// フェーズ単位の進捗表示
///
/// build 完了で半分、push 完了で残りを進める。エンジン出力からの細かい進捗は計算しない。
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new(PROGRESS_MAX);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] {bar:40.green/blue} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(message.to_string());

        Self { progress_bar: pb }
    }

    /// 描画しない進捗（テストや非対話環境用）
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::with_draw_target(
                Some(PROGRESS_MAX),
                ProgressDrawTarget::hidden(),
            ),
        }
    }

    pub fn length(&self) -> u64 {
        self.progress_bar.length().unwrap_or(PROGRESS_MAX)
    }

    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    /// build 完了: 最大値の半分だけ進める
    pub fn build_complete(&self) {
        self.progress_bar.inc(self.length() / 2);
    }

    /// push 完了: 残りをすべて進めて最大値にする
    pub fn push_complete(&self) {
        let remaining = self.length().saturating_sub(self.position());
        self.progress_bar.inc(remaining);
    }

    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("Failed: {}", error));
    }
}
