//! LabelProvider port - 表示文字列の翻訳
//!
//! 翻訳そのものは外部の責務。コアは翻訳キー（状態ラベル、work の種類）を
//! 渡すだけ。

/// Translates a label key into a display string.
pub trait LabelProvider: Send + Sync {
    fn label(&self, key: &str) -> String;
}

/// PlainLabels は翻訳なし（キーをそのまま返す）
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLabels;

impl LabelProvider for PlainLabels {
    fn label(&self, key: &str) -> String {
        key.to_string()
    }
}
