//! 提交按钮状态 - 业务能力层
//!
//! 只负责根据"是否已提交"计算按钮的禁用状态和文字

use serde::{Deserialize, Serialize};

/// 提交按钮
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitButton {
    pub name: String,
    /// 当前显示的文字
    pub value: String,
    /// 被占位文字替换前的原始文字，缓存在元素上
    #[serde(default)]
    pub stash: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl SubmitButton {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            stash: None,
            disabled: false,
        }
    }
}

/// 同步按钮状态
///
/// - 已提交（`is_clean`）：禁用，原文字只缓存一次，显示占位文字
/// - 有改动：启用，恢复并清空缓存的原文字
///
/// 返回是否有按钮发生变化
pub fn reconcile(buttons: &mut [SubmitButton], is_clean: bool, placeholder: &str) -> bool {
    let mut changed = false;
    for button in buttons.iter_mut() {
        let before = button.clone();
        if is_clean {
            button.disabled = true;
            if button.stash.is_none() {
                button.stash = Some(std::mem::take(&mut button.value));
            }
            button.value = placeholder.to_string();
        } else {
            button.disabled = false;
            if let Some(label) = button.stash.take() {
                button.value = label;
            }
        }
        changed |= *button != before;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_disables_and_stashes_once() {
        let mut buttons = vec![SubmitButton::new("submitAnswers", "Submit Answers")];

        assert!(reconcile(&mut buttons, true, "Submitted"));
        assert!(buttons[0].disabled);
        assert_eq!(buttons[0].value, "Submitted");
        assert_eq!(buttons[0].stash.as_deref(), Some("Submit Answers"));

        // 重复同步不会把占位文字当成原文字缓存
        assert!(!reconcile(&mut buttons, true, "Submitted"));
        assert_eq!(buttons[0].stash.as_deref(), Some("Submit Answers"));
    }

    #[test]
    fn test_dirty_restores_label() {
        let mut buttons = vec![
            SubmitButton::new("submitAnswers", "Submit Answers"),
            SubmitButton::new("submitAnswers", "Check"),
        ];
        reconcile(&mut buttons, true, "Submitted");
        reconcile(&mut buttons, false, "Submitted");

        assert_eq!(buttons[0], SubmitButton::new("submitAnswers", "Submit Answers"));
        assert_eq!(buttons[1], SubmitButton::new("submitAnswers", "Check"));
    }

    #[test]
    fn test_dirty_without_stash_is_noop() {
        let mut buttons = vec![SubmitButton::new("submitAnswers", "Submit")];
        assert!(!reconcile(&mut buttons, false, "Submitted"));
    }
}
