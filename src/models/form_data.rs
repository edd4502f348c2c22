//! 表单数据与提交快照

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 表单数据：按出现顺序保存的 (name, value) 列表
///
/// 与浏览器的 FormData 一致，同名字段可以出现多次
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData {
    entries: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置字段：替换第一个同名字段并删除其余同名字段，不存在则追加
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= first || *n != name;
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// 第一个同名字段的值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 转换为快照：单值字段为 Single，重复字段按顺序合并为 Multi
    pub fn to_snapshot(&self) -> SubmissionSnapshot {
        let mut fields: BTreeMap<String, FieldValue> = BTreeMap::new();
        for (name, value) in &self.entries {
            match fields.get_mut(name) {
                None => {
                    fields.insert(name.clone(), FieldValue::Single(value.clone()));
                }
                Some(existing) => existing.push(value.clone()),
            }
        }
        SubmissionSnapshot { fields }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// 快照中的字段值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    fn push(&mut self, value: String) {
        match self {
            FieldValue::Single(first) => {
                *self = FieldValue::Multi(vec![std::mem::take(first), value]);
            }
            FieldValue::Multi(values) => values.push(value),
        }
    }
}

/// 最近一次已知发送到后端的表单数据
///
/// 按深度相等比较，用来判断重复提交
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionSnapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl SubmissionSnapshot {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
