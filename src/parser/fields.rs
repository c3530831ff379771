//! 字段抽取：按「标签 + 冒号」从模型回复中切出文本块
//!
//! 标签只在行首匹配（允许前导空白），大小写与标点必须完全一致，标签与冒号之间允许空白。
//! 字段内容从标签冒号之后开始，到后续标签列表中最早出现的那个（同样位于行首）之前结束，
//! 后续标签都不存在时截到文本末尾；内容可跨多行，返回前去掉首尾空白。

use regex::Regex;

use crate::core::ParseError;

/// 构造「行首任一标签 + 冒号」的匹配模式；标签已转义，构造失败视为无法匹配
fn label_pattern(labels: &[&str]) -> Option<Regex> {
    let alternation = labels
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?m)^[ \t]*(?:{})[ \t]*:", alternation)).ok()
}

/// 抽取 `label` 字段；`next_labels` 为可能紧随其后的标签（顺序无关，取最早出现者）
pub fn extract_field(text: &str, label: &str, next_labels: &[&str]) -> Result<String, ParseError> {
    let found = label_pattern(&[label])
        .and_then(|head| head.find(text))
        .ok_or_else(|| ParseError::MissingField {
            label: label.to_string(),
            raw: text.to_string(),
        })?;

    let start = found.end();
    let end = if next_labels.is_empty() {
        text.len()
    } else {
        // find_at 会考虑 start 之前的上下文，`^` 不会误匹配在标签冒号之后
        label_pattern(next_labels)
            .and_then(|next| next.find_at(text, start))
            .map(|m| m.start())
            .unwrap_or(text.len())
    };

    Ok(text[start..end].trim().to_string())
}

/// 按固定标签序列读取的一条回复：某个标签的后继就是序列中排在它之后的全部标签
pub struct LabeledReply<'a> {
    text: &'a str,
    labels: &'static [&'static str],
}

impl<'a> LabeledReply<'a> {
    pub fn new(text: &'a str, labels: &'static [&'static str]) -> Self {
        Self { text, labels }
    }

    pub fn raw(&self) -> &'a str {
        self.text
    }

    /// 抽取单个字段并输出日志
    pub fn field(&self, label: &str) -> Result<String, ParseError> {
        let successors = self
            .labels
            .iter()
            .position(|l| *l == label)
            .map(|idx| &self.labels[idx + 1..])
            .unwrap_or(&[]);
        let content = extract_field(self.text, label, successors)?;
        tracing::info!(field = label, content = %content, "reply field");
        Ok(content)
    }

    /// 按给定顺序抽取全部必需字段；任一缺失即失败
    pub fn require(&self, labels: &[&'static str]) -> Result<Fields, ParseError> {
        let mut fields = Vec::with_capacity(labels.len());
        for label in labels {
            fields.push((*label, self.field(label)?));
        }
        Ok(Fields(fields))
    }
}

/// 已抽取的字段（保持抽取顺序）
#[derive(Debug, Clone, Default)]
pub struct Fields(Vec<(&'static str, String)>);

impl Fields {
    /// 取字段内容；未抽取的标签返回空串
    pub fn get(&self, label: &str) -> &str {
        self.0
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, content)| content.as_str())
            .unwrap_or("")
    }
}
