//! 回复文法：「有序标签抽取 + 标签化结果分派」的统一策略
//!
//! 探索、网格、反思三种回复结构相同，只在标签集合与结果解释上不同，
//! 各自实现 [`ReplyGrammar`]，由 [`parse_reply`] 统一驱动。
//! 严格接口返回 `Result<_, ParseError>`；恢复式接口把错误折叠为 `Error` 变体并记录日志，从不 panic。

use crate::core::ParseError;
use crate::parser::action::{ActionCommand, ExploreGrammar, GridGrammar};
use crate::parser::fields::{Fields, LabeledReply};
use crate::parser::reflect::{ReflectGrammar, ReflectionDecision};

/// 一种回复文法
pub trait ReplyGrammar {
    type Output;

    /// 回复中可能出现的全部标签，按出现顺序；决定每个字段的后继边界
    const LABELS: &'static [&'static str];
    /// 解释前必须依次抽取的标签
    const REQUIRED: &'static [&'static str];

    fn interpret(reply: &LabeledReply<'_>, fields: &Fields) -> Result<Self::Output, ParseError>;
}

/// 按文法解析一条回复
pub fn parse_reply<G: ReplyGrammar>(text: &str) -> Result<G::Output, ParseError> {
    let reply = LabeledReply::new(text, G::LABELS);
    let fields = reply.require(G::REQUIRED)?;
    G::interpret(&reply, &fields)
}

pub fn parse_explore_reply(text: &str) -> Result<ActionCommand, ParseError> {
    parse_reply::<ExploreGrammar>(text)
}

pub fn parse_grid_reply(text: &str) -> Result<ActionCommand, ParseError> {
    parse_reply::<GridGrammar>(text)
}

pub fn parse_reflect_reply(text: &str) -> Result<ReflectionDecision, ParseError> {
    parse_reply::<ReflectGrammar>(text)
}

fn report(error: &ParseError) {
    tracing::error!(error = %error, "an exception occurs while parsing the model response");
    tracing::error!(raw = %error.raw(), "model response");
}

/// 探索模式动作；任何解析失败都成为 `ActionCommand::Error`
pub fn explore_action(text: &str) -> ActionCommand {
    parse_explore_reply(text).unwrap_or_else(|e| {
        report(&e);
        ActionCommand::Error(e)
    })
}

pub fn grid_action(text: &str) -> ActionCommand {
    parse_grid_reply(text).unwrap_or_else(|e| {
        report(&e);
        ActionCommand::Error(e)
    })
}

pub fn reflect_decision(text: &str) -> ReflectionDecision {
    parse_reflect_reply(text).unwrap_or_else(|e| {
        report(&e);
        ReflectionDecision::Error(e)
    })
}
