//! 反思解析：动作执行后模型给出的 Decision / Thought / Documentation

use crate::core::ParseError;
use crate::parser::fields::{Fields, LabeledReply};
use crate::parser::grammar::ReplyGrammar;

/// 反思结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionDecision {
    /// 动作无效（界面无变化）
    Ineffective { thought: String },
    /// 动作有效但偏离任务，需要返回上一页
    Back { thought: String, documentation: String },
    Continue { thought: String, documentation: String },
    Success { thought: String, documentation: String },
    Error(ParseError),
}

impl ReflectionDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            ReflectionDecision::Ineffective { .. } => "INEFFECTIVE",
            ReflectionDecision::Back { .. } => "BACK",
            ReflectionDecision::Continue { .. } => "CONTINUE",
            ReflectionDecision::Success { .. } => "SUCCESS",
            ReflectionDecision::Error(_) => "ERROR",
        }
    }

    pub fn documentation(&self) -> Option<&str> {
        match self {
            ReflectionDecision::Back { documentation, .. }
            | ReflectionDecision::Continue { documentation, .. }
            | ReflectionDecision::Success { documentation, .. } => Some(documentation),
            ReflectionDecision::Ineffective { .. } | ReflectionDecision::Error(_) => None,
        }
    }
}

/// Decision → Thought →（按需）Documentation
pub struct ReflectGrammar;

impl ReplyGrammar for ReflectGrammar {
    type Output = ReflectionDecision;

    const LABELS: &'static [&'static str] = &["Decision", "Thought", "Documentation"];
    const REQUIRED: &'static [&'static str] = &["Decision", "Thought"];

    fn interpret(
        reply: &LabeledReply<'_>,
        fields: &Fields,
    ) -> Result<ReflectionDecision, ParseError> {
        let thought = fields.get("Thought").to_string();
        match fields.get("Decision") {
            "INEFFECTIVE" => Ok(ReflectionDecision::Ineffective { thought }),
            decision @ ("BACK" | "CONTINUE" | "SUCCESS") => {
                let documentation = reply.field("Documentation")?;
                Ok(match decision {
                    "BACK" => ReflectionDecision::Back {
                        thought,
                        documentation,
                    },
                    "CONTINUE" => ReflectionDecision::Continue {
                        thought,
                        documentation,
                    },
                    _ => ReflectionDecision::Success {
                        thought,
                        documentation,
                    },
                })
            }
            other => Err(ParseError::UnrecognizedDecision {
                decision: other.to_string(),
                raw: reply.raw().to_string(),
            }),
        }
    }
}
