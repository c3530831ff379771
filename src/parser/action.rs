//! 动作解析：探索模式（元素编号）与网格模式（区域 + 子区域）
//!
//! 两种模式共享同一条流水线：FINISH 短路 → 拆出动作名与括号内参数 → 交给各自的动作词表。
//! 参数按逗号切分，引号（`"…"`、`'…'`、`“…”`）内的逗号与括号不参与切分；
//! 字符串参数去掉一层成对的外围引号。

use std::marker::PhantomData;

use crate::core::ParseError;
use crate::parser::fields::{Fields, LabeledReply};
use crate::parser::grammar::ReplyGrammar;

/// 网格坐标：区域编号 + 子区域名（如 `center`、`top-left`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPoint {
    pub area: u32,
    pub subarea: String,
}

/// 解析出的 UI 动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCommand {
    Tap {
        target: u32,
        summary: String,
    },
    LongPress {
        target: u32,
        summary: String,
    },
    Text {
        literal: String,
        summary: String,
    },
    Swipe {
        target: u32,
        direction: String,
        distance: String,
        summary: String,
    },
    TapGrid {
        point: GridPoint,
        summary: String,
    },
    LongPressGrid {
        point: GridPoint,
        summary: String,
    },
    SwipeGrid {
        start: GridPoint,
        end: GridPoint,
        summary: String,
    },
    /// 切换到网格模式
    Grid,
    Finish,
    /// 解析失败，保留错误与原始回复
    Error(ParseError),
}

impl ActionCommand {
    /// 动作种类名；网格变体带 `_grid` 后缀
    pub fn kind(&self) -> &'static str {
        match self {
            ActionCommand::Tap { .. } => "tap",
            ActionCommand::LongPress { .. } => "long_press",
            ActionCommand::Text { .. } => "text",
            ActionCommand::Swipe { .. } => "swipe",
            ActionCommand::TapGrid { .. } => "tap_grid",
            ActionCommand::LongPressGrid { .. } => "long_press_grid",
            ActionCommand::SwipeGrid { .. } => "swipe_grid",
            ActionCommand::Grid => "grid",
            ActionCommand::Finish => "FINISH",
            ActionCommand::Error(_) => "ERROR",
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            ActionCommand::Tap { summary, .. }
            | ActionCommand::LongPress { summary, .. }
            | ActionCommand::Text { summary, .. }
            | ActionCommand::Swipe { summary, .. }
            | ActionCommand::TapGrid { summary, .. }
            | ActionCommand::LongPressGrid { summary, .. }
            | ActionCommand::SwipeGrid { summary, .. } => Some(summary),
            ActionCommand::Grid | ActionCommand::Finish | ActionCommand::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionCommand::Error(_))
    }
}

/// 成对引号（开, 闭）
const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”')];

/// 去掉一层成对的外围引号；未加引号的值原样返回
pub fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = value
            .strip_prefix(*open)
            .and_then(|rest| rest.strip_suffix(*close))
        {
            return inner;
        }
    }
    value
}

/// 动作调用：动作名 + 括号内参数（无括号时 args 为 None）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCall<'a> {
    pub name: &'a str,
    pub args: Option<Vec<&'a str>>,
    raw: &'a str,
}

impl<'a> ActionCall<'a> {
    /// 从 Action 字段拆出动作名与参数；`raw` 为整条回复，仅用于错误诊断
    pub fn parse(action: &'a str, raw: &'a str) -> Result<Self, ParseError> {
        let Some(open) = action.find('(') else {
            return Ok(Self {
                name: action.trim(),
                args: None,
                raw,
            });
        };
        let name = action[..open].trim();
        let body_start = open + 1;

        let mut args = Vec::new();
        let mut quote: Option<char> = None;
        let mut segment_start = body_start;
        for (offset, ch) in action[body_start..].char_indices() {
            let pos = body_start + offset;
            if let Some(close) = quote {
                if ch == close {
                    quote = None;
                }
                continue;
            }
            if let Some((_, close)) = QUOTE_PAIRS.iter().find(|(open, _)| *open == ch) {
                quote = Some(*close);
                continue;
            }
            match ch {
                ',' => {
                    args.push(action[segment_start..pos].trim());
                    segment_start = pos + 1;
                }
                ')' => {
                    args.push(action[segment_start..pos].trim());
                    if args.len() == 1 && args[0].is_empty() {
                        args.clear();
                    }
                    return Ok(Self {
                        name,
                        args: Some(args),
                        raw,
                    });
                }
                _ => {}
            }
        }

        let detail = if quote.is_some() {
            "unterminated quote"
        } else {
            "missing closing parenthesis"
        };
        Err(malformed(name, detail, raw))
    }

    /// 要求恰好 `n` 个参数
    pub fn arity(&self, n: usize) -> Result<&[&'a str], ParseError> {
        let args = self
            .args
            .as_deref()
            .ok_or_else(|| malformed(self.name, "missing argument list", self.raw))?;
        if args.len() != n {
            return Err(malformed(
                self.name,
                &format!("expected {} argument(s), got {}", n, args.len()),
                self.raw,
            ));
        }
        Ok(args)
    }

    /// 整数参数（元素编号 / 区域编号）
    pub fn index(&self, value: &str) -> Result<u32, ParseError> {
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| malformed(self.name, &format!("invalid integer `{}`", value), self.raw))
    }

    /// 字符串参数（去引号后不能为空）
    pub fn string(&self, value: &'a str) -> Result<String, ParseError> {
        let stripped = strip_quotes(value);
        if stripped.is_empty() {
            return Err(malformed(self.name, "empty string argument", self.raw));
        }
        Ok(stripped.to_string())
    }

    /// `(area, "subarea")` 两个参数组成一个网格坐标
    fn grid_point(&self, area: &str, subarea: &'a str) -> Result<GridPoint, ParseError> {
        Ok(GridPoint {
            area: self.index(area)?,
            subarea: self.string(subarea)?,
        })
    }

    pub fn unrecognized(&self) -> ParseError {
        ParseError::UnrecognizedAction {
            name: self.name.to_string(),
            raw: self.raw.to_string(),
        }
    }
}

fn malformed(action: &str, detail: &str, raw: &str) -> ParseError {
    ParseError::MalformedArguments {
        action: action.to_string(),
        detail: detail.to_string(),
        raw: raw.to_string(),
    }
}

/// 动作词表：把 `grid` / `FINISH` 以外的动作调用映射为具体动作
pub trait ActionVocabulary {
    /// 词表认识的动作名；其余名字在切分参数之前就被拒绝
    const NAMES: &'static [&'static str];

    fn build(call: &ActionCall<'_>, summary: String) -> Result<ActionCommand, ParseError>;
}

/// 动作名：第一个 `(` 之前的部分
pub fn action_name(action: &str) -> &str {
    action.split('(').next().unwrap_or_default().trim()
}

/// 解释 Action 字段：FINISH 短路与 grid 对所有词表一致，先判定动作名再解析参数
pub fn interpret_action<V: ActionVocabulary>(
    action: &str,
    summary: String,
    raw: &str,
) -> Result<ActionCommand, ParseError> {
    if action.contains("FINISH") {
        return Ok(ActionCommand::Finish);
    }
    let name = action_name(action);
    if name == "grid" {
        return Ok(ActionCommand::Grid);
    }
    if !V::NAMES.iter().any(|known| *known == name) {
        return Err(ParseError::UnrecognizedAction {
            name: name.to_string(),
            raw: raw.to_string(),
        });
    }
    let call = ActionCall::parse(action, raw)?;
    V::build(&call, summary)
}

/// 探索模式：以 UI 元素编号定位
pub struct ExploreVocabulary;

impl ActionVocabulary for ExploreVocabulary {
    const NAMES: &'static [&'static str] = &["tap", "long_press", "text", "swipe"];

    fn build(call: &ActionCall<'_>, summary: String) -> Result<ActionCommand, ParseError> {
        match call.name {
            "tap" => {
                let args = call.arity(1)?;
                Ok(ActionCommand::Tap {
                    target: call.index(args[0])?,
                    summary,
                })
            }
            "long_press" => {
                let args = call.arity(1)?;
                Ok(ActionCommand::LongPress {
                    target: call.index(args[0])?,
                    summary,
                })
            }
            "text" => {
                let args = call.arity(1)?;
                Ok(ActionCommand::Text {
                    literal: strip_quotes(args[0]).to_string(),
                    summary,
                })
            }
            "swipe" => {
                let args = call.arity(3)?;
                Ok(ActionCommand::Swipe {
                    target: call.index(args[0])?,
                    direction: call.string(args[1])?,
                    distance: call.string(args[2])?,
                    summary,
                })
            }
            _ => Err(call.unrecognized()),
        }
    }
}

/// 网格模式：以区域 + 子区域定位
pub struct GridVocabulary;

impl ActionVocabulary for GridVocabulary {
    const NAMES: &'static [&'static str] = &["tap", "long_press", "swipe"];

    fn build(call: &ActionCall<'_>, summary: String) -> Result<ActionCommand, ParseError> {
        match call.name {
            "tap" => {
                let args = call.arity(2)?;
                Ok(ActionCommand::TapGrid {
                    point: call.grid_point(args[0], args[1])?,
                    summary,
                })
            }
            "long_press" => {
                let args = call.arity(2)?;
                Ok(ActionCommand::LongPressGrid {
                    point: call.grid_point(args[0], args[1])?,
                    summary,
                })
            }
            "swipe" => {
                let args = call.arity(4)?;
                Ok(ActionCommand::SwipeGrid {
                    start: call.grid_point(args[0], args[1])?,
                    end: call.grid_point(args[2], args[3])?,
                    summary,
                })
            }
            _ => Err(call.unrecognized()),
        }
    }
}

/// Observation / Thought / Action / Summary 四段式回复，动作词表可替换
pub struct ActionGrammar<V>(PhantomData<V>);

impl<V: ActionVocabulary> ReplyGrammar for ActionGrammar<V> {
    type Output = ActionCommand;

    const LABELS: &'static [&'static str] = &["Observation", "Thought", "Action", "Summary"];
    const REQUIRED: &'static [&'static str] = &["Observation", "Thought", "Action", "Summary"];

    fn interpret(reply: &LabeledReply<'_>, fields: &Fields) -> Result<ActionCommand, ParseError> {
        interpret_action::<V>(
            fields.get("Action"),
            fields.get("Summary").to_string(),
            reply.raw(),
        )
    }
}

pub type ExploreGrammar = ActionGrammar<ExploreVocabulary>;
pub type GridGrammar = ActionGrammar<GridVocabulary>;
