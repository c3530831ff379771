//! 模型回复解析：字段抽取、动作解析（探索 / 网格）、反思解析

pub mod action;
pub mod fields;
pub mod grammar;
pub mod reflect;

pub use action::{ActionCall, ActionCommand, GridPoint};
pub use fields::{extract_field, Fields, LabeledReply};
pub use grammar::{
    explore_action, grid_action, parse_explore_reply, parse_grid_reply, parse_reflect_reply,
    parse_reply, reflect_decision, ReplyGrammar,
};
pub use reflect::ReflectionDecision;
