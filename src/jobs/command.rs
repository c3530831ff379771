//! 脚本命令：一次外部脚本调用（脚本 + 有序参数），不可变
//!
//! 只负责渲染为可执行的 argv；参数语义由各脚本自行校验。

use serde::Serialize;

/// 一次外部脚本调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptCommand {
    /// 解释器（如 python3）；为 None 时直接执行脚本
    interpreter: Option<String>,
    script: String,
    args: Vec<String>,
}

impl ScriptCommand {
    pub fn new<I, S>(script: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            interpreter: None,
            script: script.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// 指定解释器；空串视为不使用解释器
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        let interpreter = interpreter.into();
        self.interpreter = (!interpreter.trim().is_empty()).then_some(interpreter);
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// `[解释器] 脚本 参数...`
    pub fn to_argv(&self) -> Vec<String> {
        self.interpreter
            .iter()
            .cloned()
            .chain(std::iter::once(self.script.clone()))
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// 日志中展示的命令行
    pub fn display(&self) -> String {
        self.to_argv().join(" ")
    }
}

/// 去掉应用名中的全部空格（与脚本侧目录命名一致）
pub fn normalize_app_name(raw: &str) -> String {
    raw.replace(' ', "")
}

/// 各脚本共用的参数：`--app <app> --root_dir <root_dir>`
pub fn build_common_args(app: &str, root_dir: &str) -> Vec<String> {
    vec![
        "--app".to_string(),
        app.to_string(),
        "--root_dir".to_string(),
        root_dir.to_string(),
    ]
}
