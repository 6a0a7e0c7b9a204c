//! Ordered first-match rule chain mapping a chat utterance to a reply.
//!
//! The chain is evaluated top to bottom and the first matching rule wins;
//! rule order is the tie-break, so overlapping predicates further down are
//! intentionally unreachable. The whole thing is a pure function of the
//! utterance plus a caller-supplied clock reading and online-user count,
//! which makes it safe to call from any number of tasks at once.

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

/// Display name of the assistant. Also the chat command trigger (`@川小农`).
pub const ASSISTANT_NAME: &str = "川小农";

/// State the rules are allowed to read. The responder never writes anything.
#[derive(Debug, Clone, Copy)]
pub struct RespondContext {
    /// Clock reading used by the time and date rules.
    pub now: DateTime<Local>,
    /// Connected-participant count from the presence registry.
    pub online_users: usize,
}

/// Greeting tokens, checked in this order against the lowercased utterance.
const GREETINGS: [&str; 9] = [
    "你好", "hi", "hello", "早上好", "下午好", "晚上好", "晚安", "早", "嗨",
];

/// Fallback candidates for short utterances (fewer than 5 chars).
const CASUAL_REPLIES: [&str; 7] = [
    "这个问题很有意思！",
    "让我想想...",
    "你能告诉我更多吗？",
    "我理解你的意思。",
    "这是个好问题！",
    "我也觉得是这样。",
    "很有见解！",
];

/// Fallback candidates for everything else.
const DEFAULT_REPLIES: [&str; 4] = [
    "抱歉，我不太理解你的意思。",
    "能换个方式问吗？",
    "我正在学习中，还不太明白这个问题。",
    "你可以试试问我其他问题。",
];

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Sqrt,
    Square,
}

/// Arithmetic patterns in evaluation order. Each is searched anywhere in the
/// utterance, so the first pattern found wins even when a later one would
/// also match. Square root is listed ahead of square because `N的平方` is a
/// prefix of `N的平方根` and would otherwise shadow it.
static ARITH_RULES: LazyLock<Vec<(Regex, ArithOp)>> = LazyLock::new(|| {
    [
        (r"(\d+)\s*\+\s*(\d+)", ArithOp::Add),
        (r"(\d+)\s*-\s*(\d+)", ArithOp::Sub),
        (r"(\d+)\s*\*\s*(\d+)", ArithOp::Mul),
        (r"(\d+)\s*/\s*(\d+)", ArithOp::Div),
        (r"(-?\d+)的平方根", ArithOp::Sqrt),
        (r"(\d+)的平方", ArithOp::Square),
    ]
    .into_iter()
    .map(|(pattern, op)| (Regex::new(pattern).expect("arithmetic pattern"), op))
    .collect()
});

/// Produce the reply for one utterance. Total: every input yields exactly one
/// response, with the fallback rule as the catch-all.
pub fn respond(utterance: &str, ctx: &RespondContext) -> String {
    let query = utterance.to_lowercase();

    // 1. Greetings: echo the matched token.
    for greeting in GREETINGS {
        if query.contains(greeting) {
            return format!("{greeting}！我是{ASSISTANT_NAME}AI助手，有什么可以帮助你的吗？");
        }
    }

    // 2. Identity.
    if query.contains("叫什么") || query.contains("名字") || query.contains("是谁") {
        return format!("我是{ASSISTANT_NAME}AI助手，很高兴为你服务！");
    }

    // 3. Time.
    if query.contains("时间") || query.contains("几点") {
        return format!("当前时间是：{}", ctx.now.format("%Y-%m-%d %H:%M:%S"));
    }

    // 4. Date. The grouping is `日期 OR (今天 AND (几号 OR 日期))`, kept
    // verbatim even though the inner 日期 check is redundant with the outer.
    if query.contains("日期")
        || (query.contains("今天") && (query.contains("几号") || query.contains("日期")))
    {
        return format!("今天是：{}", ctx.now.format("%Y年%m月%d日"));
    }

    // 5. Arithmetic.
    if let Some(result) = eval_arithmetic(&query) {
        return format!("计算结果：{result}");
    }

    // 6. Movie-command help.
    if query.contains("电影")
        && (query.contains("怎么") || query.contains("如何") || query.contains("使用"))
    {
        return "使用@电影命令可以播放视频，格式：@电影 视频URL。支持YouTube、Vimeo和直接视频文件。"
            .to_string();
    }

    // 7. General help.
    if query.contains("帮助") || query.contains("功能") || query.contains("怎么用") {
        return "我可以帮助你：\n1. 聊天对话\n2. 查询时间日期\n3. 简单数学计算\n4. 播放电影（@电影 URL）\n5. 查看在线用户"
            .to_string();
    }

    // 8. Online-user count, with distinct phrasing for 0, 1 and N.
    if query.contains("在线") && (query.contains("人") || query.contains("用户")) {
        return match ctx.online_users {
            0 => "当前没有其他在线用户。".to_string(),
            1 => "当前有1位在线用户。".to_string(),
            n => format!("当前有{n}位在线用户。"),
        };
    }

    // 9. Leaving the room.
    if query.contains("退出") || query.contains("离开") {
        return "点击右上角的退出按钮可以离开聊天室。".to_string();
    }

    // 10. Thanks.
    if query.contains("谢谢") || query.contains("感谢") || query.contains("thank") {
        return "不客气，很高兴能帮到你！".to_string();
    }

    // 11. Fallback. The pick is indexed by utterance length modulo the list
    // length, so equal-length inputs always land on the same candidate. This
    // is deliberate determinism, not a stand-in for a real RNG.
    let len = query.chars().count();
    if len < 5 {
        CASUAL_REPLIES[len % CASUAL_REPLIES.len()].to_string()
    } else {
        DEFAULT_REPLIES[len % DEFAULT_REPLIES.len()].to_string()
    }
}

/// Try the arithmetic patterns in order; `None` means no pattern applied and
/// evaluation falls through to the later rules.
fn eval_arithmetic(query: &str) -> Option<String> {
    for (pattern, op) in ARITH_RULES.iter() {
        let Some(caps) = pattern.captures(query) else {
            continue;
        };
        if let Some(result) = op.eval(&caps) {
            return Some(result);
        }
    }
    None
}

impl ArithOp {
    /// `None` when the captured digits don't fit an i64; the pattern is then
    /// treated as unmatched rather than failing the whole response.
    fn eval(self, caps: &regex::Captures<'_>) -> Option<String> {
        let a: i64 = caps[1].parse().ok()?;
        match self {
            ArithOp::Add => {
                let b: i64 = caps[2].parse().ok()?;
                a.checked_add(b).map(|v| v.to_string())
            }
            ArithOp::Sub => {
                let b: i64 = caps[2].parse().ok()?;
                a.checked_sub(b).map(|v| v.to_string())
            }
            ArithOp::Mul => {
                let b: i64 = caps[2].parse().ok()?;
                a.checked_mul(b).map(|v| v.to_string())
            }
            ArithOp::Div => {
                let b: i64 = caps[2].parse().ok()?;
                if b == 0 {
                    Some("除数不能为零！".to_string())
                } else {
                    Some(format_float(a as f64 / b as f64))
                }
            }
            ArithOp::Sqrt => {
                if a < 0 {
                    Some("负数没有实数平方根！".to_string())
                } else {
                    Some(format_float((a as f64).sqrt()))
                }
            }
            ArithOp::Square => a.checked_mul(a).map(|v| v.to_string()),
        }
    }
}

/// Division and square root always report a float, so whole values keep one
/// decimal place (`5.0` rather than `5`).
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
