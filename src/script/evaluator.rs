//! 式の評価器
//!
//! # 責務
//!
//! - [`Expr`] の静的検査（未定義の変数・関数の検出、結果の種類の推論）
//! - 非同期の木構造評価（ホスト機能呼び出しを `await` する）
//! - 組み込み関数（`len` / `trim` / `upper` / `lower` / `split` / `join` /
//!   `contains` / `replace` / `string`）
//!
//! ## 演算の規則
//!
//! - `+` はどちらかが文字列なら連結、数値同士なら加算、リスト同士なら結合
//! - `&&` / `||` / 三項演算子は短絡評価
//! - 真偽は `null` と `false` のみ偽

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::trace;

use super::ast::{BinaryOp, Expr, NameRef, UnaryOp};
use super::parser;
use super::value::{Value, ValueKind};
use super::{Bindings, ExpressionError, ScriptEngine, ScriptError};
use crate::host::HostBridge;

/// スクリプトから呼び出せるホスト機能
pub const HOST_FUNCTIONS: &[&str] = &[
    "Get",
    "AppendFile",
    "ReadFile",
    "Extism",
    "Resend",
    "Workflow",
];

/// 組み込み関数
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "len", "trim", "upper", "lower", "split", "join", "contains", "replace", "string",
];

type EvalResult = Result<Value, ScriptError>;

/// 既定のスクリプトエンジン
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEngine;

impl ExprEngine {
    pub fn new() -> Self {
        Self
    }

    /// 式をパースし、未定義の名前が無いことを検査する
    pub fn compile(&self, source: &str, bindings: &Bindings) -> Result<Expr, ExpressionError> {
        let compile_error = |source_err| ExpressionError::Compile {
            expression: source.to_string(),
            source: source_err,
        };

        let expr = parser::parse(source).map_err(compile_error)?;

        let mut unknown = None;
        expr.visit_names(&mut |name| {
            if unknown.is_some() {
                return;
            }
            match name {
                NameRef::Variable(var) if !bindings.contains(var) => {
                    unknown = Some(ScriptError::UnknownVariable(var.to_string()));
                }
                NameRef::Function(function)
                    if !HOST_FUNCTIONS.contains(&function)
                        && !BUILTIN_FUNCTIONS.contains(&function) =>
                {
                    unknown = Some(ScriptError::UnknownFunction(function.to_string()));
                }
                _ => {}
            }
        });

        match unknown {
            Some(err) => Err(compile_error(err)),
            None => Ok(expr),
        }
    }

    /// 結果の種類を指定してコンパイルする
    ///
    /// 推論できた種類が `expected` と異なる式はコンパイルエラーです。
    /// 推論できない式（変数・メンバー参照・インデックス等）はそのまま通します。
    pub fn compile_expecting(
        &self,
        source: &str,
        bindings: &Bindings,
        expected: ValueKind,
    ) -> Result<Expr, ExpressionError> {
        let expr = self.compile(source, bindings)?;
        match infer_kind(&expr) {
            Some(actual) if actual != expected => Err(ExpressionError::Compile {
                expression: source.to_string(),
                source: ScriptError::ResultKind {
                    expected: expected.name(),
                    actual: actual.name(),
                },
            }),
            _ => Ok(expr),
        }
    }

    async fn run(
        &self,
        source: &str,
        expr: &Expr,
        bindings: &Bindings,
        host: &HostBridge<'_>,
    ) -> Result<Value, ExpressionError> {
        trace!(expression = source, "スクリプトを評価します");

        let interpreter = Interpreter { bindings, host };
        interpreter
            .eval(expr)
            .await
            .map_err(|source_err| ExpressionError::Runtime {
                expression: source.to_string(),
                source: source_err,
            })
    }
}

#[async_trait]
impl ScriptEngine for ExprEngine {
    async fn evaluate(
        &self,
        source: &str,
        bindings: &Bindings,
        host: &HostBridge<'_>,
    ) -> Result<Value, ExpressionError> {
        let expr = self.compile(source, bindings)?;
        self.run(source, &expr, bindings, host).await
    }

    async fn evaluate_expecting(
        &self,
        source: &str,
        bindings: &Bindings,
        host: &HostBridge<'_>,
        expected: ValueKind,
    ) -> Result<Value, ExpressionError> {
        let expr = self.compile_expecting(source, bindings, expected)?;
        self.run(source, &expr, bindings, host).await
    }
}

/// 式の結果の種類を静的に推論する（推論できなければ `None`）
fn infer_kind(expr: &Expr) -> Option<ValueKind> {
    match expr {
        Expr::Literal(value) => Some(value.kind()),
        Expr::List(_) => Some(ValueKind::List),
        Expr::Map(_) => Some(ValueKind::Map),
        Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. } => None,
        Expr::Call { function, .. } => call_kind(function),
        Expr::Unary { op: UnaryOp::Not, .. } => Some(ValueKind::Bool),
        Expr::Unary { op: UnaryOp::Neg, .. } => Some(ValueKind::Number),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Or
            | BinaryOp::And
            | BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => Some(ValueKind::Bool),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                Some(ValueKind::Number)
            }
            BinaryOp::Add => match (infer_kind(left), infer_kind(right)) {
                (Some(ValueKind::String), _) | (_, Some(ValueKind::String)) => {
                    Some(ValueKind::String)
                }
                (Some(ValueKind::Number), Some(ValueKind::Number)) => Some(ValueKind::Number),
                (Some(ValueKind::List), Some(ValueKind::List)) => Some(ValueKind::List),
                _ => None,
            },
        },
        Expr::Ternary {
            consequent,
            alternate,
            ..
        } => match (infer_kind(consequent), infer_kind(alternate)) {
            (Some(a), Some(b)) if a == b => Some(a),
            _ => None,
        },
    }
}

/// ホスト機能・組み込み関数の戻り値の種類
fn call_kind(function: &str) -> Option<ValueKind> {
    match function {
        "AppendFile" | "len" => Some(ValueKind::Number),
        "Get" | "ReadFile" | "Extism" | "Workflow" | "trim" | "upper" | "lower" | "join"
        | "replace" | "string" => Some(ValueKind::String),
        "Resend" => Some(ValueKind::Null),
        "split" => Some(ValueKind::List),
        "contains" => Some(ValueKind::Bool),
        _ => None,
    }
}

/// 1回の評価の状態
struct Interpreter<'a> {
    bindings: &'a Bindings,
    host: &'a HostBridge<'a>,
}

impl<'a> Interpreter<'a> {
    fn eval<'s>(&'s self, expr: &'s Expr) -> BoxFuture<'s, EvalResult> {
        async move {
            match expr {
                Expr::Literal(value) => Ok(value.clone()),
                Expr::Ident(name) => self
                    .bindings
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ScriptError::UnknownVariable(name.clone())),
                Expr::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item).await?);
                    }
                    Ok(Value::List(values))
                }
                Expr::Map(entries) => {
                    let mut values = BTreeMap::new();
                    for (key, item) in entries {
                        values.insert(key.clone(), self.eval(item).await?);
                    }
                    Ok(Value::Map(values))
                }
                Expr::Member { object, property } => {
                    let object = self.eval(object).await?;
                    member(&object, property)
                }
                Expr::Index { object, index } => {
                    let object = self.eval(object).await?;
                    let index = self.eval(index).await?;
                    index_value(&object, &index)
                }
                Expr::Call { function, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg).await?);
                    }
                    self.call(function, values).await
                }
                Expr::Unary { op, operand } => {
                    let operand = self.eval(operand).await?;
                    unary(*op, operand)
                }
                Expr::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                } => {
                    if !self.eval(left).await?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.eval(right).await?.is_truthy()))
                }
                Expr::Binary {
                    op: BinaryOp::Or,
                    left,
                    right,
                } => {
                    if self.eval(left).await?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.eval(right).await?.is_truthy()))
                }
                Expr::Binary { op, left, right } => {
                    let left = self.eval(left).await?;
                    let right = self.eval(right).await?;
                    binary(*op, left, right)
                }
                Expr::Ternary {
                    condition,
                    consequent,
                    alternate,
                } => {
                    if self.eval(condition).await?.is_truthy() {
                        self.eval(consequent).await
                    } else {
                        self.eval(alternate).await
                    }
                }
            }
        }
        .boxed()
    }

    /// ホスト機能・組み込み関数の呼び出し
    async fn call(&self, function: &str, args: Vec<Value>) -> EvalResult {
        match function {
            "Get" => {
                let [url] = arity::<1>(function, args)?;
                let body = self.host.fetch(&text(function, &url)?).await?;
                Ok(Value::String(body))
            }
            "AppendFile" => {
                let [content, path] = arity::<2>(function, args)?;
                let written = self
                    .host
                    .append_to_file(&text(function, &content)?, &text(function, &path)?)
                    .await?;
                Ok(Value::Number(written as f64))
            }
            "ReadFile" => {
                let [path] = arity::<1>(function, args)?;
                let contents = self.host.read_file(&text(function, &path)?).await?;
                Ok(Value::String(contents))
            }
            "Extism" => {
                let [locator, entry, input] = arity::<3>(function, args)?;
                let output = self
                    .host
                    .invoke_plugin(
                        &text(function, &locator)?,
                        &text(function, &entry)?,
                        &text(function, &input)?,
                    )
                    .await?;
                Ok(Value::String(output))
            }
            "Resend" => {
                let [to, from, subject, body] = arity::<4>(function, args)?;
                self.host
                    .send_email(
                        &text(function, &to)?,
                        &text(function, &from)?,
                        &text(function, &subject)?,
                        &text(function, &body)?,
                    )
                    .await?;
                Ok(Value::Null)
            }
            "Workflow" => {
                let [path, prompt] = arity::<2>(function, args)?;
                let output = self
                    .host
                    .invoke_nested_workflow(&text(function, &path)?, &text(function, &prompt)?)
                    .await?;
                Ok(Value::String(output))
            }
            _ => call_builtin(function, args),
        }
    }
}

/// 引数の数を検査して固定長配列にする
fn arity<const N: usize>(function: &str, args: Vec<Value>) -> Result<[Value; N], ScriptError> {
    let actual = args.len();
    args.try_into().map_err(|_| ScriptError::Arity {
        function: function.to_string(),
        expected: N,
        actual,
    })
}

/// 文字列引数を取り出す
fn text(function: &str, value: &Value) -> Result<String, ScriptError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ScriptError::Type(format!(
            "{} の引数は文字列である必要があります（実際: {}）",
            function,
            other.type_name()
        ))),
    }
}

fn call_builtin(function: &str, args: Vec<Value>) -> EvalResult {
    match function {
        "len" => {
            let [value] = arity::<1>(function, args)?;
            let len = match &value {
                Value::String(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(ScriptError::Type(format!(
                        "len は {} に適用できません",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Number(len as f64))
        }
        "trim" => {
            let [value] = arity::<1>(function, args)?;
            Ok(Value::from(text(function, &value)?.trim()))
        }
        "upper" => {
            let [value] = arity::<1>(function, args)?;
            Ok(Value::String(text(function, &value)?.to_uppercase()))
        }
        "lower" => {
            let [value] = arity::<1>(function, args)?;
            Ok(Value::String(text(function, &value)?.to_lowercase()))
        }
        "split" => {
            let [value, separator] = arity::<2>(function, args)?;
            let value = text(function, &value)?;
            let separator = text(function, &separator)?;
            Ok(Value::List(
                value.split(separator.as_str()).map(Value::from).collect(),
            ))
        }
        "join" => {
            let [items, separator] = arity::<2>(function, args)?;
            let separator = text(function, &separator)?;
            match items {
                Value::List(items) => Ok(Value::String(
                    items
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(&separator),
                )),
                other => Err(ScriptError::Type(format!(
                    "join の第1引数はリストである必要があります（実際: {}）",
                    other.type_name()
                ))),
            }
        }
        "contains" => {
            let [haystack, needle] = arity::<2>(function, args)?;
            let found = match &haystack {
                Value::String(s) => s.contains(text(function, &needle)?.as_str()),
                Value::List(items) => items.contains(&needle),
                Value::Map(entries) => entries.contains_key(text(function, &needle)?.as_str()),
                other => {
                    return Err(ScriptError::Type(format!(
                        "contains は {} に適用できません",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Bool(found))
        }
        "replace" => {
            let [value, from, to] = arity::<3>(function, args)?;
            let value = text(function, &value)?;
            Ok(Value::String(value.replace(
                text(function, &from)?.as_str(),
                text(function, &to)?.as_str(),
            )))
        }
        "string" => {
            let [value] = arity::<1>(function, args)?;
            Ok(Value::String(value.to_string()))
        }
        _ => Err(ScriptError::UnknownFunction(function.to_string())),
    }
}

fn member(object: &Value, property: &str) -> EvalResult {
    match object {
        Value::Map(entries) => Ok(entries.get(property).cloned().unwrap_or(Value::Null)),
        other => Err(ScriptError::Type(format!(
            "{} にプロパティ '{}' はありません",
            other.type_name(),
            property
        ))),
    }
}

fn index_value(object: &Value, index: &Value) -> EvalResult {
    match (object, index) {
        (Value::List(items), Value::Number(n)) => {
            let position = list_position(*n, items.len())?;
            Ok(items[position].clone())
        }
        (Value::String(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let position = list_position(*n, chars.len())?;
            Ok(Value::String(chars[position].to_string()))
        }
        (Value::Map(entries), Value::String(key)) => {
            Ok(entries.get(key).cloned().unwrap_or(Value::Null))
        }
        (object, index) => Err(ScriptError::Type(format!(
            "{} を {} でインデックスできません",
            object.type_name(),
            index.type_name()
        ))),
    }
}

/// 負のインデックスは末尾から数える
fn list_position(index: f64, len: usize) -> Result<usize, ScriptError> {
    let out_of_range = ScriptError::IndexOutOfRange { index, len };
    if index.fract() != 0.0 {
        return Err(out_of_range);
    }
    let resolved = if index < 0.0 {
        len as f64 + index
    } else {
        index
    };
    if resolved < 0.0 || resolved >= len as f64 {
        return Err(out_of_range);
    }
    Ok(resolved as usize)
}

fn unary(op: UnaryOp, operand: Value) -> EvalResult {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Neg, other) => Err(ScriptError::Type(format!(
            "{} の符号は反転できません",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult {
    use BinaryOp::*;

    match op {
        Eq => Ok(Value::Bool(left == right)),
        Ne => Ok(Value::Bool(left != right)),
        Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (left @ Value::String(_), right) | (left, right @ Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            (left, right) => Err(operand_error("+", &left, &right)),
        },
        Sub | Mul | Div | Mod => match (left, right) {
            (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b),
            (left, right) => Err(operand_error(symbol(op), &left, &right)),
        },
        Lt | Lte | Gt | Gte => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let ordering = ordering.ok_or_else(|| operand_error(symbol(op), &left, &right))?;
            let result = match op {
                Lt => ordering.is_lt(),
                Lte => ordering.is_le(),
                Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> EvalResult {
    match op {
        BinaryOp::Sub => Ok(Value::Number(a - b)),
        BinaryOp::Mul => Ok(Value::Number(a * b)),
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => Err(ScriptError::DivisionByZero),
        BinaryOp::Div => Ok(Value::Number(a / b)),
        _ => Ok(Value::Number(a % b)),
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "||",
        BinaryOp::And => "&&",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Lte => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Gte => ">=",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
    }
}

fn operand_error(op: &str, left: &Value, right: &Value) -> ScriptError {
    ScriptError::Type(format!(
        "演算子 {} は {} と {} に適用できません",
        op,
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::{RecordingHost, RecordingInvoker};
    use std::path::Path;

    async fn eval_with(source: &str, bindings: &Bindings, host: &RecordingHost) -> EvalResult {
        let invoker = RecordingInvoker::default();
        let bridge = HostBridge::new(host, &invoker, Path::new("."), 0, None);
        ExprEngine::new()
            .evaluate(source, bindings, &bridge)
            .await
            .map_err(|err| match err {
                ExpressionError::Compile { source, .. } | ExpressionError::Runtime { source, .. } => {
                    source
                }
            })
    }

    async fn eval(source: &str) -> EvalResult {
        eval_with(source, &Bindings::new(), &RecordingHost::default()).await
    }

    #[tokio::test]
    async fn test_arithmetic_and_concatenation() {
        assert_eq!(eval("1 + 2 * 3").await.unwrap(), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3").await.unwrap(), Value::Number(9.0));
        assert_eq!(eval("7 % 4").await.unwrap(), Value::Number(3.0));
        assert_eq!(eval("-2 + 5").await.unwrap(), Value::Number(3.0));
        assert_eq!(eval(r#""item " + 3"#).await.unwrap(), Value::from("item 3"));
        assert_eq!(
            eval("[1] + [2]").await.unwrap(),
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[tokio::test]
    async fn test_comparison_and_logic() {
        assert_eq!(eval("1 < 2 && 'a' < 'b'").await.unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 1.0").await.unwrap(), Value::Bool(true));
        assert_eq!(eval("not (2 >= 3)").await.unwrap(), Value::Bool(true));
        assert_eq!(eval("null || false").await.unwrap(), Value::Bool(false));
        assert_eq!(eval("true ? 'yes' : 'no'").await.unwrap(), Value::from("yes"));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_host_calls() {
        let host = RecordingHost::default();
        let result = eval_with(
            r#"false && AppendFile("x", "out.txt") > 0"#,
            &Bindings::new(),
            &host,
        )
        .await
        .unwrap();
        assert_eq!(result, Value::Bool(false));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bindings_and_access() {
        let bindings = Bindings::new()
            .with("input", Value::from("hello"))
            .with(
                "iterValue",
                Value::from(serde_json::json!({"name": "rust", "tags": ["fast", "safe"]})),
            );
        let host = RecordingHost::default();

        assert_eq!(
            eval_with("input + ' ' + iterValue.name", &bindings, &host).await.unwrap(),
            Value::from("hello rust")
        );
        assert_eq!(
            eval_with("iterValue.tags[-1]", &bindings, &host).await.unwrap(),
            Value::from("safe")
        );
        assert_eq!(
            eval_with("iterValue['missing']", &bindings, &host).await.unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_compile_expecting_rejects_known_kinds() {
        let engine = ExprEngine::new();
        let bindings = Bindings::new().with("input", Value::from("x"));

        for source in [
            r#"AppendFile("side effect", "out.txt")"#,
            r#"Get("https://example.com")"#,
            r#"Resend("a", "b", "c", "d")"#,
            r#""abc""#,
            "1 + 2",
            "input + 1",
            "len([1])",
            "{a: 1}",
            "true ? 'a' : 'b'",
        ] {
            let result = engine.compile_expecting(source, &bindings, ValueKind::List);
            assert!(
                matches!(
                    result,
                    Err(ExpressionError::Compile {
                        source: ScriptError::ResultKind { expected: "list", .. },
                        ..
                    })
                ),
                "{} should be rejected",
                source
            );
        }
    }

    #[test]
    fn test_compile_expecting_accepts_lists_and_unknown_kinds() {
        let engine = ExprEngine::new();
        let bindings = Bindings::new().with("input", Value::from("x"));

        for source in [
            "[1, 2]",
            r#"split(Get("https://example.com"), ",")"#,
            "[1] + [2]",
            "input",
            "{a: [1]}.a",
            "true ? [1] : input",
        ] {
            assert!(
                engine
                    .compile_expecting(source, &bindings, ValueKind::List)
                    .is_ok(),
                "{} should compile",
                source
            );
        }
    }

    #[tokio::test]
    async fn test_evaluate_expecting_skips_host_on_kind_mismatch() {
        let host = RecordingHost::default();
        let invoker = RecordingInvoker::default();
        let bridge = HostBridge::new(&host, &invoker, Path::new("."), 0, None);

        let result = ExprEngine::new()
            .evaluate_expecting(
                r#"AppendFile("side effect", "out.txt")"#,
                &Bindings::new(),
                &bridge,
                ValueKind::List,
            )
            .await;

        assert!(matches!(result, Err(ExpressionError::Compile { .. })));
        assert!(host.calls().is_empty());
        assert_eq!(host.file("out.txt"), None);
    }

    #[tokio::test]
    async fn test_builtins() {
        assert_eq!(eval("len('héllo')").await.unwrap(), Value::Number(5.0));
        assert_eq!(eval("upper(trim('  a '))").await.unwrap(), Value::from("A"));
        assert_eq!(
            eval("join(split('a,b,c', ','), '-')").await.unwrap(),
            Value::from("a-b-c")
        );
        assert_eq!(eval("contains([1, 2], 2)").await.unwrap(), Value::Bool(true));
        assert_eq!(eval("replace('aXa', 'a', 'b')").await.unwrap(), Value::from("bXb"));
        assert_eq!(eval("string([1, 'x'])").await.unwrap(), Value::from(r#"[1,"x"]"#));
    }

    #[tokio::test]
    async fn test_unknown_names_fail_at_compile_time() {
        let host = RecordingHost::default();
        let invoker = RecordingInvoker::default();
        let bridge = HostBridge::new(&host, &invoker, Path::new("."), 0, None);

        let err = ExprEngine::new()
            .evaluate("AppendFile(input, 'out.txt') + undefinedVar", &Bindings::new(), &bridge)
            .await
            .unwrap_err();
        assert!(matches!(err, ExpressionError::Compile { .. }));
        assert!(host.calls().is_empty());

        let err = ExprEngine::new()
            .evaluate("Shell('rm')", &Bindings::new(), &bridge)
            .await
            .unwrap_err();
        assert!(matches!(
            err.cause(),
            ScriptError::UnknownFunction(name) if name == "Shell"
        ));
    }

    #[tokio::test]
    async fn test_runtime_errors() {
        assert!(matches!(eval("1 / 0").await, Err(ScriptError::DivisionByZero)));
        assert!(matches!(eval("[1][3]").await, Err(ScriptError::IndexOutOfRange { .. })));
        assert!(matches!(eval("-'a'").await, Err(ScriptError::Type(_))));
        assert!(matches!(
            eval("trim('a', 'b')").await,
            Err(ScriptError::Arity { expected: 1, actual: 2, .. })
        ));
        assert!(matches!(eval("ReadFile(1)").await, Err(ScriptError::Type(_))));
    }

    #[tokio::test]
    async fn test_host_functions_are_dispatched() {
        let host = RecordingHost::default().with_fetch_body("<html>ok</html>");
        let bindings = Bindings::new().with("input", Value::from("report"));

        let body = eval_with("Get('https://example.com')", &bindings, &host)
            .await
            .unwrap();
        assert_eq!(body, Value::from("<html>ok</html>"));

        let written = eval_with("AppendFile(input, 'out.md')", &bindings, &host)
            .await
            .unwrap();
        assert_eq!(written, Value::Number(6.0));

        assert_eq!(
            host.calls(),
            vec![
                "fetch https://example.com".to_string(),
                "append out.md report".to_string(),
            ]
        );
    }
}
