//! PEST ベースの式パーサー
//!
//! `grammar.pest` の構文木を [`Expr`] に変換します。

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use super::ScriptError;
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::value::Value;

#[derive(Parser)]
#[grammar = "script/grammar.pest"]
struct ExpressionParser;

type ParseResult<T> = Result<T, ScriptError>;

/// 式をパースする
pub fn parse(source: &str) -> ParseResult<Expr> {
    let mut pairs = ExpressionParser::parse(Rule::script, source)
        .map_err(|e| ScriptError::Syntax(e.to_string()))?;
    let script = next_pair(&mut pairs, "script")?;
    let mut inner = script.into_inner();
    build_expression(next_pair(&mut inner, "expression")?)
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, expected: &str) -> ParseResult<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| ScriptError::Syntax(format!("{} が必要です", expected)))
}

fn build_expression(pair: Pair<Rule>) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::expression => {
            let mut inner = pair.into_inner();
            build_expression(next_pair(&mut inner, "expression")?)
        }
        Rule::ternary => build_ternary(pair),
        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::comparison
        | Rule::additive
        | Rule::multiplicative => build_binary_expr(pair),
        Rule::unary => build_unary(pair),
        Rule::postfix => build_postfix(pair),
        Rule::call => build_call(pair),
        Rule::list => {
            let items = pair
                .into_inner()
                .map(build_expression)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::List(items))
        }
        Rule::map => build_map(pair),
        Rule::identifier => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::null_lit => Ok(Expr::Literal(Value::Null)),
        Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "true"))),
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(|n| Expr::Literal(Value::Number(n)))
            .map_err(|e| ScriptError::Syntax(format!("数値を解釈できません: {}", e))),
        Rule::string => Ok(Expr::Literal(Value::String(build_string(pair)?))),
        rule => Err(ScriptError::Syntax(format!(
            "予期しない構文要素です: {:?}",
            rule
        ))),
    }
}

fn build_ternary(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let condition = build_expression(next_pair(&mut inner, "condition")?)?;

    match inner.next() {
        None => Ok(condition),
        Some(consequent) => {
            let consequent = build_expression(consequent)?;
            let alternate = build_expression(next_pair(&mut inner, "':' の後の式")?)?;
            Ok(Expr::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            })
        }
    }
}

/// 左結合の二項演算を組み立てる
fn build_binary_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut left = build_expression(next_pair(&mut inner, "左辺")?)?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_rule() {
            Rule::op_or => BinaryOp::Or,
            Rule::op_and => BinaryOp::And,
            Rule::op_eq => BinaryOp::Eq,
            Rule::op_ne => BinaryOp::Ne,
            Rule::op_lt => BinaryOp::Lt,
            Rule::op_lte => BinaryOp::Lte,
            Rule::op_gt => BinaryOp::Gt,
            Rule::op_gte => BinaryOp::Gte,
            Rule::op_add => BinaryOp::Add,
            Rule::op_sub => BinaryOp::Sub,
            Rule::op_mul => BinaryOp::Mul,
            Rule::op_div => BinaryOp::Div,
            Rule::op_mod => BinaryOp::Mod,
            rule => {
                return Err(ScriptError::Syntax(format!(
                    "未知の演算子です: {:?}",
                    rule
                )));
            }
        };
        let right = build_expression(next_pair(&mut inner, "右辺")?)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn build_unary(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut ops = Vec::new();
    let mut operand = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::op_not => ops.push(UnaryOp::Not),
            Rule::op_neg => ops.push(UnaryOp::Neg),
            _ => operand = Some(build_expression(inner)?),
        }
    }

    let mut expr = operand.ok_or_else(|| ScriptError::Syntax("演算対象がありません".to_string()))?;
    // 内側の演算子から適用する
    for op in ops.into_iter().rev() {
        expr = Expr::Unary {
            op,
            operand: Box::new(expr),
        };
    }
    Ok(expr)
}

fn build_postfix(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = build_expression(next_pair(&mut inner, "式")?)?;

    for suffix in inner {
        expr = match suffix.as_rule() {
            Rule::member_suffix => {
                let mut parts = suffix.into_inner();
                let property = next_pair(&mut parts, "プロパティ名")?;
                Expr::Member {
                    object: Box::new(expr),
                    property: property.as_str().to_string(),
                }
            }
            Rule::index_suffix => {
                let mut parts = suffix.into_inner();
                let index = build_expression(next_pair(&mut parts, "インデックス")?)?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                }
            }
            rule => {
                return Err(ScriptError::Syntax(format!(
                    "予期しない後置要素です: {:?}",
                    rule
                )));
            }
        };
    }

    Ok(expr)
}

fn build_call(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let function = next_pair(&mut inner, "関数名")?.as_str().to_string();
    let args = inner.map(build_expression).collect::<ParseResult<Vec<_>>>()?;
    Ok(Expr::Call { function, args })
}

fn build_map(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut entries = Vec::new();
    for entry in pair.into_inner() {
        let mut parts = entry.into_inner();
        let key_pair = next_pair(&mut parts, "キー")?;
        let key = match key_pair.as_rule() {
            Rule::string => build_string(key_pair)?,
            _ => key_pair.as_str().to_string(),
        };
        let value = build_expression(next_pair(&mut parts, "値")?)?;
        entries.push((key, value));
    }
    Ok(Expr::Map(entries))
}

fn build_string(pair: Pair<Rule>) -> ParseResult<String> {
    let raw = pair
        .into_inner()
        .next()
        .map(|inner| inner.as_str())
        .unwrap_or_default();
    Ok(unescape(raw))
}

/// バックスラッシュエスケープを解除する（未知のエスケープは文字そのもの）
fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}
