//! 構文木

use super::value::Value;

/// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// 単項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// 式
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Ident(String),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// 関数呼び出し（呼び出せるのは名前付きの関数のみ）
    Call {
        function: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

impl Expr {
    /// 式中の識別子（変数参照と関数名）を出現順に訪問する
    pub fn visit_names<'a>(&'a self, visit: &mut dyn FnMut(NameRef<'a>)) {
        match self {
            Expr::Literal(_) => {}
            Expr::List(items) => items.iter().for_each(|item| item.visit_names(visit)),
            Expr::Map(entries) => entries
                .iter()
                .for_each(|(_, value)| value.visit_names(visit)),
            Expr::Ident(name) => visit(NameRef::Variable(name)),
            Expr::Member { object, .. } => object.visit_names(visit),
            Expr::Index { object, index } => {
                object.visit_names(visit);
                index.visit_names(visit);
            }
            Expr::Call { function, args } => {
                visit(NameRef::Function(function));
                args.iter().for_each(|arg| arg.visit_names(visit));
            }
            Expr::Unary { operand, .. } => operand.visit_names(visit),
            Expr::Binary { left, right, .. } => {
                left.visit_names(visit);
                right.visit_names(visit);
            }
            Expr::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                condition.visit_names(visit);
                consequent.visit_names(visit);
                alternate.visit_names(visit);
            }
        }
    }
}

/// 式中で参照される名前
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRef<'a> {
    Variable(&'a str),
    Function(&'a str),
}
