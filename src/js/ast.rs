//! JavaScript syntax tree produced by the recompiler.
//!
//! The tree only covers the constructs the generated code needs. It is
//! printed by [`super::printer::JsPrinter`].

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    BitAnd,
    BitOr,
    BitXor,
    /// `==`, only used for the null tests where `undefined` must match too.
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    InstanceOf,
    In,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Ushr => ">>>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LooseEq => "==",
            BinOp::LooseNe => "!=",
            BinOp::StrictEq => "===",
            BinOp::StrictNe => "!==",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::InstanceOf => "instanceof",
            BinOp::In => "in",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// Binding power, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinOp::Mul | BinOp::Div | BinOp::Rem => 13,
            BinOp::Add | BinOp::Sub => 12,
            BinOp::Shl | BinOp::Shr | BinOp::Ushr => 11,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::InstanceOf | BinOp::In => 10,
            BinOp::LooseEq | BinOp::LooseNe | BinOp::StrictEq | BinOp::StrictNe => 9,
            BinOp::BitAnd => 8,
            BinOp::BitXor => 7,
            BinOp::BitOr => 6,
            BinOp::And => 5,
            BinOp::Or => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    TypeOf,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::TypeOf => "typeof ",
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum JsExpr {
    /// Integer literal, printed exactly.
    Int(i64),
    /// Floating point literal.
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    This,
    /// `object.property`, or `object["property"]` when the name is not an identifier.
    Member {
        object: Box<JsExpr>,
        property: String,
    },
    /// `object[index]`.
    Index {
        object: Box<JsExpr>,
        index: Box<JsExpr>,
    },
    Call {
        callee: Box<JsExpr>,
        args: Vec<JsExpr>,
    },
    New {
        callee: Box<JsExpr>,
        args: Vec<JsExpr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<JsExpr>,
        rhs: Box<JsExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<JsExpr>,
    },
    Conditional {
        cond: Box<JsExpr>,
        then: Box<JsExpr>,
        otherwise: Box<JsExpr>,
    },
    Assign {
        target: Box<JsExpr>,
        value: Box<JsExpr>,
    },
    Array(Vec<JsExpr>),
    /// Object literal; only the empty form is generated today.
    Object(Vec<(String, JsExpr)>),
    Function {
        params: Vec<String>,
        body: Vec<JsStmt>,
    },
}

impl JsExpr {
    pub fn ident(name: impl Into<String>) -> Self {
        JsExpr::Ident(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        JsExpr::String(value.into())
    }

    pub fn member(self, property: impl Into<String>) -> Self {
        JsExpr::Member {
            object: Box::new(self),
            property: property.into(),
        }
    }

    pub fn index(self, index: JsExpr) -> Self {
        JsExpr::Index {
            object: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn call(self, args: Vec<JsExpr>) -> Self {
        JsExpr::Call {
            callee: Box::new(self),
            args,
        }
    }

    pub fn binary(op: BinOp, lhs: JsExpr, rhs: JsExpr) -> Self {
        JsExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: JsExpr) -> Self {
        JsExpr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn conditional(cond: JsExpr, then: JsExpr, otherwise: JsExpr) -> Self {
        JsExpr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn assign(target: JsExpr, value: JsExpr) -> Self {
        JsExpr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// True for expressions that can be duplicated or reordered freely:
    /// literals, identifiers, and `this`.
    pub fn is_trivial(&self) -> bool {
        matches!(
            self,
            JsExpr::Int(_)
                | JsExpr::Number(_)
                | JsExpr::String(_)
                | JsExpr::Bool(_)
                | JsExpr::Null
                | JsExpr::Undefined
                | JsExpr::Ident(_)
                | JsExpr::This
        )
    }

    /// Precedence of the expression's outermost operator.
    pub fn precedence(&self) -> u8 {
        match self {
            JsExpr::Function { .. } => 1,
            JsExpr::Assign { .. } => 2,
            JsExpr::Conditional { .. } => 3,
            JsExpr::Binary { op, .. } => op.precedence(),
            JsExpr::Unary { .. } => 15,
            JsExpr::Int(v) if *v < 0 => 15,
            JsExpr::Number(v) if v.is_sign_negative() && !v.is_nan() => 15,
            JsExpr::Member { .. } | JsExpr::Index { .. } | JsExpr::Call { .. } | JsExpr::New { .. } => 18,
            _ => 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCase {
    /// `None` is the `default` case.
    pub test: Option<JsExpr>,
    pub body: Vec<JsStmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JsStmt {
    Const {
        name: String,
        init: JsExpr,
    },
    Expr(JsExpr),
    Return(Option<JsExpr>),
    Throw(JsExpr),
    If {
        cond: JsExpr,
        then_body: Vec<JsStmt>,
        else_body: Vec<JsStmt>,
    },
    Switch {
        discriminant: JsExpr,
        cases: Vec<SwitchCase>,
    },
    /// `for (let var = 0; var < limit; var++) { body }`.
    CountedFor {
        var: String,
        limit: JsExpr,
        body: Vec<JsStmt>,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: Vec<JsStmt>,
    },
    Debugger,
    /// Verbatim source, one statement or declaration per line.
    Raw(String),
}

impl JsStmt {
    pub fn assign(target: JsExpr, value: JsExpr) -> Self {
        JsStmt::Expr(JsExpr::assign(target, value))
    }

    /// `throw new Error(message)`.
    pub fn throw_error(message: JsExpr) -> Self {
        JsStmt::Throw(JsExpr::New {
            callee: Box::new(JsExpr::ident("Error")),
            args: vec![message],
        })
    }
}
