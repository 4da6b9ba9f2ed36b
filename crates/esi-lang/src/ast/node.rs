use std::rc::Rc;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::{Ident, range::Range};

type Loc = Option<Range>;

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub loc: Loc,
}

/// A node that carries nothing but its location (`EmptyStatement`, `ThisExpression`, ...).
#[derive(PartialEq, Debug, Clone, Default, Deserialize)]
pub struct Leaf {
    #[serde(default)]
    pub loc: Loc,
}

/// A node kind that decodes but has no evaluation rule.
#[derive(PartialEq, Debug, Clone, Default, Deserialize)]
pub struct Unsupported {
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    ExpressionStatement(ExpressionStatement),
    BlockStatement(BlockStatement),
    EmptyStatement(Leaf),
    DebuggerStatement(Leaf),
    ReturnStatement(ReturnStatement),
    BreakStatement(JumpStatement),
    ContinueStatement(JumpStatement),
    LabeledStatement(LabeledStatement),
    IfStatement(IfStatement),
    SwitchStatement(SwitchStatement),
    ThrowStatement(ThrowStatement),
    TryStatement(TryStatement),
    WhileStatement(WhileStatement),
    DoWhileStatement(WhileStatement),
    ForStatement(ForStatement),
    ForInStatement(ForEachStatement),
    ForOfStatement(ForEachStatement),
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<Function>),
    ClassDeclaration(Unsupported),
    WithStatement(Unsupported),
    ImportDeclaration(Unsupported),
    ExportNamedDeclaration(Unsupported),
    ExportDefaultDeclaration(Unsupported),
    ExportAllDeclaration(Unsupported),
}

impl Statement {
    pub fn loc(&self) -> Loc {
        match self {
            Statement::ExpressionStatement(s) => s.loc,
            Statement::BlockStatement(s) => s.loc,
            Statement::EmptyStatement(s) | Statement::DebuggerStatement(s) => s.loc,
            Statement::ReturnStatement(s) => s.loc,
            Statement::BreakStatement(s) | Statement::ContinueStatement(s) => s.loc,
            Statement::LabeledStatement(s) => s.loc,
            Statement::IfStatement(s) => s.loc,
            Statement::SwitchStatement(s) => s.loc,
            Statement::ThrowStatement(s) => s.loc,
            Statement::TryStatement(s) => s.loc,
            Statement::WhileStatement(s) | Statement::DoWhileStatement(s) => s.loc,
            Statement::ForStatement(s) => s.loc,
            Statement::ForInStatement(s) | Statement::ForOfStatement(s) => s.loc,
            Statement::VariableDeclaration(s) => s.loc,
            Statement::FunctionDeclaration(f) => f.loc,
            Statement::ClassDeclaration(s)
            | Statement::WithStatement(s)
            | Statement::ImportDeclaration(s)
            | Statement::ExportNamedDeclaration(s)
            | Statement::ExportDefaultDeclaration(s)
            | Statement::ExportAllDeclaration(s) => s.loc,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Default, Deserialize)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ReturnStatement {
    pub argument: Option<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct JumpStatement {
    #[serde(default)]
    pub label: Option<Identifier>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct LabeledStatement {
    pub label: Identifier,
    pub body: Box<Statement>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    #[serde(default)]
    pub alternate: Option<Box<Statement>>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct SwitchCase {
    /// `None` marks the `default` clause.
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ThrowStatement {
    pub argument: Expression,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct TryStatement {
    pub block: BlockStatement,
    #[serde(default)]
    pub handler: Option<CatchClause>,
    #[serde(default)]
    pub finalizer: Option<BlockStatement>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub param: Option<Pattern>,
    pub body: BlockStatement,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ForInit {
    VariableDeclaration(VariableDeclaration),
    Expression(Expression),
}

/// `for (left in right)` and `for (left of right)`.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ForEachStatement {
    pub left: ForHead,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default, rename = "await")]
    pub is_await: bool,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ForHead {
    VariableDeclaration(VariableDeclaration),
    Pattern(Pattern),
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
}

impl std::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclarationKind::Var => write!(f, "var"),
            DeclarationKind::Let => write!(f, "let"),
            DeclarationKind::Const => write!(f, "const"),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct VariableDeclaration {
    pub kind: DeclarationKind,
    pub declarations: Vec<VariableDeclarator>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct VariableDeclarator {
    pub id: Pattern,
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

/// Shared shape of function declarations, function expressions and arrows.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Function {
    #[serde(default)]
    pub id: Option<Identifier>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    #[serde(default)]
    pub generator: bool,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub loc: Loc,
}

impl Function {
    pub fn name(&self) -> Option<Ident> {
        self.id.as_ref().map(|id| id.name)
    }
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FunctionBody {
    Block(BlockStatement),
    Expression(Box<Expression>),
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Identifier {
    pub name: Ident,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Literal {
    #[serde(default)]
    pub value: Option<LiteralValue>,
    #[serde(default)]
    pub regex: Option<serde_json::Value>,
    #[serde(default)]
    pub bigint: Option<String>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Number(f64),
    String(SmolStr),
    /// Values a JSON encoder cannot express faithfully (a `RegExp` becomes `{}`).
    Other(serde_json::Value),
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct TemplateLiteral {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct TemplateElement {
    pub value: TemplateElementValue,
    #[serde(default)]
    pub tail: bool,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct TemplateElementValue {
    #[serde(default)]
    pub cooked: Option<String>,
    pub raw: String,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    Identifier(Identifier),
    Literal(Literal),
    TemplateLiteral(TemplateLiteral),
    ThisExpression(Leaf),
    ArrayExpression(ArrayExpression),
    ObjectExpression(ObjectExpression),
    FunctionExpression(Rc<Function>),
    ArrowFunctionExpression(Rc<Function>),
    UnaryExpression(UnaryExpression),
    UpdateExpression(UpdateExpression),
    BinaryExpression(BinaryExpression),
    LogicalExpression(LogicalExpression),
    AssignmentExpression(AssignmentExpression),
    MemberExpression(MemberExpression),
    ChainExpression(ChainExpression),
    ConditionalExpression(ConditionalExpression),
    CallExpression(CallExpression),
    NewExpression(CallExpression),
    SequenceExpression(SequenceExpression),
    SpreadElement(SpreadElement),
    ClassExpression(Unsupported),
    YieldExpression(Unsupported),
    AwaitExpression(Unsupported),
    TaggedTemplateExpression(Unsupported),
    MetaProperty(Unsupported),
    Super(Unsupported),
    ImportExpression(Unsupported),
    PrivateIdentifier(Unsupported),
}

impl Expression {
    pub fn loc(&self) -> Loc {
        match self {
            Expression::Identifier(e) => e.loc,
            Expression::Literal(e) => e.loc,
            Expression::TemplateLiteral(e) => e.loc,
            Expression::ThisExpression(e) => e.loc,
            Expression::ArrayExpression(e) => e.loc,
            Expression::ObjectExpression(e) => e.loc,
            Expression::FunctionExpression(f) | Expression::ArrowFunctionExpression(f) => f.loc,
            Expression::UnaryExpression(e) => e.loc,
            Expression::UpdateExpression(e) => e.loc,
            Expression::BinaryExpression(e) => e.loc,
            Expression::LogicalExpression(e) => e.loc,
            Expression::AssignmentExpression(e) => e.loc,
            Expression::MemberExpression(e) => e.loc,
            Expression::ChainExpression(e) => e.loc,
            Expression::ConditionalExpression(e) => e.loc,
            Expression::CallExpression(e) | Expression::NewExpression(e) => e.loc,
            Expression::SequenceExpression(e) => e.loc,
            Expression::SpreadElement(e) => e.loc,
            Expression::ClassExpression(e)
            | Expression::YieldExpression(e)
            | Expression::AwaitExpression(e)
            | Expression::TaggedTemplateExpression(e)
            | Expression::MetaProperty(e)
            | Expression::Super(e)
            | Expression::ImportExpression(e)
            | Expression::PrivateIdentifier(e) => e.loc,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ArrayExpression {
    /// `None` entries are holes (`[1, , 3]`).
    pub elements: Vec<Option<Expression>>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectMember>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectMember {
    Property(Property),
    SpreadElement(SpreadElement),
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Property {
    pub key: Expression,
    pub value: Expression,
    pub kind: PropertyKind,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub method: bool,
    #[serde(default)]
    pub shorthand: bool,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct SpreadElement {
    pub argument: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize)]
pub enum UnaryOperator {
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "typeof")]
    TypeOf,
    #[serde(rename = "void")]
    Void,
    #[serde(rename = "delete")]
    Delete,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub argument: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize)]
pub enum UpdateOperator {
    #[serde(rename = "++")]
    Increment,
    #[serde(rename = "--")]
    Decrement,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct UpdateExpression {
    pub operator: UpdateOperator,
    pub prefix: bool,
    pub argument: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    StrictNotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<<")]
    Shl,
    #[serde(rename = ">>")]
    Shr,
    #[serde(rename = ">>>")]
    UShr,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Rem,
    #[serde(rename = "**")]
    Exp,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "instanceof")]
    InstanceOf,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "??")]
    Coalesce,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Deserialize)]
pub enum AssignmentOperator {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Sub,
    #[serde(rename = "*=")]
    Mul,
    #[serde(rename = "/=")]
    Div,
    #[serde(rename = "%=")]
    Rem,
    #[serde(rename = "**=")]
    Exp,
    #[serde(rename = "<<=")]
    Shl,
    #[serde(rename = ">>=")]
    Shr,
    #[serde(rename = ">>>=")]
    UShr,
    #[serde(rename = "|=")]
    BitOr,
    #[serde(rename = "^=")]
    BitXor,
    #[serde(rename = "&=")]
    BitAnd,
    #[serde(rename = "&&=")]
    And,
    #[serde(rename = "||=")]
    Or,
    #[serde(rename = "??=")]
    Coalesce,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies, `None` for `=` and the
    /// short-circuiting logical forms.
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Add => Some(BinaryOperator::Add),
            AssignmentOperator::Sub => Some(BinaryOperator::Sub),
            AssignmentOperator::Mul => Some(BinaryOperator::Mul),
            AssignmentOperator::Div => Some(BinaryOperator::Div),
            AssignmentOperator::Rem => Some(BinaryOperator::Rem),
            AssignmentOperator::Exp => Some(BinaryOperator::Exp),
            AssignmentOperator::Shl => Some(BinaryOperator::Shl),
            AssignmentOperator::Shr => Some(BinaryOperator::Shr),
            AssignmentOperator::UShr => Some(BinaryOperator::UShr),
            AssignmentOperator::BitOr => Some(BinaryOperator::BitOr),
            AssignmentOperator::BitXor => Some(BinaryOperator::BitXor),
            AssignmentOperator::BitAnd => Some(BinaryOperator::BitAnd),
            AssignmentOperator::Assign
            | AssignmentOperator::And
            | AssignmentOperator::Or
            | AssignmentOperator::Coalesce => None,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct AssignmentExpression {
    pub operator: AssignmentOperator,
    pub left: Pattern,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: Box<Expression>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ChainExpression {
    pub expression: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    Identifier(Identifier),
    MemberExpression(MemberExpression),
    ObjectPattern(ObjectPattern),
    ArrayPattern(ArrayPattern),
    AssignmentPattern(AssignmentPattern),
    RestElement(RestElement),
}

impl Pattern {
    pub fn loc(&self) -> Loc {
        match self {
            Pattern::Identifier(p) => p.loc,
            Pattern::MemberExpression(p) => p.loc,
            Pattern::ObjectPattern(p) => p.loc,
            Pattern::ArrayPattern(p) => p.loc,
            Pattern::AssignmentPattern(p) => p.loc,
            Pattern::RestElement(p) => p.loc,
        }
    }

    /// Every name this pattern binds, in source order.
    pub fn bound_names(&self) -> Vec<Ident> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<Ident>) {
        match self {
            Pattern::Identifier(id) => names.push(id.name),
            Pattern::MemberExpression(_) => {}
            Pattern::ObjectPattern(p) => p.properties.iter().for_each(|prop| match prop {
                ObjectPatternMember::Property(prop) => prop.value.collect_names(names),
                ObjectPatternMember::RestElement(rest) => rest.argument.collect_names(names),
            }),
            Pattern::ArrayPattern(p) => p
                .elements
                .iter()
                .flatten()
                .for_each(|element| element.collect_names(names)),
            Pattern::AssignmentPattern(p) => p.left.collect_names(names),
            Pattern::RestElement(p) => p.argument.collect_names(names),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ObjectPattern {
    pub properties: Vec<ObjectPatternMember>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectPatternMember {
    Property(PatternProperty),
    RestElement(RestElement),
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct PatternProperty {
    pub key: Expression,
    pub value: Pattern,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct ArrayPattern {
    pub elements: Vec<Option<Pattern>>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct AssignmentPattern {
    pub left: Box<Pattern>,
    pub right: Box<Expression>,
    #[serde(default)]
    pub loc: Loc,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct RestElement {
    pub argument: Box<Pattern>,
    #[serde(default)]
    pub loc: Loc,
}
