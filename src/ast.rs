use crate::location::SourceLocation;
use crate::token::TokenKind;

/// A parsed compilation unit: declarations and statements in source order.
/// Top-level statements are legal; the lowerer folds them into `main`.
#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Decl(Decl),
    Stmt(Stmt),
}

impl Item {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Item::Decl(d) => d.location(),
            Item::Stmt(s) => s.location(),
        }
    }
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessModifier {
    Public,
    Private,
    Protected,
}

/// Storage-class attribute on a variable (`#stack`, `#heap`, `#static`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Auto,
    Stack,
    Heap,
    Static,
}

#[derive(Debug, Clone)]
pub struct GenericParam {
    pub name: String,
    pub constraints: Vec<TypeExpr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub default_value: Option<Expr>,
    pub is_ref: bool,
    pub is_const: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Var(VarDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    Namespace(NamespaceDecl),
    Typedef(TypedefDecl),
}

impl Decl {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Decl::Var(d) => &d.location,
            Decl::Function(d) => &d.location,
            Decl::Class(d) => &d.location,
            Decl::Interface(d) => &d.location,
            Decl::Enum(d) => &d.location,
            Decl::Namespace(d) => &d.location,
            Decl::Typedef(d) => &d.location,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Decl::Var(d) => &d.name,
            Decl::Function(d) => &d.name,
            Decl::Class(d) => &d.name,
            Decl::Interface(d) => &d.name,
            Decl::Enum(d) => &d.name,
            Decl::Namespace(d) => &d.name,
            Decl::Typedef(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub is_const: bool,
    pub storage: StorageClass,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub generic_params: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub throws: Vec<TypeExpr>,
    pub modifiers: Vec<TokenKind>,
    pub body: Option<Block>,
    pub location: SourceLocation,
}

impl FunctionDecl {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub generic_params: Vec<GenericParam>,
    pub base_class: Option<TypeExpr>,
    pub interfaces: Vec<TypeExpr>,
    pub modifiers: Vec<TokenKind>,
    pub members: Vec<ClassMember>,
    pub location: SourceLocation,
}

impl ClassDecl {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Property(PropertyDecl),
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub is_const: bool,
    pub access: AccessModifier,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub access: AccessModifier,
    pub modifiers: Vec<TokenKind>,
    pub body: Option<Block>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub access: AccessModifier,
    pub body: Option<Block>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Get,
    Set,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub kind: PropertyKind,
    pub ty: TypeExpr,
    /// The value parameter of a setter; `None` for getters.
    pub param: Option<Param>,
    pub access: AccessModifier,
    pub body: Option<Block>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub generic_params: Vec<GenericParam>,
    pub extends: Vec<TypeExpr>,
    pub is_zerocast: bool,
    pub members: Vec<InterfaceMember>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum InterfaceMember {
    Method(MethodSignature),
    Property(PropertySignature),
}

#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct PropertySignature {
    pub name: String,
    pub ty: TypeExpr,
    pub has_getter: bool,
    pub has_setter: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub underlying_type: Option<TypeExpr>,
    pub members: Vec<EnumMember>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub name: String,
    pub declarations: Vec<Decl>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TypedefDecl {
    pub name: String,
    pub aliased: TypeExpr,
    pub location: SourceLocation,
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    Expr(ExprStmt),
    Decl(DeclStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    ForOf(ForOfStmt),
    Break(SourceLocation),
    Continue(SourceLocation),
    Return(ReturnStmt),
    Try(TryStmt),
    Throw(ThrowStmt),
    Switch(SwitchStmt),
    Labeled(LabeledStmt),
    Assembly(AssemblyStmt),
}

impl Stmt {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::Block(b) => &b.location,
            Stmt::Expr(s) => &s.location,
            Stmt::Decl(s) => &s.location,
            Stmt::If(s) => &s.location,
            Stmt::While(s) => &s.location,
            Stmt::DoWhile(s) => &s.location,
            Stmt::For(s) => &s.location,
            Stmt::ForOf(s) => &s.location,
            Stmt::Break(loc) | Stmt::Continue(loc) => loc,
            Stmt::Return(s) => &s.location,
            Stmt::Try(s) => &s.location,
            Stmt::Throw(s) => &s.location,
            Stmt::Switch(s) => &s.location,
            Stmt::Labeled(s) => &s.location,
            Stmt::Assembly(s) => &s.location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct DeclStmt {
    pub decl: Decl,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub condition: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub initializer: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub increment: Option<Expr>,
    pub body: Box<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ForOfStmt {
    pub binding: String,
    pub binding_is_const: bool,
    pub binding_type: Option<TypeExpr>,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: String,
    pub param_type: Option<TypeExpr>,
    pub body: Block,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub try_block: Block,
    pub catch_clauses: Vec<CatchClause>,
    pub finally_block: Option<Block>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub value: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}

impl SwitchCase {
    pub fn is_default(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub scrutinee: Expr,
    pub cases: Vec<SwitchCase>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct LabeledStmt {
    pub label: String,
    pub statement: Box<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct AssemblyStmt {
    pub code: String,
    pub location: SourceLocation,
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    String,
    Bool,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileTimeOp {
    Sizeof,
    Alignof,
    Typeof,
    ConstExpr,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(LiteralExpr),
    Identifier(IdentifierExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Assignment(AssignmentExpr),
    Conditional(ConditionalExpr),
    Call(CallExpr),
    Member(MemberExpr),
    Index(IndexExpr),
    ArrayLiteral(ArrayLiteralExpr),
    This(SourceLocation),
    New(NewExpr),
    Cast(CastExpr),
    CompileTime(CompileTimeExpr),
    PointerOf(PointerOfExpr),
    Function(FunctionExpr),
}

impl Expr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::Literal(e) => &e.location,
            Expr::Identifier(e) => &e.location,
            Expr::Binary(e) => &e.location,
            Expr::Unary(e) => &e.location,
            Expr::Assignment(e) => &e.location,
            Expr::Conditional(e) => &e.location,
            Expr::Call(e) => &e.location,
            Expr::Member(e) => &e.location,
            Expr::Index(e) => &e.location,
            Expr::ArrayLiteral(e) => &e.location,
            Expr::This(loc) => loc,
            Expr::New(e) => &e.location,
            Expr::Cast(e) => &e.location,
            Expr::CompileTime(e) => &e.location,
            Expr::PointerOf(e) => &e.location,
            Expr::Function(e) => &e.location,
        }
    }

}

#[derive(Debug, Clone)]
pub struct LiteralExpr {
    pub kind: LiteralKind,
    pub text: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct IdentifierExpr {
    pub name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: TokenKind,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: TokenKind,
    pub operand: Box<Expr>,
    pub prefix: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct AssignmentExpr {
    pub op: TokenKind,
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpr {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub arguments: Vec<Expr>,
    pub type_arguments: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub member: String,
    /// `@member` (pointer access) rather than `.member`.
    pub through_pointer: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct IndexExpr {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ArrayLiteralExpr {
    pub elements: Vec<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct NewExpr {
    pub class_name: String,
    pub arguments: Vec<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct CastExpr {
    pub target_type: TypeExpr,
    pub expr: Box<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct CompileTimeExpr {
    pub op: CompileTimeOp,
    pub operand: Box<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct PointerOfExpr {
    pub operand: Box<Expr>,
    pub is_unsafe: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct FunctionExpr {
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub location: SourceLocation,
}

// ---------------------------------------------------------------------
// Type expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartPtrKind {
    Shared,
    Unique,
    Weak,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerQualifier {
    Default,
    Unsafe,
    Aligned(u64),
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Primitive(PrimitiveType),
    Named(NamedType),
    Qualified(QualifiedType),
    Array(ArrayType),
    Pointer(PointerType),
    Reference(ReferenceType),
    Function(FunctionType),
    Template(TemplateType),
    Smart(SmartType),
    Union(UnionType),
    BuiltinConstraint(BuiltinConstraintType),
}

impl TypeExpr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            TypeExpr::Primitive(t) => &t.location,
            TypeExpr::Named(t) => &t.location,
            TypeExpr::Qualified(t) => &t.location,
            TypeExpr::Array(t) => &t.location,
            TypeExpr::Pointer(t) => &t.location,
            TypeExpr::Reference(t) => &t.location,
            TypeExpr::Function(t) => &t.location,
            TypeExpr::Template(t) => &t.location,
            TypeExpr::Smart(t) => &t.location,
            TypeExpr::Union(t) => &t.location,
            TypeExpr::BuiltinConstraint(t) => &t.location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrimitiveType {
    pub keyword: TokenKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct NamedType {
    pub name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct QualifiedType {
    pub segments: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ArrayType {
    pub element: Box<TypeExpr>,
    pub size: Option<Box<Expr>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct PointerType {
    pub base: Box<TypeExpr>,
    pub qualifier: PointerQualifier,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ReferenceType {
    pub base: Box<TypeExpr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub params: Vec<TypeExpr>,
    pub return_type: Box<TypeExpr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TemplateType {
    pub base: Box<TypeExpr>,
    pub arguments: Vec<TypeExpr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct SmartType {
    pub kind: SmartPtrKind,
    pub pointee: Box<TypeExpr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub left: Box<TypeExpr>,
    pub right: Box<TypeExpr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct BuiltinConstraintType {
    pub name: String,
    pub location: SourceLocation,
}
