use std::fmt;
use std::rc::Rc;

/// A position in a source file, carried by every token and AST node.
///
/// Locations are only used for diagnostics; they never influence
/// compilation results. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Rc<str>>, line: u32, column: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location for synthesized constructs (the implicit `main`, external
    /// stubs). Renders as `<builtin>:0:0`.
    pub fn builtin() -> Self {
        SourceLocation {
            file: "<builtin>".into(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
