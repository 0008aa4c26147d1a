use std::fmt;

use crate::location::SourceLocation;

/// Phase-qualified diagnostic code, e.g. `TC2001` or `CG3001`.
///
/// The letter prefix names the phase that produced the diagnostic; the
/// number's thousands digit is the shared category taxonomy: 1 general,
/// 2 type, 3 expression, 4 function, 5 variable, 6 memory, 7 I/O,
/// 8 optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagCode {
    pub prefix: &'static str,
    pub number: u16,
}

impl DiagCode {
    pub const fn new(prefix: &'static str, number: u16) -> Self {
        DiagCode { prefix, number }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

/// Diagnostic codes used across the pipeline.
pub mod codes {
    use super::DiagCode;

    // Lexer
    pub const LX_BAD_CHARACTER: DiagCode = DiagCode::new("LX", 1001);
    pub const LX_UNTERMINATED_STRING: DiagCode = DiagCode::new("LX", 1002);
    pub const LX_BAD_NUMBER: DiagCode = DiagCode::new("LX", 1003);
    pub const LX_UNTERMINATED_COMMENT: DiagCode = DiagCode::new("LX", 1004);
    pub const LX_UNKNOWN_ATTRIBUTE: DiagCode = DiagCode::new("LX", 1005);

    // Parser
    pub const PS_UNEXPECTED_TOKEN: DiagCode = DiagCode::new("PS", 1001);
    pub const PS_EXPECTED_EXPRESSION: DiagCode = DiagCode::new("PS", 3001);
    pub const PS_EXPECTED_TYPE: DiagCode = DiagCode::new("PS", 2001);
    pub const PS_CONST_WITHOUT_INIT: DiagCode = DiagCode::new("PS", 5001);
    pub const PS_TOO_MANY_ARGUMENTS: DiagCode = DiagCode::new("PS", 4001);

    // Type checker
    pub const TC_UNDEFINED_TYPE: DiagCode = DiagCode::new("TC", 2001);
    pub const TC_INVALID_CONVERSION: DiagCode = DiagCode::new("TC", 2002);
    pub const TC_MEMBER_NOT_FOUND: DiagCode = DiagCode::new("TC", 2003);
    pub const TC_INVALID_BINARY_OP: DiagCode = DiagCode::new("TC", 3001);
    pub const TC_INVALID_UNARY_OP: DiagCode = DiagCode::new("TC", 3002);
    pub const TC_INVALID_CAST: DiagCode = DiagCode::new("TC", 3003);
    pub const TC_BREAK_OUTSIDE_LOOP: DiagCode = DiagCode::new("TC", 3004);
    pub const TC_CONTINUE_OUTSIDE_LOOP: DiagCode = DiagCode::new("TC", 3005);
    pub const TC_NOT_CALLABLE: DiagCode = DiagCode::new("TC", 4001);
    pub const TC_ARITY_MISMATCH: DiagCode = DiagCode::new("TC", 4002);
    pub const TC_ARGUMENT_MISMATCH: DiagCode = DiagCode::new("TC", 4003);
    pub const TC_RETURN_MISMATCH: DiagCode = DiagCode::new("TC", 4004);
    pub const TC_UNDEFINED_VARIABLE: DiagCode = DiagCode::new("TC", 5001);
    pub const TC_BAD_DECLARATION: DiagCode = DiagCode::new("TC", 5002);

    // Lowering
    pub const CG_UNSUPPORTED: DiagCode = DiagCode::new("CG", 1001);
    pub const CG_INVALID_BINARY_OP: DiagCode = DiagCode::new("CG", 3001);
    pub const CG_NOT_AN_LVALUE: DiagCode = DiagCode::new("CG", 3002);
    pub const CG_FUNCTION_NOT_FOUND: DiagCode = DiagCode::new("CG", 4001);
    pub const CG_ARITY_MISMATCH: DiagCode = DiagCode::new("CG", 4002);
    pub const CG_UNDEFINED_VARIABLE: DiagCode = DiagCode::new("CG", 5001);
    pub const CG_FREE_VARIABLE: DiagCode = DiagCode::new("CG", 5002);
    pub const CG_EMPTY_ASM: DiagCode = DiagCode::new("CG", 3003);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single structured diagnostic. Transport to the user is the host's
/// concern; `Display` provides the conventional one-line rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
    pub code: Option<DiagCode>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.code {
            Some(code) => write!(
                f,
                "{}: {}[{}]: {}",
                self.location, severity, code, self.message
            ),
            None => write!(f, "{}: {}: {}", self.location, severity, self.message),
        }
    }
}

/// Collects diagnostics across all phases of one compiler invocation.
///
/// Append-only during a run; diagnostics come out in insertion order, which
/// is source order within a phase and phase order across phases.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Severity::Error, location, message.into(), None);
    }

    pub fn error_with_code(
        &mut self,
        location: SourceLocation,
        message: impl Into<String>,
        code: DiagCode,
    ) {
        self.push(Severity::Error, location, message.into(), Some(code));
    }

    pub fn warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(Severity::Warning, location, message.into(), None);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
    }

    fn push(
        &mut self,
        severity: Severity,
        location: SourceLocation,
        message: String,
        code: Option<DiagCode>,
    ) {
        if severity == Severity::Error {
            self.error_count += 1;
        }
        self.diagnostics.push(Diagnostic {
            severity,
            location,
            message,
            code,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.tsl", 2, 5)
    }

    #[test]
    fn counts_errors_but_not_warnings() {
        let mut reporter = Reporter::new();
        reporter.warning(loc(), "iffy");
        assert!(!reporter.has_errors());
        reporter.error(loc(), "broken");
        reporter.error_with_code(loc(), "typed", codes::TC_INVALID_CONVERSION);
        assert!(reporter.has_errors());
        assert_eq!(reporter.error_count(), 2);
        assert_eq!(reporter.diagnostics().len(), 3);
    }

    #[test]
    fn renders_code_and_location() {
        let mut reporter = Reporter::new();
        reporter.error_with_code(loc(), "cannot assign string to int", codes::TC_INVALID_CONVERSION);
        let line = reporter.diagnostics()[0].to_string();
        assert_eq!(line, "t.tsl:2:5: error[TC2002]: cannot assign string to int");
    }

    #[test]
    fn clear_resets_state() {
        let mut reporter = Reporter::new();
        reporter.error(loc(), "broken");
        reporter.clear();
        assert!(!reporter.has_errors());
        assert!(reporter.diagnostics().is_empty());
    }
}
