use crate::location::SourceLocation;
use crate::token::{Token, TokenKind};

/// Saved cursor position, handed back by [`TokenStream::save_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPos(usize);

/// Sequential view over a token vector with lookahead, matching, and O(1)
/// position save/restore.
///
/// The stream guarantees a trailing `Eof` token: `peek` past the end keeps
/// returning it, so callers never deal with `Option`.
pub struct TokenStream {
    tokens: Vec<Token>,
    current: usize,
}

impl TokenStream {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let needs_eof = !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof);
        if needs_eof {
            let location = tokens
                .last()
                .map(|t| t.location.clone())
                .unwrap_or_else(|| SourceLocation::new("<input>", 1, 1));
            tokens.push(Token::eof(location));
        }
        TokenStream { tokens, current: 0 }
    }

    pub fn peek(&self) -> &Token {
        self.at(self.current)
    }

    pub fn peek_next(&self) -> &Token {
        self.at(self.current + 1)
    }

    /// The most recently consumed token. At the start of the stream this is
    /// the first token.
    pub fn previous(&self) -> &Token {
        self.at(self.current.saturating_sub(1))
    }

    /// Consume and return the current token. Stops at `Eof`.
    pub fn advance(&mut self) -> Token {
        let token = self.at(self.current).clone();
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Advance iff the current token has the given kind.
    pub fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|&k| self.check(k)) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn save_position(&self) -> StreamPos {
        StreamPos(self.current)
    }

    pub fn restore_position(&mut self, pos: StreamPos) {
        self.current = pos.0.min(self.tokens.len().saturating_sub(1));
    }

    fn at(&self, index: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[index.min(last)]
    }
}
