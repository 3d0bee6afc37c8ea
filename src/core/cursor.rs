//! RB-002: Character cursor over recipe text.
//!
//! Tracks `(line, char)` so every parse failure can point at the exact
//! column that broke. Words are maximal runs of non-whitespace; whitespace
//! is spaces and tabs only.

use super::error::{ParseError, ParseErrorKind};

const WHITESPACE: [char; 2] = [' ', '\t'];

fn is_whitespace(c: char) -> bool {
    WHITESPACE.contains(&c)
}

/// Line/column cursor used by the recipe parser.
#[derive(Debug, Clone)]
pub struct Cursor {
    filename: String,
    lines: Vec<Vec<char>>,
    line_index: usize,
    index: usize,
}

impl Cursor {
    pub fn new(text: &str, filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            lines: text.split('\n').map(|l| l.chars().collect()).collect(),
            line_index: 0,
            index: 0,
        }
    }

    /// True once every line has been consumed.
    pub fn at_end(&self) -> bool {
        self.line_index >= self.lines.len()
    }

    /// 1-based line of the cursor.
    pub fn line(&self) -> usize {
        self.line_index + 1
    }

    /// 1-based column of the cursor.
    pub fn column(&self) -> usize {
        self.index + 1
    }

    fn current(&self) -> &[char] {
        self.lines
            .get(self.line_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn peek_char(&self, skip: usize) -> Option<char> {
        self.current().get(self.index + skip).copied()
    }

    pub fn take_char(&mut self) -> Option<char> {
        let c = self.peek_char(0)?;
        self.index += 1;
        Some(c)
    }

    pub fn take_chars(&mut self, count: usize) {
        self.index = (self.index + count).min(self.current().len());
    }

    /// The word starting at the cursor, without consuming it.
    pub fn peek_word(&self) -> Option<String> {
        let rest = self.current().get(self.index..).unwrap_or(&[]);
        let word: String = rest.iter().take_while(|c| !is_whitespace(**c)).collect();
        if word.is_empty() {
            None
        } else {
            Some(word)
        }
    }

    /// Consume and return the word at the cursor.
    pub fn take_word(&mut self, looking_for: &str) -> Result<String, ParseError> {
        let word = self
            .peek_word()
            .ok_or_else(|| self.syntax(format!("End of line while looking for {}", looking_for)))?;
        self.take_chars(word.chars().count());
        Ok(word)
    }

    /// Consume any run of spaces/tabs and return it.
    pub fn skip_whitespace(&mut self) -> String {
        let mut taken = String::new();
        while let Some(c) = self.peek_char(0).filter(|c| is_whitespace(*c)) {
            taken.push(c);
            self.index += 1;
        }
        taken
    }

    /// Like [`skip_whitespace`](Self::skip_whitespace) but at least one
    /// whitespace character must be present.
    pub fn require_whitespace(&mut self, looking_for: &str) -> Result<String, ParseError> {
        match self.peek_char(0) {
            None => Err(self.syntax(format!("End of line while looking for {}", looking_for))),
            Some(c) if !is_whitespace(c) => Err(self.syntax(format!(
                "Expecting whitespace before {}, got '{}'",
                looking_for, c
            ))),
            Some(_) => Ok(self.skip_whitespace()),
        }
    }

    /// Consume exactly `expected` or fail at the cursor.
    pub fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek_char(0) {
            None => Err(self.syntax(format!("End of line while looking for '{}'", expected))),
            Some(c) if c == expected => {
                self.index += 1;
                Ok(())
            }
            Some(c) => Err(self.syntax(format!("Expecting '{}', got '{}'", expected, c))),
        }
    }

    /// Consume the literal word `expected`, optionally preceded by
    /// mandatory whitespace.
    pub fn expect_word(&mut self, expected: &str, require_whitespace: bool) -> Result<(), ParseError> {
        let looking_for = format!("'{}'", expected);
        if require_whitespace {
            self.require_whitespace(&looking_for)?;
        } else {
            self.skip_whitespace();
        }
        match self.peek_word() {
            None => Err(self.syntax(format!("End of line while looking for {}", looking_for))),
            Some(word) if word == expected => {
                self.take_chars(word.chars().count());
                Ok(())
            }
            Some(word) => Err(self.syntax(format!("Expecting {}, got '{}'", looking_for, word))),
        }
    }

    /// Consume everything up to the end of the line.
    pub fn take_rest_of_line(&mut self) -> String {
        let rest: String = self.current().get(self.index..).unwrap_or(&[]).iter().collect();
        self.index = self.current().len();
        rest
    }

    /// Confirm nothing but whitespace remains, then move to the next line.
    pub fn finish_line(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace();
        if let Some(rest) = self.peek_word() {
            return Err(self.syntax(format!("Expecting the end of the line, got '{}'", rest)));
        }
        self.advance_line();
        Ok(())
    }

    /// Move to the start of the next line without checking the current one.
    pub fn advance_line(&mut self) {
        self.index = 0;
        self.line_index += 1;
    }

    /// Whitespace-only lines and `#` comment lines carry no instruction.
    pub fn is_blank_or_comment(&self) -> bool {
        match self.current().iter().find(|c| !is_whitespace(**c)) {
            None => true,
            Some(c) => *c == '#',
        }
    }

    pub fn error(&self, problem: impl Into<String>, kind: ParseErrorKind) -> ParseError {
        ParseError {
            filename: self.filename.clone(),
            line: self.line(),
            char: self.column(),
            problem: problem.into(),
            kind,
        }
    }

    pub fn syntax(&self, problem: impl Into<String>) -> ParseError {
        self.error(problem, ParseErrorKind::Syntax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rb002_words_and_whitespace() {
        let mut c = Cursor::new("merge  foo\tbar", "recipe");
        assert_eq!(c.peek_word().as_deref(), Some("merge"));
        assert_eq!(c.take_word("instruction").unwrap(), "merge");
        assert_eq!(c.require_whitespace("the branch id").unwrap(), "  ");
        assert_eq!(c.take_word("the branch id").unwrap(), "foo");
        assert_eq!(c.skip_whitespace(), "\t");
        assert_eq!(c.column(), 12);
        assert_eq!(c.take_rest_of_line(), "bar");
        assert!(c.peek_word().is_none());
    }

    #[test]
    fn test_rb002_expect_word_positions() {
        let mut c = Cursor::new("# builder aaaa", "recipe");
        c.expect_char('#').unwrap();
        c.expect_word("builder", false).unwrap();
        let err = c.expect_word("format", true).unwrap_err();
        assert_eq!((err.line, err.char), (1, 11));
        assert_eq!(err.problem, "Expecting 'format', got 'aaaa'");
    }

    #[test]
    fn test_rb002_require_whitespace_errors() {
        let mut c = Cursor::new("ab", "recipe");
        c.take_char();
        let err = c.require_whitespace("the url").unwrap_err();
        assert_eq!(err.problem, "Expecting whitespace before the url, got 'b'");
        assert_eq!(err.char, 2);
        c.take_char();
        let err = c.require_whitespace("the url").unwrap_err();
        assert_eq!(err.problem, "End of line while looking for the url");
        assert_eq!(err.char, 3);
    }

    #[test]
    fn test_rb002_finish_line_rejects_trailing_text() {
        let mut c = Cursor::new("http://foo.org/ foo\nnext", "recipe");
        c.take_word("branch").unwrap();
        let err = c.finish_line().unwrap_err();
        assert_eq!((err.line, err.char), (1, 17));
        assert_eq!(err.problem, "Expecting the end of the line, got 'foo'");
    }

    #[test]
    fn test_rb002_blank_and_comment_lines() {
        let mut c = Cursor::new("   \n  # note\nlp:foo\n", "recipe");
        assert!(c.is_blank_or_comment());
        c.advance_line();
        assert!(c.is_blank_or_comment());
        c.advance_line();
        assert!(!c.is_blank_or_comment());
        c.finish_line().unwrap_err();
        c.take_word("x").unwrap();
        c.finish_line().unwrap();
        assert!(c.is_blank_or_comment());
        c.advance_line();
        assert!(c.at_end());
    }

    #[test]
    fn test_rb002_counts_characters_not_bytes() {
        let mut c = Cursor::new("é x", "recipe");
        c.take_word("word").unwrap();
        assert_eq!(c.column(), 2);
    }
}
