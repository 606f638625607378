//! The zone-file tokenizer.
//!
//! The lexical structure of a zone file is plain: `;` starts a comment
//! running to the end of the line, everything else is whitespace-
//! separated words. The tokenizer keeps the line number of every word
//! for error reporting.

//------------ Tokens --------------------------------------------------------

/// The token stream of a zone file.
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    items: Vec<Item<'a>>,
    pos: usize,
}

#[derive(Clone, Copy, Debug)]
struct Item<'a> {
    line: usize,
    text: &'a str,
}

impl<'a> Tokens<'a> {
    /// Tokenizes an input, stripping comments.
    pub fn new(input: &'a str) -> Self {
        let mut items = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            let line_no_comment =
                line.split(';').next().unwrap_or_default();
            for word in line_no_comment.split_whitespace() {
                items.push(Item {
                    line: idx + 1,
                    text: word,
                });
            }
        }
        Tokens { items, pos: 0 }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&self) -> Option<&'a str> {
        self.peek_at(0)
    }

    /// Returns the token `n` positions ahead without consuming.
    pub fn peek_at(&self, n: usize) -> Option<&'a str> {
        self.items.get(self.pos + n).map(|item| item.text)
    }

    /// Consumes and returns the next token.
    pub fn next(&mut self) -> Option<&'a str> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item.text)
    }

    /// Returns the line of the next token, or of the last one at the
    /// end of input.
    pub fn line(&self) -> usize {
        self.items
            .get(self.pos.min(self.items.len().saturating_sub(1)))
            .map(|item| item.line)
            .unwrap_or(0)
    }

    /// Returns whether the stream is exhausted.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    /// Skips tokens until one of `stops` or the end of input.
    pub fn skip_until(&mut self, stops: &[&str]) {
        while let Some(token) = self.peek() {
            if stops.contains(&token) {
                break;
            }
            self.pos += 1;
        }
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn comments_and_whitespace() {
        let mut tokens = Tokens::new(
            ":A: ethz ; this is a comment\n\n\t:S:  aaa\tzzz ; more",
        );
        assert_eq!(tokens.peek(), Some(":A:"));
        assert_eq!(tokens.next(), Some(":A:"));
        assert_eq!(tokens.line(), 1);
        assert_eq!(tokens.next(), Some("ethz"));
        assert_eq!(tokens.next(), Some(":S:"));
        assert_eq!(tokens.line(), 3);
        assert_eq!(tokens.next(), Some("aaa"));
        assert_eq!(tokens.next(), Some("zzz"));
        assert_eq!(tokens.next(), None);
        assert!(tokens.is_at_end());
    }

    #[test]
    fn lookahead_and_skip() {
        let mut tokens = Tokens::new("a b c :A: d");
        assert_eq!(tokens.peek_at(2), Some("c"));
        tokens.skip_until(&[":A:"]);
        assert_eq!(tokens.next(), Some(":A:"));
        tokens.skip_until(&[":Z:"]);
        assert!(tokens.is_at_end());
    }
}
