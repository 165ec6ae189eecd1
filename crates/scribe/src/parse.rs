//! The parsing front end: source text to node lists.
//!
//! The syntax is plain text interleaved with `$name` macro calls, `[`…`]`
//! argument groups, `` ` `` escapes and `#` comments, plus typographic
//! shorthands (`--`, `...`, `«`, `!?` runs and friends) that lex directly
//! into macro-call tokens. `$$whitespace.preserve` and `$$whitespace.skip`
//! switch how whitespace around newlines is tokenized.
//!
//! Everything is hand-rolled: a scanner producing a flat token stream, then
//! a small recursive-descent pass grouping bracketed arguments.

use std::rc::Rc;

use crate::error::FatalError;
use crate::node::{CallNode, Location, Node, NodeList, SourceName, TextNode};

/// Parses a whole source file into a node list.
///
/// Line endings are normalized to `\n` first; surrounding whitespace is
/// stripped from the input.
pub fn parse_text(input: &str, source: Rc<SourceName>) -> Result<NodeList, FatalError> {
    let tokens = Lexer::new(input, Rc::clone(&source)).lex()?;
    Parser {
        tokens,
        pos: 0,
        source,
    }
    .parse()
}

/// Whether `name` may be defined or called as a macro. Multi-character names
/// start with a letter, continue with letters, digits, `_` and `.`, and do
/// not end with a period; `_`, `-` and `\` are valid on their own.
pub fn is_valid_macro_name(name: &str) -> bool {
    let chars: Vec<char> = name.chars().collect();
    match chars.len() {
        0 => false,
        1 => chars[0].is_ascii_alphabetic() || matches!(chars[0], '_' | '-' | '\\'),
        len => {
            chars[0].is_ascii_alphabetic()
                && (chars[len - 1].is_ascii_alphanumeric() || chars[len - 1] == '_')
                && chars.iter().all(|c| is_name_char(*c))
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

/// Whitespace as far as input stripping and bracket rules are concerned.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c')
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

#[derive(Debug)]
enum Token {
    Text { line: u32, text: String },
    Macro { line: u32, name: String },
    LBracket { line: u32 },
    /// Keeps the matched text (with any swallowed whitespace) for syntax
    /// error messages.
    RBracket { line: u32, text: String },
}

/// One scanner rule match; `usize` fields are char indices.
enum Rule {
    Comment,
    Escape(char),
    LBracket,
    RBracket,
    PreProc(String),
    Macro(String),
    MacroInvalid(String),
    /// A shorthand character lexing as a zero-argument macro call.
    Shorthand(&'static str),
    /// An overlong shorthand run (`----`, `....`, `<<<`…) kept literal.
    Literal(String),
    DoublePunctuation(String),
}

struct Lexer {
    chars: Vec<char>,
    source: Rc<SourceName>,
    line: u32,
    /// Drop spaces and tabs at the start of the next text run.
    skip_spaces: bool,
    /// Current whitespace mode; starts in preserve.
    preserve: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(input: &str, source: Rc<SourceName>) -> Lexer {
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
        let all: Vec<char> = normalized.chars().collect();

        // Strip surrounding whitespace; the first line number accounts for
        // stripped leading newlines.
        let mut start = 0;
        while start < all.len() && is_space(all[start]) {
            start += 1;
        }
        let line = 1 + all[..start].iter().filter(|c| **c == '\n').count() as u32;
        let mut end = all.len();
        while end > start && is_space(all[end - 1]) {
            end -= 1;
        }
        let stripped_first = if end < all.len() { Some(all[end]) } else { None };
        let mut chars: Vec<char> = all[start..end].to_vec();

        // A trailing backtick escapes the whitespace that was just stripped;
        // with nothing to escape, an unpaired one is dropped.
        if chars.last() == Some(&'`') {
            let run = chars.iter().rev().take_while(|c| **c == '`').count();
            if let Some(space) = stripped_first {
                chars.push(space);
            } else if run % 2 == 1 {
                chars.pop();
            }
        }

        Lexer {
            chars,
            source,
            line,
            skip_spaces: true,
            preserve: true,
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, FatalError> {
        let mut pos = 0;
        let mut text_start = 0;
        while pos < self.chars.len() {
            match self.find_rule(pos) {
                Some((end, rule)) => {
                    self.process_text(text_start, pos);
                    self.apply_rule(rule, pos, end)?;
                    pos = end;
                    text_start = end;
                }
                None => pos += 1,
            }
        }
        self.process_text(text_start, self.chars.len());
        Ok(merge_text_tokens(self.tokens))
    }

    /// Tries to match a rule at `pos`; returns the end position and the rule.
    fn find_rule(&self, pos: usize) -> Option<(usize, Rule)> {
        let chars = &self.chars;
        let len = chars.len();
        match chars[pos] {
            '&' => Some((pos + 1, Rule::Shorthand("text.ampersand"))),
            '\'' => Some((pos + 1, Rule::Shorthand("text.apostrophe"))),
            '%' => Some((pos + 1, Rule::Shorthand("text.percent"))),
            '_' => Some((pos + 1, Rule::Shorthand("text.underscore"))),
            '~' => Some((pos + 1, Rule::Shorthand("text.nbsp"))),
            // A comment may start at the blanks preceding its `#`.
            ' ' | '\t' | '#' => self.try_comment(pos).or_else(|| self.try_rbracket(pos)),
            '\n' | '\x0b' | '\x0c' => self.try_rbracket(pos),
            '-' => {
                let end = run_end(chars, pos, '-');
                match end - pos {
                    0 | 1 => None,
                    2 => Some((end, Rule::Shorthand("text.dash.en"))),
                    3 => Some((end, Rule::Shorthand("text.dash.em"))),
                    n => Some((end, Rule::Literal("-".repeat(n)))),
                }
            }
            '.' => {
                let end = run_end(chars, pos, '.');
                match end - pos {
                    3 => Some((end, Rule::Shorthand("text.ellipsis"))),
                    n if n > 3 => Some((end, Rule::Literal(".".repeat(n)))),
                    _ => None,
                }
            }
            '«' => Some((pos + 1, Rule::Shorthand("text.guillemet.open"))),
            '»' => Some((pos + 1, Rule::Shorthand("text.guillemet.close"))),
            '<' => {
                let end = run_end(chars, pos, '<');
                match end - pos {
                    2 => Some((end, Rule::Shorthand("text.guillemet.open"))),
                    n if n > 2 => Some((end, Rule::Literal("<".repeat(n)))),
                    _ => None,
                }
            }
            '>' => {
                let end = run_end(chars, pos, '>');
                match end - pos {
                    2 => Some((end, Rule::Shorthand("text.guillemet.close"))),
                    n if n > 2 => Some((end, Rule::Literal(">".repeat(n)))),
                    _ => None,
                }
            }
            '!' | ':' | ';' | '?' => {
                let mut end = pos;
                while end < len && matches!(chars[end], '!' | ':' | ';' | '?') {
                    end += 1;
                }
                let run: String = chars[pos..end].iter().collect();
                Some((end, Rule::DoublePunctuation(run)))
            }
            '`' => {
                // The escape never applies to a newline.
                if pos + 1 < len && chars[pos + 1] != '\n' {
                    Some((pos + 2, Rule::Escape(chars[pos + 1])))
                } else {
                    None
                }
            }
            '[' => {
                // Swallows the whitespace following the bracket.
                let mut end = pos + 1;
                while end < len && is_space(chars[end]) {
                    end += 1;
                }
                Some((end, Rule::LBracket))
            }
            ']' => Some((pos + 1, Rule::RBracket)),
            '$' => Some(self.try_dollar(pos)),
            _ => None,
        }
    }

    fn try_comment(&self, pos: usize) -> Option<(usize, Rule)> {
        let chars = &self.chars;
        let len = chars.len();
        let mut i = pos;
        while i < len && is_blank(chars[i]) {
            i += 1;
        }
        if i >= len || chars[i] != '#' {
            return None;
        }
        while i < len && chars[i] != '\n' {
            i += 1;
        }
        if i < len {
            // Consume the newline and all whitespace after it.
            i += 1;
            while i < len && is_space(chars[i]) {
                i += 1;
            }
        }
        Some((i, Rule::Comment))
    }

    /// `]` preceded by whitespace: the whitespace belongs to the bracket.
    fn try_rbracket(&self, pos: usize) -> Option<(usize, Rule)> {
        let chars = &self.chars;
        let mut i = pos;
        while i < chars.len() && is_space(chars[i]) {
            i += 1;
        }
        if i < chars.len() && chars[i] == ']' {
            Some((i + 1, Rule::RBracket))
        } else {
            None
        }
    }

    /// `$` starts a macro call, an invalid macro name, or a `$$` instruction.
    fn try_dollar(&self, pos: usize) -> (usize, Rule) {
        let chars = &self.chars;
        let len = chars.len();
        if let Some(end) = self.scan_macro_name(pos + 1) {
            let name: String = chars[pos + 1..end].iter().collect();
            return (end, Rule::Macro(name));
        }
        if pos + 1 >= len {
            return (pos + 1, Rule::MacroInvalid("$".into()));
        }
        if chars[pos + 1] != '$' {
            // `$` plus up to ten characters of context for the message.
            let mut end = pos + 2;
            while end < len && end < pos + 11 && !chars[end].is_whitespace() {
                end += 1;
            }
            let value: String = chars[pos..end].iter().collect();
            return (end, Rule::MacroInvalid(value));
        }
        let mut end = pos + 2;
        while end < len && is_name_char(chars[end]) {
            end += 1;
        }
        let name: String = chars[pos + 2..end].iter().collect();
        if end < len && chars[end] == '\n' {
            end += 1;
        }
        (end, Rule::PreProc(name))
    }

    /// The longest run of name characters not ending with a period, or a
    /// single `-` or `\`.
    fn scan_macro_name(&self, start: usize) -> Option<usize> {
        let chars = &self.chars;
        let mut end = start;
        while end < chars.len() && is_name_char(chars[end]) {
            end += 1;
        }
        while end > start && chars[end - 1] == '.' {
            end -= 1;
        }
        if end > start {
            return Some(end);
        }
        if start < chars.len() && matches!(chars[start], '-' | '\\') {
            return Some(start + 1);
        }
        None
    }

    fn apply_rule(&mut self, rule: Rule, start: usize, end: usize) -> Result<(), FatalError> {
        match rule {
            Rule::Comment => self.update_line(start, end),
            Rule::Escape(c) => {
                self.skip_spaces = false;
                self.tokens.push(Token::Text {
                    line: self.line,
                    text: c.to_string(),
                });
            }
            Rule::LBracket => {
                self.tokens.push(Token::LBracket { line: self.line });
                self.update_line(start, end);
            }
            Rule::RBracket => {
                let text: String = self.chars[start..end].iter().collect();
                self.tokens.push(Token::RBracket {
                    line: self.line,
                    text,
                });
                self.update_line(start, end);
            }
            Rule::PreProc(name) => {
                match name.as_str() {
                    "whitespace.preserve" => self.preserve = true,
                    "whitespace.skip" => self.preserve = false,
                    _ => {
                        return Err(self.error(format!(
                            "unknown pre-processing instruction: '$${name}'\n\
                             known instructions: $$whitespace.preserve, $$whitespace.skip"
                        )))
                    }
                }
                self.update_line(start, end);
                self.skip_spaces = true;
            }
            Rule::Macro(name) => {
                self.tokens.push(Token::Macro {
                    line: self.line,
                    name,
                });
                self.skip_spaces = !self.preserve;
            }
            Rule::MacroInvalid(value) => {
                return Err(self.error(format!("invalid macro name: '{value}'")))
            }
            Rule::Shorthand(name) => {
                self.skip_spaces = false;
                self.tokens.push(Token::Macro {
                    line: self.line,
                    name: name.into(),
                });
            }
            Rule::Literal(text) => {
                self.tokens.push(Token::Text {
                    line: self.line,
                    text,
                });
            }
            Rule::DoublePunctuation(run) => {
                self.skip_spaces = false;
                self.tokens.push(Token::Macro {
                    line: self.line,
                    name: "text.punctuation.double".into(),
                });
                self.tokens.push(Token::LBracket { line: self.line });
                self.tokens.push(Token::Text {
                    line: self.line,
                    text: run,
                });
                self.tokens.push(Token::RBracket {
                    line: self.line,
                    text: "]".into(),
                });
            }
        }
        Ok(())
    }

    fn update_line(&mut self, start: usize, end: usize) {
        if start == end {
            return;
        }
        let slice = &self.chars[start..end];
        self.line += slice.iter().filter(|c| **c == '\n').count() as u32;
        self.skip_spaces = slice[slice.len() - 1] == '\n';
    }

    /// Tokenizes the plain text between two rule matches.
    fn process_text(&mut self, start: usize, end: usize) {
        if start == end {
            return;
        }
        let mut start = start;
        if self.skip_spaces {
            while start < end && is_blank(self.chars[start]) {
                start += 1;
            }
        }
        if start == end {
            self.skip_spaces = false;
            return;
        }
        let ends_with_newline = self.chars[end - 1] == '\n';
        self.emit_text(start, end);
        self.skip_spaces = ends_with_newline;
    }

    /// Splits a text run on newline sequences, trimming the blanks around
    /// each sequence. In preserve mode the newlines stay at the end of the
    /// chunk before them; in skip mode they are dropped entirely.
    fn emit_text(&mut self, start: usize, end: usize) {
        let chars = &self.chars;
        let mut last_end = start;
        let mut pos = start;
        while pos < end {
            if chars[pos] != '\n' {
                pos += 1;
                continue;
            }
            let mut chunk_end = pos;
            while chunk_end > last_end && is_blank(chars[chunk_end - 1]) {
                chunk_end -= 1;
            }
            let mut newlines_end = pos;
            while newlines_end < end && chars[newlines_end] == '\n' {
                newlines_end += 1;
            }
            let newlines = newlines_end - pos;
            let mut match_end = newlines_end;
            while match_end < end && is_blank(chars[match_end]) {
                match_end += 1;
            }
            if self.preserve {
                let mut text: String = chars[last_end..chunk_end].iter().collect();
                for _ in 0..newlines {
                    text.push('\n');
                }
                self.tokens.push(Token::Text {
                    line: self.line,
                    text,
                });
            } else if chunk_end > last_end {
                self.tokens.push(Token::Text {
                    line: self.line,
                    text: chars[last_end..chunk_end].iter().collect(),
                });
            }
            self.line += newlines as u32;
            last_end = match_end;
            pos = match_end;
        }
        if last_end < end {
            self.tokens.push(Token::Text {
                line: self.line,
                text: chars[last_end..end].iter().collect(),
            });
        }
    }

    fn error(&self, message: String) -> FatalError {
        FatalError {
            location: Some(Location::new(&self.source, self.line)),
            message,
            call_stack: Vec::new(),
        }
    }
}

fn run_end(chars: &[char], pos: usize, c: char) -> usize {
    let mut end = pos;
    while end < chars.len() && chars[end] == c {
        end += 1;
    }
    end
}

/// Merges consecutive text tokens that share a line.
fn merge_text_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Token::Text { line, text } = &token {
            if let Some(Token::Text {
                line: last_line,
                text: last_text,
            }) = merged.last_mut()
            {
                if last_line == line {
                    last_text.push_str(text);
                    continue;
                }
            }
        }
        merged.push(token);
    }
    merged
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source: Rc<SourceName>,
}

impl Parser {
    fn parse(mut self) -> Result<NodeList, FatalError> {
        let mut open_brackets = Vec::new();
        let nodes = self.parse_nodes(&mut open_brackets)?;
        if let Some(Token::RBracket { line, text }) = self.tokens.get(self.pos) {
            return Err(self.syntax_error(*line, text));
        }
        Ok(nodes)
    }

    /// Parses sibling nodes until a closing bracket or the end of input.
    fn parse_nodes(&mut self, open_brackets: &mut Vec<u32>) -> Result<NodeList, FatalError> {
        let mut nodes = NodeList::new();
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::Text { line, text } => {
                    let node = TextNode::new(self.location(*line), text.clone());
                    self.pos += 1;
                    nodes.push(Node::Text(node));
                }
                Token::Macro { line, name } => {
                    let (line, name) = (*line, name.clone());
                    self.pos += 1;
                    let call = self.parse_call(line, name, open_brackets)?;
                    nodes.push(Node::Call(call));
                }
                Token::LBracket { line } => return Err(self.syntax_error(*line, "[")),
                Token::RBracket { .. } => break,
            }
        }
        Ok(nodes)
    }

    fn parse_call(
        &mut self,
        line: u32,
        name: String,
        open_brackets: &mut Vec<u32>,
    ) -> Result<CallNode, FatalError> {
        let mut call = CallNode::new(self.location(line), name);
        while let Some(Token::LBracket { line: bracket_line }) = self.tokens.get(self.pos) {
            open_brackets.push(*bracket_line);
            self.pos += 1;
            let arg = self.parse_nodes(open_brackets)?;
            match self.tokens.get(self.pos) {
                Some(Token::RBracket { .. }) => {
                    self.pos += 1;
                    open_brackets.pop();
                }
                _ => {
                    // End of input inside a group: report the outermost
                    // bracket still open.
                    let line = open_brackets.first().copied().unwrap_or(line);
                    return Err(FatalError {
                        location: Some(self.location(line)),
                        message: "syntax error: macro argument not closed".into(),
                        call_stack: Vec::new(),
                    });
                }
            }
            call.args.push(arg);
        }
        Ok(call)
    }

    fn location(&self, line: u32) -> Location {
        Location::new(&self.source, line)
    }

    fn syntax_error(&self, line: u32, token_text: &str) -> FatalError {
        FatalError {
            location: Some(self.location(line)),
            message: format!("syntax error: '{token_text}'"),
            call_stack: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<NodeList, FatalError> {
        parse_text(input, SourceName::new("root", "/cur"))
    }

    /// Formats nodes the way the syntax tests compare them: `'text'` for
    /// text nodes, `$name[...]` for calls.
    fn format_nodes(nodes: &[Node]) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Text(text) => {
                    out.push('\'');
                    out.push_str(&text.text.replace('\n', "\\n"));
                    out.push('\'');
                }
                Node::Call(call) => {
                    out.push('$');
                    out.push_str(&call.name);
                    for arg in &call.args {
                        out.push('[');
                        out.push_str(&format_nodes(arg));
                        out.push(']');
                    }
                }
            }
        }
        out
    }

    fn assert_parses(input: &str, expected: &str) {
        let nodes = parse(input).expect("parsing should succeed");
        assert_eq!(format_nodes(&nodes), expected, "for input {input:?}");
    }

    fn assert_fails(input: &str, expected: &str) {
        let error = parse(input).expect_err("parsing should fail");
        assert_eq!(error.to_string(), expected, "for input {input:?}");
    }

    #[test]
    fn empty_input() {
        assert_parses("", "");
        assert_parses("`", "");
    }

    #[test]
    fn plain_text() {
        assert_parses("text", "'text'");
    }

    #[test]
    fn surrounding_whitespace_stripped() {
        assert_parses(" \t\n\u{a0}text\u{a0} \t\n", "'\u{a0}text\u{a0}'");
    }

    #[test]
    fn trailing_escape() {
        assert_parses("test`", "'test'");
        assert_parses("test`  ", "'test '");
    }

    #[test]
    fn newlines() {
        assert_parses("first\nsecond", "'first\\n''second'");
        assert_parses(
            "\n\n\nfirst\n\n\nsecond\n\n\nthird\n\n",
            "'first\\n\\n\\n''second\\n\\n\\n''third'",
        );
    }

    #[test]
    fn crlf_normalized() {
        assert_parses("A\nB\rC\r\nD", "'A\\n''B\\n''C\\n''D'");
    }

    #[test]
    fn comments() {
        assert_parses(
            "first  # comment\nsecond\n#comment\nthird",
            "'first''second\\n''third'",
        );
    }

    #[test]
    fn comment_line_numbers() {
        let nodes = parse("first  # comment\nsecond\n#comment\nthird").unwrap();
        let lines: Vec<u32> = nodes.iter().map(|n| n.location().line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn escapes() {
        assert_parses("be`fore`$after`\n  `` next", "'before$after`\\n''` next'");
        assert_parses(
            "`% `& `~ `-- `-`-- `... `« `» `<< `>> `' `!`:`;`?",
            "'% & ~ -- --- ... « » << >> ' !:;?'",
        );
    }

    #[test]
    fn backslash_is_not_an_escape() {
        assert_parses("text\\", "'text\\'");
    }

    #[test]
    fn macro_calls() {
        assert_parses("before $name after", "'before '$name' after'");
        assert_parses(
            "before $name[arg1][][arg3] after",
            "'before '$name['arg1'][]['arg3']' after'",
        );
        assert_parses(
            "$top[a $inner[arg][$deep b] $other c]",
            "$top['a '$inner['arg'][$deep' b']' '$other' c']",
        );
    }

    #[test]
    fn no_break_before_argument() {
        assert_fails("$name [arg2]", "root:1: syntax error: '['");
        assert_fails("$name[arg1] [arg2]", "root:1: syntax error: '['");
    }

    #[test]
    fn invalid_macro_names() {
        assert_fails("$!name after", "root:1: invalid macro name: '$!name'");
        assert_fails("$0name after", "root:1: invalid macro name: '$0name'");
        assert_fails("$.name after", "root:1: invalid macro name: '$.name'");
        assert_fails("$_name after", "root:1: invalid macro name: '$_name'");
    }

    #[test]
    fn special_variable_names() {
        assert_parses("$_ $\\", "$_' '$\\");
    }

    #[test]
    fn name_boundaries() {
        assert_parses("before $one.two. after", "'before '$one.two'. after'");
        assert_parses("before $one.two after", "'before '$one.two' after'");
        assert_parses("before $one_ after", "'before '$one_' after'");
        assert_parses("before $one_. after", "'before '$one_'. after'");
    }

    #[test]
    fn dashes() {
        assert_parses("before--after", "'before'$text.dash.en'after'");
        assert_parses("before---after", "'before'$text.dash.em'after'");
        assert_parses("before-after", "'before-after'");
        assert_parses("before----after", "'before----after'");
    }

    #[test]
    fn ellipsis() {
        assert_parses("before...after", "'before'$text.ellipsis'after'");
        assert_parses("before....after", "'before....after'");
        assert_parses("before..after", "'before..after'");
    }

    #[test]
    fn guillemets() {
        assert_parses(
            "before«in»after",
            "'before'$text.guillemet.open'in'$text.guillemet.close'after'",
        );
        assert_parses(
            "before<<in>>after",
            "'before'$text.guillemet.open'in'$text.guillemet.close'after'",
        );
        assert_parses("before<<<in>>>after", "'before<<<in>>>after'");
    }

    #[test]
    fn apostrophes() {
        assert_parses(
            "a'b 'c' d",
            "'a'$text.apostrophe'b '$text.apostrophe'c'$text.apostrophe' d'",
        );
    }

    #[test]
    fn double_punctuation() {
        assert_parses(
            "!:;? a?;:! b !",
            "$text.punctuation.double['!:;?']' a'\
             $text.punctuation.double['?;:!']' b '\
             $text.punctuation.double['!']",
        );
    }

    #[test]
    fn whitespace_preserve_mode() {
        let input = "$$whitespace.preserve\n\
                     $top[\n  a\n  # comment\n  $inner[arg][\n    $deep b # comment\n    \
                     before close\n  ]\nc]";
        assert_parses(
            input,
            "$top['a\\n'$inner['arg'][$deep' b''before close']'\\n''c']",
        );
    }

    #[test]
    fn whitespace_skip_mode() {
        let input = "$$whitespace.skip\n\
                     $top[\n  a\n  # comment\n  $inner[arg][\n    $deep b # comment\n    \
                     before close\n  ]\nc]";
        assert_parses(input, "$top['a'$inner['arg'][$deep'b''before close']'c']");
    }

    #[test]
    fn whitespace_after_macro() {
        assert_parses("$$whitespace.skip\n$G1\n2", "$G1'2'");
        assert_parses("$$whitespace.preserve\n$H1\n2", "$H1'\\n''2'");
    }

    #[test]
    fn unknown_preprocessing_instruction() {
        assert_fails(
            "before$$invalid\nafter",
            "root:1: unknown pre-processing instruction: '$$invalid'\n\
             known instructions: $$whitespace.preserve, $$whitespace.skip",
        );
        assert_fails(
            "$$ $dummy",
            "root:1: unknown pre-processing instruction: '$$'\n\
             known instructions: $$whitespace.preserve, $$whitespace.skip",
        );
    }

    #[test]
    fn unclosed_arguments() {
        assert_fails("$macro[", "root:1: syntax error: macro argument not closed");
        assert_fails(
            "a\n$macro[\nb\nc",
            "root:2: syntax error: macro argument not closed",
        );
        assert_fails(
            "a\n$macro1[]\nb\n$macro2[\nc\n$macro3[\nd",
            "root:4: syntax error: macro argument not closed",
        );
    }

    #[test]
    fn valid_macro_names() {
        assert!(is_valid_macro_name("name"));
        assert!(is_valid_macro_name("one.two"));
        assert!(is_valid_macro_name("one_"));
        assert!(is_valid_macro_name("a"));
        assert!(is_valid_macro_name("_"));
        assert!(is_valid_macro_name("-"));
        assert!(is_valid_macro_name("\\"));
        assert!(!is_valid_macro_name(""));
        assert!(!is_valid_macro_name("0name"));
        assert!(!is_valid_macro_name("_name"));
        assert!(!is_valid_macro_name(".name"));
        assert!(!is_valid_macro_name("name."));
    }
}
