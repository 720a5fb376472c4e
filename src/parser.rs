//! # Fragment Parsing
//!
//! Fragments are ordinary shell scripts. The engine does not interpret them;
//! it only extracts two kinds of information:
//!
//! - **Header directives** from the leading comment block, read at discovery
//!   time: `# requires: a, b`, `# environments: minimal`, `# enabled: false`.
//!
//! - **Exposed commands** (functions and aliases), used to populate the
//!   command registry. Two parsing modes exist:
//!   - `Regex`: a line-oriented scan. Never fails, but also reports
//!     definitions nested inside other functions or hidden in strings.
//!   - `Ast`: a small structural parser that understands quoting, comments,
//!     here-documents and brace groups. Only top-level definitions are
//!     reported, and unbalanced input is rejected as a syntax error.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FragmentError, Result};

/// Which parser produces a fragment's cached analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParsingMode {
    #[default]
    Regex,
    Ast,
}

impl ParsingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingMode::Regex => "regex",
            ParsingMode::Ast => "ast",
        }
    }
}

impl fmt::Display for ParsingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParsingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regex" => Ok(ParsingMode::Regex),
            "ast" => Ok(ParsingMode::Ast),
            other => Err(format!("unknown parsing mode '{}'", other)),
        }
    }
}

/// Kind of command a fragment exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Function,
    Alias,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Function => f.write_str("function"),
            CommandKind::Alias => f.write_str("alias"),
        }
    }
}

/// A command name defined by a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExposedCommand {
    pub name: String,
    pub kind: CommandKind,
}

impl ExposedCommand {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CommandKind::Function,
        }
    }

    pub fn alias(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CommandKind::Alias,
        }
    }
}

/// Directives declared in a fragment's header comment block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub requires: Vec<String>,
    pub environments: Vec<String>,
    pub enabled: bool,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            requires: Vec::new(),
            environments: Vec::new(),
            enabled: true,
        }
    }
}

/// Read the header directives of the fragment at `path`.
///
/// Only the leading comment block is read, so large fragments cost a single
/// short read.
pub fn read_directives(path: &Path) -> io::Result<Directives> {
    let file = File::open(path)?;
    parse_directives(BufReader::new(file))
}

/// Parse header directives from a reader.
///
/// The header ends at the first line that is neither blank nor a comment.
pub fn parse_directives<R: BufRead>(reader: R) -> io::Result<Directives> {
    let mut directives = Directives::default();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix('#') else {
            break;
        };
        let Some((key, value)) = comment.split_once(':') else {
            continue;
        };
        let values = value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        match key.trim().to_ascii_lowercase().as_str() {
            "requires" => directives.requires.extend(values),
            "environments" | "environment" => directives.environments.extend(values),
            "enabled" => {
                directives.enabled = !matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "false" | "no" | "off" | "0"
                )
            }
            _ => {}
        }
    }

    Ok(directives)
}

/// Line-oriented command scanner used in `Regex` parsing mode.
#[derive(Debug, Clone)]
pub struct CommandScanner {
    keyword_function: Regex,
    posix_function: Regex,
    alias: Regex,
}

impl CommandScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            keyword_function: Regex::new(r"(?m)^[ \t]*function[ \t]+([A-Za-z_][\w:.@+-]*)")?,
            posix_function: Regex::new(r"(?m)^[ \t]*([A-Za-z_][\w:.@+-]*)[ \t]*\([ \t]*\)")?,
            alias: Regex::new(r"(?m)^[ \t]*alias[ \t]+(?:-\S+[ \t]+)*([A-Za-z_][\w:.@+-]*)=")?,
        })
    }

    /// Return the commands defined in `content`, in order of first appearance.
    pub fn scan(&self, content: &str) -> Vec<ExposedCommand> {
        let mut found: Vec<(usize, ExposedCommand)> = Vec::new();

        for (regex, kind) in [
            (&self.keyword_function, CommandKind::Function),
            (&self.posix_function, CommandKind::Function),
            (&self.alias, CommandKind::Alias),
        ] {
            for caps in regex.captures_iter(content) {
                if let Some(m) = caps.get(1) {
                    found.push((
                        m.start(),
                        ExposedCommand {
                            name: m.as_str().to_string(),
                            kind,
                        },
                    ));
                }
            }
        }

        found.sort_by_key(|(offset, _)| *offset);
        dedup_by_name(found.into_iter().map(|(_, command)| command))
    }
}

fn dedup_by_name(commands: impl Iterator<Item = ExposedCommand>) -> Vec<ExposedCommand> {
    let mut seen = std::collections::HashSet::new();
    commands
        .filter(|command| seen.insert(command.name.clone()))
        .collect()
}

/// Parse `content` structurally and return its top-level command definitions.
///
/// Fails with `FragmentError::Parse` on unterminated quotes, substitutions or
/// here-documents, and on unbalanced brace groups.
pub fn parse_commands(content: &str) -> std::result::Result<Vec<ExposedCommand>, FragmentError> {
    let tokens = Lexer::new(content).tokenize()?;
    let mut commands = Vec::new();
    let mut open_groups: Vec<usize> = Vec::new();
    let mut command_start = true;
    let mut i = 0;

    while i < tokens.len() {
        let (token, line) = &tokens[i];
        match token {
            Token::Newline | Token::Op(';') | Token::Op('&') | Token::Op('|') | Token::Op('(') => {
                command_start = true;
            }
            Token::Op(_) => command_start = false,
            Token::Word { text, quoted } => {
                let reserved = command_start && !quoted;
                let top_level = open_groups.is_empty();

                if reserved && text == "{" {
                    open_groups.push(*line);
                } else if reserved && text == "}" {
                    if open_groups.pop().is_none() {
                        return Err(FragmentError::Parse {
                            line: *line,
                            message: "unexpected '}'".to_string(),
                        });
                    }
                    command_start = false;
                } else if reserved && text == "function" {
                    if let Some((Token::Word { text: name, .. }, _)) = tokens.get(i + 1) {
                        if top_level && is_command_name(name) {
                            commands.push(ExposedCommand::function(name.clone()));
                        }
                        i += 2;
                        if matches!(tokens.get(i), Some((Token::Op('('), _)))
                            && matches!(tokens.get(i + 1), Some((Token::Op(')'), _)))
                        {
                            i += 2;
                        }
                        command_start = true;
                        continue;
                    }
                    command_start = false;
                } else if command_start
                    && !quoted
                    && matches!(tokens.get(i + 1), Some((Token::Op('('), _)))
                    && matches!(tokens.get(i + 2), Some((Token::Op(')'), _)))
                {
                    if top_level && is_command_name(text) {
                        commands.push(ExposedCommand::function(text.clone()));
                    }
                    i += 3;
                    command_start = true;
                    continue;
                } else if reserved && text == "alias" {
                    let mut j = i + 1;
                    while let Some((Token::Word { text: arg, .. }, _)) = tokens.get(j) {
                        if let Some((name, _)) = arg.split_once('=') {
                            if top_level && is_command_name(name) {
                                commands.push(ExposedCommand::alias(name));
                            }
                        }
                        j += 1;
                    }
                    i = j;
                    command_start = false;
                    continue;
                } else {
                    command_start = reserved && is_keyword(text);
                }
            }
        }
        i += 1;
    }

    if let Some(line) = open_groups.first() {
        return Err(FragmentError::Parse {
            line: *line,
            message: "unclosed '{'".to_string(),
        });
    }

    Ok(dedup_by_name(commands.into_iter()))
}

fn is_command_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '+' | '@'))
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "if" | "then" | "else" | "elif" | "do" | "while" | "until" | "!" | "time"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word { text: String, quoted: bool },
    Op(char),
    Newline,
}

struct Heredoc {
    delimiter: String,
    strip_tabs: bool,
    line: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(line: usize, message: impl Into<String>) -> FragmentError {
        FragmentError::Parse {
            line,
            message: message.into(),
        }
    }

    fn tokenize(mut self) -> std::result::Result<Vec<(Token, usize)>, FragmentError> {
        let mut tokens = Vec::new();
        let mut word = WordBuf::default();
        let mut heredocs: Vec<Heredoc> = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    word.flush(&mut tokens);
                    tokens.push((Token::Newline, self.line));
                    self.bump();
                    for heredoc in heredocs.drain(..) {
                        self.skip_heredoc_body(&heredoc)?;
                    }
                }
                ' ' | '\t' | '\r' => {
                    word.flush(&mut tokens);
                    self.bump();
                }
                '#' if word.is_empty() => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\\' => {
                    let line = self.line;
                    self.bump();
                    match self.bump() {
                        Some('\n') | None => {}
                        Some(escaped) => {
                            word.start(line);
                            word.push(escaped);
                        }
                    }
                }
                '\'' => {
                    let start = self.line;
                    word.start(start);
                    word.quoted = true;
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('\'') => break,
                            Some(ch) => word.push(ch),
                            None => return Err(Self::error(start, "unterminated single quote")),
                        }
                    }
                }
                '"' => {
                    let start = self.line;
                    word.start(start);
                    word.quoted = true;
                    self.bump();
                    self.skip_double_quoted(start, &mut word)?;
                }
                '`' => {
                    let start = self.line;
                    word.start(start);
                    word.quoted = true;
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('`') => break,
                            Some('\\') => {
                                self.bump();
                            }
                            Some(_) => {}
                            None => return Err(Self::error(start, "unterminated backquote")),
                        }
                    }
                }
                '$' => {
                    word.start(self.line);
                    word.push('$');
                    self.bump();
                    match self.peek() {
                        Some('{') => self.skip_balanced('{', '}', "unterminated parameter expansion")?,
                        Some('(') => self.skip_command_substitution()?,
                        _ => {}
                    }
                }
                ';' | '&' | '|' | '(' | ')' | '>' => {
                    word.flush(&mut tokens);
                    tokens.push((Token::Op(c), self.line));
                    self.bump();
                }
                '<' => {
                    word.flush(&mut tokens);
                    let line = self.line;
                    self.bump();
                    if self.peek() == Some('<') {
                        self.bump();
                        if self.peek() == Some('<') {
                            self.bump();
                        } else {
                            heredocs.push(self.read_heredoc_delimiter(line)?);
                        }
                    }
                    tokens.push((Token::Op('<'), line));
                }
                _ => {
                    word.start(self.line);
                    word.push(c);
                    self.bump();
                }
            }
        }

        word.flush(&mut tokens);
        if let Some(heredoc) = heredocs.first() {
            return Err(Self::error(
                heredoc.line,
                format!("here-document '{}' has no body", heredoc.delimiter),
            ));
        }
        Ok(tokens)
    }

    fn skip_double_quoted(
        &mut self,
        start: usize,
        word: &mut WordBuf,
    ) -> std::result::Result<(), FragmentError> {
        loop {
            match self.bump() {
                Some('"') => return Ok(()),
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        word.push(escaped);
                    }
                }
                Some('$') if self.peek() == Some('(') => {
                    self.skip_command_substitution()?;
                }
                Some(ch) => word.push(ch),
                None => return Err(Self::error(start, "unterminated double quote")),
            }
        }
    }

    /// Skip from an opening delimiter (not yet consumed) to its match.
    fn skip_balanced(
        &mut self,
        open: char,
        close: char,
        message: &str,
    ) -> std::result::Result<(), FragmentError> {
        let start = self.line;
        self.bump();
        let mut depth = 1usize;
        loop {
            match self.bump() {
                None => return Err(Self::error(start, message)),
                Some('\\') => {
                    self.bump();
                }
                Some('\'') => loop {
                    match self.bump() {
                        Some('\'') => break,
                        Some(_) => {}
                        None => return Err(Self::error(start, message)),
                    }
                },
                Some('"') => {
                    let mut discard = WordBuf::default();
                    self.skip_double_quoted(start, &mut discard)?;
                }
                Some(c) if c == open => depth += 1,
                Some(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// Skip a `$( ... )` command substitution whose `(` is not yet consumed.
    ///
    /// A `case` pattern ends with an unmatched `)`, so `case ... esac` blocks
    /// are followed to keep their patterns from closing the substitution.
    fn skip_command_substitution(&mut self) -> std::result::Result<(), FragmentError> {
        const MESSAGE: &str = "unterminated command substitution";
        let start = self.line;
        self.bump();
        let mut depth = 1usize;
        let mut cases: Vec<CaseArm> = Vec::new();
        let mut word = String::new();
        let mut command_start = true;

        loop {
            let Some(c) = self.bump() else {
                return Err(Self::error(start, MESSAGE));
            };
            match c {
                ' ' | '\t' | '\r' | '\n' | ';' | '&' | '|' | '(' | ')' => {}
                '#' if word.is_empty() => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                    continue;
                }
                '\\' => {
                    self.bump();
                    word.push(c);
                    continue;
                }
                '\'' => {
                    loop {
                        match self.bump() {
                            Some('\'') => break,
                            Some(_) => {}
                            None => return Err(Self::error(start, MESSAGE)),
                        }
                    }
                    word.push(c);
                    continue;
                }
                '"' => {
                    let mut discard = WordBuf::default();
                    self.skip_double_quoted(start, &mut discard)?;
                    word.push(c);
                    continue;
                }
                '$' => {
                    match self.peek() {
                        Some('(') => self.skip_command_substitution()?,
                        Some('{') => self.skip_balanced('{', '}', "unterminated parameter expansion")?,
                        _ => {}
                    }
                    word.push(c);
                    continue;
                }
                _ => {
                    word.push(c);
                    continue;
                }
            }

            command_start = end_case_word(&mut word, &mut cases, command_start);
            match c {
                ';' => {
                    if self.peek() == Some(';') {
                        self.bump();
                        if let Some(arm @ CaseArm::Body) = cases.last_mut() {
                            *arm = CaseArm::Pattern;
                        }
                    }
                    command_start = true;
                }
                '\n' | '&' => command_start = true,
                '|' => {
                    // Pattern alternatives stay in the pattern
                    if !matches!(cases.last(), Some(CaseArm::Pattern)) {
                        command_start = true;
                    }
                }
                '(' => {
                    // `(a)` is an optional leading paren of a pattern
                    if !matches!(cases.last(), Some(CaseArm::Pattern)) {
                        depth += 1;
                        command_start = true;
                    }
                }
                ')' => {
                    if let Some(arm @ CaseArm::Pattern) = cases.last_mut() {
                        *arm = CaseArm::Body;
                        command_start = true;
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(());
                        }
                        command_start = false;
                    }
                }
                _ => {}
            }
        }
    }

    fn read_heredoc_delimiter(&mut self, line: usize) -> std::result::Result<Heredoc, FragmentError> {
        let strip_tabs = if self.peek() == Some('-') {
            self.bump();
            true
        } else {
            false
        };
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }

        let mut delimiter = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ';' | '&' | '|' | '<' | '>' | '(' | ')') {
                break;
            }
            self.bump();
            if !matches!(c, '\'' | '"' | '\\') {
                delimiter.push(c);
            }
        }

        if delimiter.is_empty() {
            return Err(Self::error(line, "missing here-document delimiter"));
        }
        Ok(Heredoc {
            delimiter,
            strip_tabs,
            line,
        })
    }

    fn skip_heredoc_body(&mut self, heredoc: &Heredoc) -> std::result::Result<(), FragmentError> {
        loop {
            if self.peek().is_none() {
                return Err(Self::error(
                    heredoc.line,
                    format!("unterminated here-document (expected '{}')", heredoc.delimiter),
                ));
            }
            let mut body_line = String::new();
            while let Some(c) = self.bump() {
                if c == '\n' {
                    break;
                }
                body_line.push(c);
            }
            let body_line = body_line.trim_end_matches('\r');
            let candidate = if heredoc.strip_tabs {
                body_line.trim_start_matches('\t')
            } else {
                body_line
            };
            if candidate == heredoc.delimiter {
                return Ok(());
            }
        }
    }
}

/// Where a `case` block inside a command substitution is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseArm {
    /// Between `case` and `in`.
    Subject,
    /// Reading a pattern, which a `)` ends.
    Pattern,
    /// Commands of an arm, which `;;` ends.
    Body,
}

/// Apply a finished bare word to the `case` stack. Returns whether the next
/// word is in command position.
fn end_case_word(word: &mut String, cases: &mut Vec<CaseArm>, command_start: bool) -> bool {
    if word.is_empty() {
        return command_start;
    }
    let text = std::mem::take(word);
    let top = cases.last().copied();
    match text.as_str() {
        "case" if command_start && top != Some(CaseArm::Pattern) => {
            cases.push(CaseArm::Subject);
            false
        }
        "in" if top == Some(CaseArm::Subject) => {
            cases.pop();
            cases.push(CaseArm::Pattern);
            true
        }
        "esac" if command_start && top.is_some_and(|arm| arm != CaseArm::Subject) => {
            cases.pop();
            false
        }
        _ => command_start && top != Some(CaseArm::Pattern) && is_keyword(&text),
    }
}

#[derive(Default)]
struct WordBuf {
    text: String,
    quoted: bool,
    line: Option<usize>,
}

impl WordBuf {
    fn start(&mut self, line: usize) {
        self.line.get_or_insert(line);
    }

    fn push(&mut self, c: char) {
        self.text.push(c);
    }

    fn is_empty(&self) -> bool {
        self.line.is_none()
    }

    fn flush(&mut self, tokens: &mut Vec<(Token, usize)>) {
        if let Some(line) = self.line.take() {
            tokens.push((
                Token::Word {
                    text: std::mem::take(&mut self.text),
                    quoted: self.quoted,
                },
                line,
            ));
            self.quoted = false;
        }
    }
}
