//! Runtime profiles and the predicates that gate configuration sections
//!
//! Predicate syntax:
//! - `dev` - the profile is active
//! - `!prod` - the profile is not active
//! - `dev & cloud`, `dev | test` - all of / any of (no mixing without parentheses)
//! - `dev, test` - any of
//! - `(dev | test) & !prod` - grouping

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    static ref PROFILE_NAME: Regex = Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap();
}

/// The set of active runtime profiles (e.g. "dev", "prod")
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSet(BTreeSet<String>);

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list, ignoring blanks: "dev, cloud"
    pub fn from_list(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn contains(&self, profile: &str) -> bool {
        self.0.contains(profile)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ProfileSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ProfileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Errors from parsing a profile predicate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileParseError {
    #[error("empty profile expression")]
    Empty,
    #[error("invalid profile name '{0}'")]
    InvalidName(String),
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("missing ')'")]
    UnclosedParen,
    #[error("'&' and '|' cannot be mixed without parentheses")]
    MixedOperators,
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Boolean expression over profile names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilePredicate {
    Name(String),
    Not(Box<ProfilePredicate>),
    All(Vec<ProfilePredicate>),
    Any(Vec<ProfilePredicate>),
}

impl ProfilePredicate {
    pub fn parse(expression: &str) -> Result<Self, ProfileParseError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(ProfileParseError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let predicate = parser.parse_list()?;
        match parser.next() {
            None => Ok(predicate),
            Some(token) => Err(ProfileParseError::UnexpectedToken(token.to_string())),
        }
    }

    /// Evaluate against the active profiles
    pub fn matches(&self, active: &ProfileSet) -> bool {
        match self {
            Self::Name(name) => active.contains(name),
            Self::Not(inner) => !inner.matches(active),
            Self::All(items) => items.iter().all(|p| p.matches(active)),
            Self::Any(items) => items.iter().any(|p| p.matches(active)),
        }
    }
}

impl FromStr for ProfilePredicate {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Not,
    And,
    Or,
    Comma,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => f.write_str(name),
            Token::Not => f.write_str("!"),
            Token::And => f.write_str("&"),
            Token::Or => f.write_str("|"),
            Token::Comma => f.write_str(","),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

const OPERATORS: &str = "!&|,()";

/// Limit on `!` and `(` nesting so hostile input cannot exhaust the stack
const MAX_NESTING: usize = 64;

fn tokenize(source: &str) -> Result<Vec<Token>, ProfileParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '!' => Token::Not,
            '&' => Token::And,
            '|' => Token::Or,
            ',' => Token::Comma,
            '(' => Token::Open,
            ')' => Token::Close,
            _ => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || OPERATORS.contains(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let name = &source[start..end];
                if !PROFILE_NAME.is_match(name) {
                    return Err(ProfileParseError::InvalidName(name.to_string()));
                }
                tokens.push(Token::Name(name.to_string()));
                continue;
            }
        };
        chars.next();
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), ProfileParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ProfileParseError::TooDeep(MAX_NESTING));
        }
        Ok(())
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// list := expr (',' expr)*
    fn parse_list(&mut self) -> Result<ProfilePredicate, ProfileParseError> {
        let mut items = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            items.push(self.parse_expr()?);
        }
        Ok(collapse(items, ProfilePredicate::Any))
    }

    /// expr := unary ('&' unary)* | unary ('|' unary)*
    fn parse_expr(&mut self) -> Result<ProfilePredicate, ProfileParseError> {
        let first = self.parse_unary()?;
        let operator = match self.peek() {
            Some(Token::And) => Token::And,
            Some(Token::Or) => Token::Or,
            _ => return Ok(first),
        };

        let mut items = vec![first];
        while self.eat(&operator) {
            items.push(self.parse_unary()?);
        }
        if matches!(self.peek(), Some(Token::And) | Some(Token::Or)) {
            return Err(ProfileParseError::MixedOperators);
        }

        Ok(match operator {
            Token::And => ProfilePredicate::All(items),
            _ => ProfilePredicate::Any(items),
        })
    }

    /// unary := '!' unary | '(' list ')' | name
    fn parse_unary(&mut self) -> Result<ProfilePredicate, ProfileParseError> {
        match self.next() {
            Some(Token::Not) => {
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(ProfilePredicate::Not(Box::new(inner)))
            }
            Some(Token::Open) => {
                self.descend()?;
                let inner = self.parse_list()?;
                if !self.eat(&Token::Close) {
                    return Err(ProfileParseError::UnclosedParen);
                }
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Name(name)) => Ok(ProfilePredicate::Name(name)),
            Some(token) => Err(ProfileParseError::UnexpectedToken(token.to_string())),
            None => Err(ProfileParseError::UnexpectedEnd),
        }
    }
}

fn collapse(
    mut items: Vec<ProfilePredicate>,
    wrap: fn(Vec<ProfilePredicate>) -> ProfilePredicate,
) -> ProfilePredicate {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}
