//! GraphQL Lexer
//!
//! Tokenizes GraphQL request documents for parsing. Commas and `#` comments
//! are insignificant and skipped, per the GraphQL lexical grammar.
//!
//! Example query:
//! ```graphql
//! query {
//!   country(id: "1") {
//!     id
//!     name
//!     capitol { id name }
//!   }
//! }
//! ```

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Name(String),
    String(String),
    Integer(i64),
    Float(f64),

    // Punctuators
    Bang,            // !
    Dollar,          // $
    LeftParen,       // (
    RightParen,      // )
    Ellipsis,        // ...
    Colon,           // :
    Equal,           // =
    At,              // @
    LeftBracket,     // [
    RightBracket,    // ]
    LeftBrace,       // {
    RightBrace,      // }
    Pipe,            // |

    // Special
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "{}", name),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(fl) => write!(f, "{}", fl),
            Token::Bang => write!(f, "!"),
            Token::Dollar => write!(f, "$"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Ellipsis => write!(f, "..."),
            Token::Colon => write!(f, ":"),
            Token::Equal => write!(f, "="),
            Token::At => write!(f, "@"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::Pipe => write!(f, "|"),
            Token::Eof => write!(f, "<EOF>"),
        }
    }
}

pub struct Lexer {
    chars: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire document
    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.skip_ignored();

        let ch = match self.current() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            '!' => self.single(Token::Bang),
            '$' => self.single(Token::Dollar),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            ':' => self.single(Token::Colon),
            '=' => self.single(Token::Equal),
            '@' => self.single(Token::At),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            '{' => self.single(Token::LeftBrace),
            '}' => self.single(Token::RightBrace),
            '|' => self.single(Token::Pipe),
            '.' => self.read_ellipsis(),
            '"' => self.read_string(),
            '-' => self.read_number(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_name()),
            c => Err(format!("Unexpected character '{}' at position {}", c, self.position)),
        }
    }

    /// Skip whitespace, commas, and `#` comments
    fn skip_ignored(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() || ch == ',' {
                self.position += 1;
            } else if ch == '#' {
                while let Some(c) = self.current() {
                    self.position += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, String> {
        self.position += 1;
        Ok(token)
    }

    fn read_ellipsis(&mut self) -> Result<Token, String> {
        if self.chars.get(self.position..self.position + 3) == Some(&['.', '.', '.']) {
            self.position += 3;
            Ok(Token::Ellipsis)
        } else {
            Err(format!("Unexpected '.' at position {}", self.position))
        }
    }

    fn read_name(&mut self) -> Token {
        let start = self.position;
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                self.position += 1;
            } else {
                break;
            }
        }
        Token::Name(self.chars[start..self.position].iter().collect())
    }

    fn read_number(&mut self) -> Result<Token, String> {
        let start = self.position;
        if self.current() == Some('-') {
            self.position += 1;
        }
        let mut is_float = false;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                self.position += 1;
            } else if (ch == '.' || ch == 'e' || ch == 'E')
                && self.chars.get(self.position + 1).is_some_and(|c| c.is_ascii_digit() || *c == '-')
            {
                is_float = true;
                self.position += 2;
            } else {
                break;
            }
        }

        let text: String = self.chars[start..self.position].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| format!("Invalid float literal '{}'", text))
        } else {
            text.parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| format!("Invalid integer literal '{}'", text))
        }
    }

    fn read_string(&mut self) -> Result<Token, String> {
        // Opening quote
        self.position += 1;
        let mut value = String::new();

        while let Some(ch) = self.current() {
            match ch {
                '"' => {
                    self.position += 1;
                    return Ok(Token::String(value));
                }
                '\\' => {
                    self.position += 1;
                    let escaped = self
                        .current()
                        .ok_or_else(|| "Unterminated escape sequence".to_string())?;
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        other => return Err(format!("Unsupported escape '\\{}'", other)),
                    }
                    self.position += 1;
                }
                '\n' => return Err("Unterminated string literal".to_string()),
                other => {
                    value.push(other);
                    self.position += 1;
                }
            }
        }
        Err("Unterminated string literal".to_string())
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().unwrap()
    }

    #[test]
    fn test_simple_query() {
        let tokens = tokenize("{ country(id: \"1\") { id name } }");
        assert_eq!(
            tokens,
            vec![
                Token::LeftBrace,
                Token::Name("country".to_string()),
                Token::LeftParen,
                Token::Name("id".to_string()),
                Token::Colon,
                Token::String("1".to_string()),
                Token::RightParen,
                Token::LeftBrace,
                Token::Name("id".to_string()),
                Token::Name("name".to_string()),
                Token::RightBrace,
                Token::RightBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("42")[0], Token::Integer(42));
        assert_eq!(tokenize("-7")[0], Token::Integer(-7));
        assert_eq!(tokenize("3.25")[0], Token::Float(3.25));
    }

    #[test]
    fn test_commas_and_comments_ignored() {
        let tokens = tokenize("{ a, b # trailing comment\n c }");
        let names: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Name(n) => Some(n.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ellipsis_and_directive_tokens() {
        let tokens = tokenize("... on Type @include");
        assert_eq!(tokens[0], Token::Ellipsis);
        assert_eq!(tokens[1], Token::Name("on".to_string()));
        assert_eq!(tokens[3], Token::At);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokenize(r#""say \"hi\"""#)[0],
            Token::String("say \"hi\"".to_string())
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("\"oops").tokenize().is_err());
    }
}
