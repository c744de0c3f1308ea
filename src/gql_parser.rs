//! GraphQL Parser
//!
//! Converts token stream from the lexer into a request-document AST.

use crate::gql_ast::*;
use crate::gql_lexer::{Lexer, Token};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parse a GraphQL document string
    pub fn parse(source: &str) -> Result<Document, String> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(tokens);
        parser.parse_document()
    }

    fn parse_document(&mut self) -> Result<Document, String> {
        let mut definitions = Vec::new();
        while self.current() != &Token::Eof {
            definitions.push(self.parse_definition()?);
        }
        if definitions.is_empty() {
            return Err("Empty document".to_string());
        }
        Ok(Document { definitions })
    }

    fn parse_definition(&mut self) -> Result<Definition, String> {
        match self.current().clone() {
            // Anonymous shorthand operation: `{ ... }`
            Token::LeftBrace => {
                let selection_set = self.parse_selection_set()?;
                Ok(Definition::Operation(OperationDefinition {
                    operation: OperationType::Query,
                    name: None,
                    variable_definitions: Vec::new(),
                    directives: Vec::new(),
                    selection_set,
                }))
            }
            Token::Name(keyword) => match keyword.as_str() {
                "query" => Ok(Definition::Operation(self.parse_operation(OperationType::Query)?)),
                "mutation" => {
                    Ok(Definition::Operation(self.parse_operation(OperationType::Mutation)?))
                }
                "subscription" => {
                    Ok(Definition::Operation(self.parse_operation(OperationType::Subscription)?))
                }
                "fragment" => Ok(Definition::Fragment(self.parse_fragment_definition()?)),
                other => Err(format!("Expected operation or fragment keyword, got '{}'", other)),
            },
            other => Err(format!("Expected definition, got {}", other)),
        }
    }

    fn parse_operation(&mut self, operation: OperationType) -> Result<OperationDefinition, String> {
        // Operation keyword
        self.advance();

        let name = match self.current().clone() {
            Token::Name(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let variable_definitions = if self.current() == &Token::LeftParen {
            self.parse_variable_definitions()?
        } else {
            Vec::new()
        };

        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;

        Ok(OperationDefinition {
            operation,
            name,
            variable_definitions,
            directives,
            selection_set,
        })
    }

    fn parse_variable_definitions(&mut self) -> Result<Vec<VariableDefinition>, String> {
        self.expect(&Token::LeftParen)?;
        let mut definitions = Vec::new();

        while self.current() != &Token::RightParen {
            self.expect(&Token::Dollar)?;
            let name = self.expect_name()?;
            self.expect(&Token::Colon)?;
            let var_type = self.parse_type_text()?;
            let default = if self.current() == &Token::Equal {
                self.advance();
                Some(self.parse_value()?)
            } else {
                None
            };
            definitions.push(VariableDefinition {
                name,
                var_type,
                default,
            });
        }

        self.expect(&Token::RightParen)?;
        Ok(definitions)
    }

    /// Consume a type reference, returning its rendered text (e.g. "[Int!]!")
    fn parse_type_text(&mut self) -> Result<String, String> {
        let mut text = String::new();
        match self.current().clone() {
            Token::LeftBracket => {
                self.advance();
                text.push('[');
                text.push_str(&self.parse_type_text()?);
                self.expect(&Token::RightBracket)?;
                text.push(']');
            }
            Token::Name(name) => {
                self.advance();
                text.push_str(&name);
            }
            other => return Err(format!("Expected type, got {}", other)),
        }
        if self.current() == &Token::Bang {
            self.advance();
            text.push('!');
        }
        Ok(text)
    }

    fn parse_selection_set(&mut self) -> Result<SelectionSet, String> {
        self.expect(&Token::LeftBrace)?;
        let mut selections = Vec::new();

        while self.current() != &Token::RightBrace {
            selections.push(self.parse_selection()?);
        }
        if selections.is_empty() {
            return Err("Selection set cannot be empty".to_string());
        }

        self.expect(&Token::RightBrace)?;
        Ok(SelectionSet { selections })
    }

    fn parse_selection(&mut self) -> Result<Selection, String> {
        if self.current() == &Token::Ellipsis {
            self.advance();
            // `... on Type { ... }` is an inline fragment; `... Name` a spread
            if let Token::Name(name) = self.current().clone() {
                if name == "on" {
                    self.advance();
                    let type_condition = self.expect_name()?;
                    let directives = self.parse_directives()?;
                    let selection_set = self.parse_selection_set()?;
                    return Ok(Selection::InlineFragment(InlineFragment {
                        type_condition: Some(type_condition),
                        directives,
                        selection_set,
                    }));
                }
                self.advance();
                let directives = self.parse_directives()?;
                return Ok(Selection::FragmentSpread(FragmentSpread { name, directives }));
            }
            if self.current() == &Token::At || self.current() == &Token::LeftBrace {
                let directives = self.parse_directives()?;
                let selection_set = self.parse_selection_set()?;
                return Ok(Selection::InlineFragment(InlineFragment {
                    type_condition: None,
                    directives,
                    selection_set,
                }));
            }
            return Err(format!("Expected fragment after '...', got {}", self.current()));
        }

        Ok(Selection::Field(self.parse_field()?))
    }

    fn parse_field(&mut self) -> Result<Field, String> {
        let first = self.expect_name()?;

        // `alias: name`
        let (alias, name) = if self.current() == &Token::Colon {
            self.advance();
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };

        let arguments = if self.current() == &Token::LeftParen {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        let directives = self.parse_directives()?;

        let selection_set = if self.current() == &Token::LeftBrace {
            Some(self.parse_selection_set()?)
        } else {
            None
        };

        Ok(Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<(String, AstValue)>, String> {
        self.expect(&Token::LeftParen)?;
        let mut arguments = Vec::new();

        while self.current() != &Token::RightParen {
            let name = self.expect_name()?;
            self.expect(&Token::Colon)?;
            let value = self.parse_value()?;
            arguments.push((name, value));
        }

        self.expect(&Token::RightParen)?;
        Ok(arguments)
    }

    fn parse_directives(&mut self) -> Result<Vec<Directive>, String> {
        let mut directives = Vec::new();
        while self.current() == &Token::At {
            self.advance();
            let name = self.expect_name()?;
            let arguments = if self.current() == &Token::LeftParen {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            directives.push(Directive { name, arguments });
        }
        Ok(directives)
    }

    fn parse_value(&mut self) -> Result<AstValue, String> {
        match self.current().clone() {
            Token::Dollar => {
                self.advance();
                Ok(AstValue::Variable(self.expect_name()?))
            }
            Token::Integer(i) => {
                self.advance();
                Ok(AstValue::Int(i))
            }
            Token::Float(f) => {
                self.advance();
                Ok(AstValue::Float(f))
            }
            Token::String(s) => {
                self.advance();
                Ok(AstValue::String(s))
            }
            Token::Name(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(AstValue::Boolean(true)),
                    "false" => Ok(AstValue::Boolean(false)),
                    "null" => Ok(AstValue::Null),
                    _ => Ok(AstValue::Enum(name)),
                }
            }
            Token::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                while self.current() != &Token::RightBracket {
                    items.push(self.parse_value()?);
                }
                self.advance();
                Ok(AstValue::List(items))
            }
            Token::LeftBrace => {
                self.advance();
                let mut fields = Vec::new();
                while self.current() != &Token::RightBrace {
                    let name = self.expect_name()?;
                    self.expect(&Token::Colon)?;
                    fields.push((name, self.parse_value()?));
                }
                self.advance();
                Ok(AstValue::Object(fields))
            }
            other => Err(format!("Expected value, got {}", other)),
        }
    }

    fn parse_fragment_definition(&mut self) -> Result<FragmentDefinition, String> {
        // `fragment` keyword
        self.advance();
        let name = self.expect_name()?;
        if name == "on" {
            return Err("Fragment name cannot be 'on'".to_string());
        }
        let on = self.expect_name()?;
        if on != "on" {
            return Err(format!("Expected 'on' in fragment definition, got '{}'", on));
        }
        let type_condition = self.expect_name()?;
        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;

        Ok(FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
        })
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn expect(&mut self, token: &Token) -> Result<(), String> {
        if self.current() == token {
            self.advance();
            Ok(())
        } else {
            Err(format!("Expected {}, got {}", token, self.current()))
        }
    }

    fn expect_name(&mut self) -> Result<String, String> {
        match self.current().clone() {
            Token::Name(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(format!("Expected name, got {}", other)),
        }
    }
}
