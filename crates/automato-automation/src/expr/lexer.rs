//! Tokenizer

use super::{ExprError, ExprResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Bool(bool),
    Variable(String),
    Not,
    And,
    Or,
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// A token and its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

pub(crate) fn tokenize(text: &str) -> ExprResult<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' => match chars.next_if(|&(_, c)| c == '=') {
                Some(_) => Token::Eq,
                None => {
                    return Err(ExprError::Syntax {
                        position,
                        message: "expected '=='".to_string(),
                    })
                }
            },
            '>' => match chars.next_if(|&(_, c)| c == '=') {
                Some(_) => Token::Ge,
                None => Token::Gt,
            },
            '<' => match chars.next_if(|&(_, c)| c == '=') {
                Some(_) => Token::Le,
                None => Token::Lt,
            },
            c if is_word_char(c) => {
                let mut end = position + c.len_utf8();
                while let Some((i, c)) = chars.next_if(|&(_, c)| is_word_char(c)) {
                    end = i + c.len_utf8();
                }
                word(&text[position..end], position)?
            }
            other => {
                return Err(ExprError::Syntax {
                    position,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };

        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

fn word(word: &str, position: usize) -> ExprResult<Token> {
    // Keywords are lowercase only; boolean literals are caseless
    let token = match word {
        "not" => Token::Not,
        "and" => Token::And,
        "or" => Token::Or,
        w if w.eq_ignore_ascii_case("true") => Token::Bool(true),
        w if w.eq_ignore_ascii_case("false") => Token::Bool(false),
        w if w.bytes().all(|b| b.is_ascii_digit()) => {
            Token::Int(w.parse().map_err(|_| ExprError::Syntax {
                position,
                message: format!("integer literal '{}' out of range", w),
            })?)
        }
        w => Token::Variable(w.to_string()),
    };
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_words() {
        assert_eq!(
            tokens("TRUE False 42 host1.user.bob not and or"),
            vec![
                Token::Bool(true),
                Token::Bool(false),
                Token::Int(42),
                Token::Variable("host1.user.bob".to_string()),
                Token::Not,
                Token::And,
                Token::Or,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(tokens("AND"), vec![Token::Variable("AND".to_string())]);
    }

    #[test]
    fn test_operators_without_spaces() {
        assert_eq!(
            tokens("(1+2)>=3==x<=y<z>w*2/1-0"),
            vec![
                Token::LParen,
                Token::Int(1),
                Token::Plus,
                Token::Int(2),
                Token::RParen,
                Token::Ge,
                Token::Int(3),
                Token::Eq,
                Token::Variable("x".to_string()),
                Token::Le,
                Token::Variable("y".to_string()),
                Token::Lt,
                Token::Variable("z".to_string()),
                Token::Gt,
                Token::Variable("w".to_string()),
                Token::Star,
                Token::Int(2),
                Token::Slash,
                Token::Int(1),
                Token::Minus,
                Token::Int(0),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let spanned = tokenize("a  >= 1").unwrap();
        let positions: Vec<usize> = spanned.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 3, 6]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            tokenize("a = 1"),
            Err(ExprError::Syntax { position: 2, .. })
        ));
        assert!(matches!(
            tokenize("a != 1"),
            Err(ExprError::Syntax { position: 2, .. })
        ));
        assert!(matches!(
            tokenize("99999999999999999999"),
            Err(ExprError::Syntax { position: 0, .. })
        ));
    }
}
