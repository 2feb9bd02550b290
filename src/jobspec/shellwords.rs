//! Hand-rolled POSIX-like word splitter for `JobSpec::command`: supports
//! single quotes (literal, no escapes), double quotes (backslash-escapes
//! `"`, `\`, `$`, and backtick), and bare backslash-escapes outside quotes.
//! No pack dependency covers this narrow a grammar, so it's a pure function
//! tested directly rather than borrowed from a crate.

use super::error::{JobSpecError, Result};

pub fn split(command: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(JobSpecError::UnterminatedQuote),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                            Some(next) => {
                                current.push('\\');
                                current.push(next);
                            }
                            None => return Err(JobSpecError::UnterminatedQuote),
                        },
                        Some(c) => current.push(c),
                        None => return Err(JobSpecError::UnterminatedQuote),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(next) => current.push(next),
                    None => return Err(JobSpecError::UnterminatedQuote),
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_plain_whitespace() {
        assert_eq!(split("echo hello world").unwrap(), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn collapses_repeated_whitespace() {
        assert_eq!(split("echo   hello").unwrap(), vec!["echo", "hello"]);
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(split(r#"echo 'a b $c'"#).unwrap(), vec!["echo", "a b $c"]);
    }

    #[test]
    fn double_quotes_allow_backslash_escapes() {
        assert_eq!(split(r#"echo "a \"b\" c""#).unwrap(), vec!["echo", r#"a "b" c"#]);
    }

    #[test]
    fn bare_backslash_escapes_next_char() {
        assert_eq!(split(r"echo a\ b").unwrap(), vec!["echo", "a b"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(matches!(split("echo 'unterminated"), Err(JobSpecError::UnterminatedQuote)));
    }

    #[test]
    fn empty_command_yields_empty_argv() {
        assert_eq!(split("").unwrap(), Vec::<String>::new());
        assert_eq!(split("   ").unwrap(), Vec::<String>::new());
    }
}
