//! Shell-style word splitting for option strings.
//!
//! Options such as extra tags and extra build arguments arrive as one string
//! that follows POSIX shell quoting rules. `split_words` lexes such a string
//! into words without ever involving an actual shell.

use crate::error::{Error, Result};

/// Split a string into shell words.
///
/// - Unquoted whitespace separates words
/// - Single quotes preserve everything literally
/// - Double quotes preserve whitespace; backslash escapes `"` `\` `$` `` ` ``
/// - A backslash outside quotes escapes the next character
///
/// `field` names the originating option in error details.
pub fn split_words(input: &str, field: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

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
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(Error::validation_invalid_argument(
                                field,
                                "Unterminated single quote",
                            ));
                        }
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(esc @ ('"' | '\\' | '$' | '`')) => current.push(esc),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => {
                                return Err(Error::validation_invalid_argument(
                                    field,
                                    "Unterminated double quote",
                                ));
                            }
                        },
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(Error::validation_invalid_argument(
                                field,
                                "Unterminated double quote",
                            ));
                        }
                    }
                }
            }
            '\\' => match chars.next() {
                Some(ch) => {
                    current.push(ch);
                    in_word = true;
                }
                None => {
                    return Err(Error::validation_invalid_argument(
                        field,
                        "Trailing backslash",
                    ));
                }
            },
            _ => {
                current.push(c);
                in_word = true;
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
    use crate::error::ErrorCode;

    fn split(input: &str) -> Vec<String> {
        split_words(input, "test_field").unwrap()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(split("latest stable edge"), ["latest", "stable", "edge"]);
        assert_eq!(split("  latest \t stable  "), ["latest", "stable"]);
    }

    #[test]
    fn empty_input_yields_no_words() {
        assert!(split("").is_empty());
        assert!(split("   ").is_empty());
    }

    #[test]
    fn single_quotes_preserve_content() {
        assert_eq!(split("'a tag' plain"), ["a tag", "plain"]);
        assert_eq!(split("'$HOME'"), ["$HOME"]);
    }

    #[test]
    fn double_quotes_preserve_whitespace_and_escapes() {
        assert_eq!(split(r#""a tag""#), ["a tag"]);
        assert_eq!(split(r#""say \"hi\"""#), [r#"say "hi""#]);
        assert_eq!(split(r#""back\\slash""#), [r"back\slash"]);
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        assert_eq!(split(r"a\ b"), ["a b"]);
    }

    #[test]
    fn empty_quoted_word_is_kept() {
        assert_eq!(split("'' x"), ["", "x"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = split_words("'open", "extra_tags").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["field"], "extra_tags");
    }

    #[test]
    fn trailing_backslash_is_an_error() {
        let err = split_words("tag\\", "extra_tags").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }
}
