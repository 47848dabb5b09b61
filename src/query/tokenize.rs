use std::str::Chars;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("No closing quotation for `{0}`")]
    UnterminatedQuote(char),
    #[error("No character to escape after `\\`")]
    TrailingBackslash,
}

/// Split `s` into tokens the way a POSIX shell splits words.
///
/// Tokens are separated by whitespace.
/// Single quotes preserve everything up to the next single quote.
/// Double quotes preserve everything up to the next double quote,
/// except that a backslash escapes `\`, `"`, `$`, `` ` `` and newline.
/// Outside quotes, a backslash escapes any character,
/// and escaped newlines are removed.
pub fn tokenize(s: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut token: Option<String> = None;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => single_quoted(&mut chars, token.get_or_insert_with(String::new))?,
            '"' => double_quoted(&mut chars, token.get_or_insert_with(String::new))?,
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c) => token.get_or_insert_with(String::new).push(c),
                None => return Err(TokenizeError::TrailingBackslash),
            },
            c if c.is_whitespace() => tokens.extend(token.take()),
            c => token.get_or_insert_with(String::new).push(c),
        }
    }
    tokens.extend(token);
    Ok(tokens)
}

fn single_quoted(chars: &mut Chars, token: &mut String) -> Result<(), TokenizeError> {
    for c in chars.by_ref() {
        if c == '\'' {
            return Ok(());
        }
        token.push(c);
    }
    Err(TokenizeError::UnterminatedQuote('\''))
}

fn double_quoted(chars: &mut Chars, token: &mut String) -> Result<(), TokenizeError> {
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(()),
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c @ ('\\' | '"' | '$' | '`')) => token.push(c),
                Some(c) => {
                    token.push('\\');
                    token.push(c);
                }
                None => break,
            },
            c => token.push(c),
        }
    }
    Err(TokenizeError::UnterminatedQuote('"'))
}

/// Quote `s` so [`tokenize`] reads it back as one token.
pub fn quote(s: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c);
    if !s.is_empty() && s.chars().all(safe) {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
