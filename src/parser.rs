use crate::ast::{Command, Stage};

/// One lexical token of an input line.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    /// `|`
    Pipe,
    /// `<`
    RedirectIn,
    /// `>`
    RedirectOut,
    /// `&`
    Background,
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens — whitespace is skipped
    Normal,
    /// Building an unquoted word — whitespace or an operator ends it
    InWord,
    /// Inside double quotes — whitespace and operators are literal
    InDoubleQuote,
    /// Inside single quotes — everything is literal
    InSingleQuote,
}

/// Tokenize an input line into words and operator tokens.
///
/// Unquoted `|`, `<`, `>`, and `&` are operators even without surrounding
/// whitespace; quoting or a backslash makes them (and whitespace) literal.
fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Distinguishes a pending empty word (`""`) from no word at all.
    let mut word_open = false;
    let mut state = State::Normal;
    let mut chars = input.chars();

    fn flush(current: &mut String, word_open: &mut bool, tokens: &mut Vec<Token>) {
        if *word_open {
            tokens.push(Token::Word(std::mem::take(current)));
            *word_open = false;
        }
    }

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            // ── Normal / InWord: whitespace and operators delimit ──
            (State::Normal | State::InWord, ' ' | '\t') => {
                flush(&mut current, &mut word_open, &mut tokens);
                state = State::Normal;
            }
            (State::Normal | State::InWord, '|' | '<' | '>' | '&') => {
                flush(&mut current, &mut word_open, &mut tokens);
                tokens.push(match ch {
                    '|' => Token::Pipe,
                    '<' => Token::RedirectIn,
                    '>' => Token::RedirectOut,
                    _ => Token::Background,
                });
                state = State::Normal;
            }
            (State::Normal | State::InWord, '"') => {
                word_open = true;
                state = State::InDoubleQuote;
            }
            (State::Normal | State::InWord, '\'') => {
                word_open = true;
                state = State::InSingleQuote;
            }
            (State::Normal | State::InWord, '\\') => {
                // Escaped char is literal, including operators and spaces.
                if let Some(next) = chars.next() {
                    current.push(next);
                } else {
                    current.push('\\');
                }
                word_open = true;
                state = State::InWord;
            }
            (State::Normal | State::InWord, c) => {
                current.push(c);
                word_open = true;
                state = State::InWord;
            }

            // ── Inside "..." ──
            (State::InDoubleQuote, '"') => {
                state = State::InWord;
            }
            (State::InDoubleQuote, '\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => current.push(c),
                Some(c) => {
                    current.push('\\');
                    current.push(c);
                }
                None => current.push('\\'),
            },
            (State::InDoubleQuote, c) => {
                current.push(c);
            }

            // ── Inside '...' ──
            (State::InSingleQuote, '\'') => {
                state = State::InWord;
            }
            (State::InSingleQuote, c) => {
                current.push(c);
            }
        }
    }

    match state {
        State::InDoubleQuote | State::InSingleQuote => {
            return Err("syntax error: unterminated quote".to_string());
        }
        State::Normal | State::InWord => {
            flush(&mut current, &mut word_open, &mut tokens);
        }
    }

    Ok(tokens)
}

/// Parse one trimmed, non-empty input line into a [`Command`].
///
/// `|` separates stages; `<` and `>` each take exactly one following word
/// naming the pipeline's external input/output; a trailing `&` marks the
/// command as background. On `Err` nothing must be executed.
pub fn parse(input: &str) -> Result<Command, String> {
    let tokens = tokenize(input)?;

    let mut stages: Vec<Stage> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut stdin_path: Option<String> = None;
    let mut stdout_path: Option<String> = None;
    let mut background = false;

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(word) => current.push(word.clone()),
            Token::Pipe => {
                if current.is_empty() {
                    return Err("syntax error: missing command before '|'".to_string());
                }
                stages.push(Stage {
                    argv: std::mem::take(&mut current),
                });
            }
            Token::RedirectIn => {
                if stdin_path.is_some() {
                    return Err("syntax error: duplicate input redirection".to_string());
                }
                i += 1;
                stdin_path = Some(expect_filename(&tokens, i, "<")?);
            }
            Token::RedirectOut => {
                if stdout_path.is_some() {
                    return Err("syntax error: duplicate output redirection".to_string());
                }
                i += 1;
                stdout_path = Some(expect_filename(&tokens, i, ">")?);
            }
            Token::Background => {
                if i + 1 != tokens.len() {
                    return Err("syntax error: '&' must end the command".to_string());
                }
                background = true;
            }
        }
        i += 1;
    }

    if current.is_empty() {
        if stages.is_empty() {
            return Err("syntax error: missing command".to_string());
        }
        return Err("syntax error: missing command after '|'".to_string());
    }
    stages.push(Stage { argv: current });

    Ok(Command {
        stages,
        stdin_path,
        stdout_path,
        background,
    })
}

fn expect_filename(tokens: &[Token], i: usize, operator: &str) -> Result<String, String> {
    match tokens.get(i) {
        Some(Token::Word(word)) => Ok(word.clone()),
        _ => Err(format!(
            "syntax error: expected filename after '{operator}'"
        )),
    }
}
