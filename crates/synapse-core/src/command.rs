//! Command-string parsing
//!
//! A command arrives from the model as one string. The dispatcher needs the
//! same few derived views everywhere: the trimmed/normalized text, the base
//! token that identifies the target handler, and a quote-aware argument
//! split. Keeping them here means every layer sees identical parses.

/// Trim and normalize a raw command string.
///
/// A leading `/` on a `skill:` token is stripped so `/skill:load x` and
/// `skill:load x` route identically.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        if rest.starts_with("skill:") {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}

/// The base token: everything before the first whitespace.
pub fn base_token(command: &str) -> &str {
    command
        .split_whitespace()
        .next()
        .unwrap_or("")
}

/// The base command used to identify the intended tool.
///
/// For `mcp:*`, `skill:*`, and `task:*` the whole colon-segmented prefix up
/// to the first space; otherwise the first whitespace-delimited token. (The
/// colon prefix never contains whitespace, so both cases reduce to the base
/// token; the function exists so call sites state intent.)
pub fn base_command(command: &str) -> String {
    base_token(command.trim()).to_string()
}

/// Split an argument string into tokens, respecting single and double
/// quotes. Quotes group, they are not kept in the output token.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_token = false;

    for c in input.chars() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Split a command into base token and raw argument remainder.
pub fn split_command(command: &str) -> (&str, &str) {
    let trimmed = command.trim();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => (&trimmed[..idx], trimmed[idx..].trim_start()),
        None => (trimmed, ""),
    }
}

/// Pull the value following a `--flag` out of a token list.
pub fn flag_value<'a>(tokens: &'a [String], flag: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|t| t == flag)
        .and_then(|i| tokens.get(i + 1))
        .map(String::as_str)
}
