//! Write-guard: reject file-modifying shell idioms
//!
//! A small fixed rule set recognizes shell commands that modify files
//! (`echo … > …`, heredocs, `sed -i`, `sed … > …`) so the router can steer
//! the model toward the structured `write`/`edit` verbs instead. One level
//! of `bash …` / `bash -c '…'` wrapping is unwrapped before the check.

use regex::Regex;

pub struct WriteGuard {
    rules: Vec<(Regex, &'static str)>,
}

impl Default for WriteGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteGuard {
    pub fn new() -> Self {
        let patterns: &[(&str, &str)] = &[
            (r"^echo\b.*>", "echo with redirect"),
            (r"^cat\s*<<", "heredoc"),
            (r"^sed\b.*\s-i", "sed in-place"),
            (r"^sed\b.*>", "sed with redirect"),
        ];
        let rules = patterns
            .iter()
            .map(|(p, label)| (Regex::new(p).expect("write-guard pattern is valid"), *label))
            .collect();
        Self { rules }
    }

    /// Returns the rejection message when the command matches a
    /// file-modifying idiom, `None` otherwise.
    pub fn check(&self, command: &str) -> Option<String> {
        let inner = unwrap_shell_wrapper(command.trim());
        for (rule, label) in &self.rules {
            if rule.is_match(&inner) {
                return Some(format!(
                    "File-modifying shell command blocked ({label}). Use the \
                     built-in `write` verb to create files and the `edit` verb \
                     to change them instead of shell redirection."
                ));
            }
        }
        None
    }
}

/// Strip one level of `bash …` / `bash -c '…'` wrapping so wrapped
/// file-modifying idioms are still recognized.
fn unwrap_shell_wrapper(command: &str) -> String {
    let Some(rest) = command.strip_prefix("bash ") else {
        return command.to_string();
    };
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix("-c")
        .map(str::trim_start)
        .unwrap_or(rest);
    strip_matching_quotes(rest).to_string()
}

fn strip_matching_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> WriteGuard {
        WriteGuard::new()
    }

    #[test]
    fn test_echo_redirect_blocked() {
        assert!(guard().check(r#"echo "x" > /tmp/t"#).is_some());
        assert!(guard().check("echo hi >> /tmp/log").is_some());
    }

    #[test]
    fn test_plain_echo_allowed() {
        assert!(guard().check("echo hello").is_none());
        assert!(guard().check("echo hi | grep h").is_none());
    }

    #[test]
    fn test_heredoc_blocked() {
        assert!(guard().check("cat <<EOF > /tmp/t").is_some());
        assert!(guard().check("cat << 'EOF'").is_some());
    }

    #[test]
    fn test_plain_cat_allowed() {
        assert!(guard().check("cat /etc/hostname").is_none());
    }

    #[test]
    fn test_sed_in_place_blocked() {
        assert!(guard().check("sed -i 's/a/b/' file.txt").is_some());
        assert!(guard().check("sed -E -i 's/a/b/' file.txt").is_some());
    }

    #[test]
    fn test_sed_redirect_blocked() {
        assert!(guard().check("sed 's/a/b/' in.txt > out.txt").is_some());
    }

    #[test]
    fn test_plain_sed_allowed() {
        assert!(guard().check("sed 's/a/b/' file.txt").is_none());
        assert!(guard().check("sed -n '1,10p' file.txt").is_none());
    }

    #[test]
    fn test_bash_wrapped_still_blocked() {
        assert!(guard().check(r#"bash echo "x" > /tmp/t"#).is_some());
        assert!(guard().check(r#"bash -c 'echo x > /tmp/t'"#).is_some());
        assert!(guard().check(r#"bash -c "sed -i s/a/b/ f.txt""#).is_some());
    }

    #[test]
    fn test_bash_wrapped_harmless_allowed() {
        assert!(guard().check("bash -c 'echo hello'").is_none());
    }

    #[test]
    fn test_rejection_names_the_verbs() {
        let msg = guard().check("echo x > f").unwrap();
        assert!(msg.contains("`write`"));
        assert!(msg.contains("`edit`"));
    }
}
