//! Command line splitting.
//!
//! Launch configurations carry one command line string, the form
//! `CreateProcessW` consumes directly. Backends that need an argv (Unix) split
//! it here with the same rules `CommandLineToArgvW` applies, so a command line
//! means the same thing on every host.

/// Split a command line into program and arguments.
///
/// The program name ends at the first unquoted blank, and quotes in it only
/// delimit. In arguments, `2n` backslashes before a quote yield `n` backslashes
/// and toggle quoting, `2n + 1` yield `n` backslashes and a literal quote, and
/// `""` inside a quoted run is a literal quote.
pub fn split(command_line: &str) -> Vec<String> {
    let mut argv = Vec::new();
    let mut chars = command_line
        .trim_start_matches(is_blank)
        .chars()
        .peekable();

    // Program name
    let mut program = String::new();
    let mut quoted = false;
    for c in chars.by_ref() {
        match c {
            '"' => quoted = !quoted,
            c if is_blank(c) && !quoted => break,
            c => program.push(c),
        }
    }
    if program.is_empty() && chars.peek().is_none() {
        return argv;
    }
    argv.push(program);

    // Arguments
    loop {
        while chars.peek().copied().is_some_and(is_blank) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut arg = String::new();
        let mut quoted = false;
        while let Some(&c) = chars.peek() {
            match c {
                '\\' => {
                    let mut slashes = 0usize;
                    while chars.peek() == Some(&'\\') {
                        chars.next();
                        slashes += 1;
                    }
                    if chars.peek() == Some(&'"') {
                        arg.extend(std::iter::repeat('\\').take(slashes / 2));
                        if slashes % 2 == 1 {
                            arg.push('"');
                            chars.next();
                        }
                    } else {
                        arg.extend(std::iter::repeat('\\').take(slashes));
                    }
                }
                '"' => {
                    chars.next();
                    if quoted && chars.peek() == Some(&'"') {
                        arg.push('"');
                        chars.next();
                    } else {
                        quoted = !quoted;
                    }
                }
                c if is_blank(c) && !quoted => break,
                c => {
                    arg.push(c);
                    chars.next();
                }
            }
        }
        argv.push(arg);
    }

    argv
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words() {
        assert_eq!(split("echo hello world"), vec!["echo", "hello", "world"]);
        assert_eq!(split("  echo\t hello  "), vec!["echo", "hello"]);
    }

    #[test]
    fn test_empty() {
        assert!(split("").is_empty());
        assert!(split("   ").is_empty());
    }

    #[test]
    fn test_quoted_program_with_spaces() {
        assert_eq!(
            split(r#""C:\Program Files\tool.exe" -v"#),
            vec![r"C:\Program Files\tool.exe", "-v"]
        );
    }

    #[test]
    fn test_quoted_argument() {
        assert_eq!(
            split(r#"sh -c "sleep 1; echo 'done'""#),
            vec!["sh", "-c", "sleep 1; echo 'done'"]
        );
        assert_eq!(split(r#"tool "" x"#), vec!["tool", "", "x"]);
    }

    #[test]
    fn test_backslash_rules() {
        // literal backslashes when no quote follows
        assert_eq!(split(r"tool a\\b c\d"), vec!["tool", r"a\\b", r"c\d"]);
        // 2n backslashes + quote: n backslashes, quote toggles
        assert_eq!(split(r#"tool "a\\" b"#), vec!["tool", r"a\", "b"]);
        // 2n+1 backslashes + quote: n backslashes, literal quote
        assert_eq!(split(r#"tool a\"b"#), vec!["tool", r#"a"b"#]);
        assert_eq!(split(r#"tool a\\\"b"#), vec!["tool", r#"a\"b"#]);
    }

    #[test]
    fn test_doubled_quote_inside_quotes() {
        assert_eq!(split(r#"tool "a""b" c"#), vec!["tool", r#"a"b"#, "c"]);
    }
}
