//! Completion detection over raw terminal output.
//!
//! Interactive agents draw an input prompt when their turn is over. The
//! detector looks for that prompt in the last few non-empty lines only, so
//! prompt-like text in the middle of a long answer does not count.

/// Number of trailing non-empty lines inspected
pub const INSPECTED_LINES: usize = 5;

/// Returns true when the output ends with the agent's input prompt.
///
/// Pure function of its input: no state, no timing.
pub fn is_awaiting_instruction(text: &str) -> bool {
    let clean = strip_ansi_codes(text);
    clean
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .rev()
        .take(INSPECTED_LINES)
        .any(is_prompt_line)
}

fn is_prompt_line(line: &str) -> bool {
    line == ">" || line.starts_with("> ") || line.contains("? for shortcuts")
}

/// Strip terminal escape sequences and control characters (except `\n` and `\t`)
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => skip_escape_sequence(&mut chars),
            '\n' | '\t' => result.push(c),
            c if c.is_control() => {}
            _ => result.push(c),
        }
    }

    result
}

fn skip_escape_sequence(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    match chars.next() {
        // CSI: parameter and intermediate bytes, then one final byte in '@'..='~'
        Some('[') => {
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
        // OSC / DCS / SOS / PM / APC: string terminated by BEL or ST
        Some(']' | 'P' | 'X' | '^' | '_') => {
            while let Some(c) = chars.next() {
                if c == '\x07' {
                    break;
                }
                if c == '\x1b' {
                    if chars.peek() == Some(&'\\') {
                        chars.next();
                    }
                    break;
                }
            }
        }
        // nF: intermediate bytes then one final byte, e.g. ESC ( B
        Some(c) if (' '..='/').contains(&c) => {
            while let Some(next) = chars.next() {
                if !(' '..='/').contains(&next) {
                    break;
                }
            }
        }
        // Two-character sequences (ESC 7, ESC =, ...) or a dangling ESC
        _ => {}
    }
}
