//! Shell quoting for values interpolated into remote commands
//!
//! Every value that crosses the shell-execution boundary and did not come
//! from a trusted constant must pass through [`quote`] (or be rejected by
//! `utils::validate` first). This is a hard security invariant.

/// Single-quote a string for POSIX shells.
///
/// Wraps the value in single quotes and rewrites embedded single quotes
/// as `'\''`, so the result is always a single shell word with no
/// expansion of any kind.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}
