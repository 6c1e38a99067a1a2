//! Command line splitting
//!
//! Registry values such as `Run` entries hold whole command lines
//! (`"C:\Program Files\x.exe" /quiet`). The path candidate is found by
//! splitting with the Windows `CommandLineToArgvW` rules: whitespace separates
//! arguments, double quotes group, `2n` backslashes before a quote yield `n`
//! backslashes and an active quote, `2n+1` yield `n` backslashes and a literal
//! quote; other backslashes are literal.

pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut backslashes = 0usize;

    for c in line.chars() {
        match c {
            '\\' => {
                backslashes += 1;
                has_token = true;
            }
            '"' => {
                current.extend(std::iter::repeat('\\').take(backslashes / 2));
                if backslashes % 2 == 1 {
                    current.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
                backslashes = 0;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                current.extend(std::iter::repeat('\\').take(backslashes));
                backslashes = 0;
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.extend(std::iter::repeat('\\').take(backslashes));
                backslashes = 0;
                current.push(c);
                has_token = true;
            }
        }
    }
    current.extend(std::iter::repeat('\\').take(backslashes));
    if has_token {
        args.push(current);
    }
    args
}
