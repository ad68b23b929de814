//! Positional parameter substitution into command templates.

/// Substitute `$0`..`$9` placeholders in a command template.
///
/// `params[0]` is bound to the resolved sender callsign, `params[1..]` to
/// the message tokens after the command code. Every `$N` with a matching
/// parameter is replaced everywhere it occurs; any `$N` still present
/// afterwards means the sender supplied too few tokens, reported through
/// the returned flag. Pure function.
pub fn render(template: &str, params: &[String]) -> (String, bool) {
    let mut rendered = template.to_string();

    for (index, value) in params.iter().enumerate().take(10) {
        let placeholder = format!("${}", index);
        rendered = rendered.replace(&placeholder, value);
    }

    let missing = first_unresolved_placeholder(&rendered).is_some();
    (rendered, missing)
}

/// The first `$N` token (N = 0..9) still present in a rendered string.
pub fn first_unresolved_placeholder(rendered: &str) -> Option<String> {
    let bytes = rendered.as_bytes();
    bytes
        .windows(2)
        .position(|w| w[0] == b'$' && w[1].is_ascii_digit())
        .map(|pos| String::from_utf8_lossy(&bytes[pos..pos + 2]).into_owned())
}
