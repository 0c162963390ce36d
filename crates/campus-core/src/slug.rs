use deunicode::deunicode;

/// Slug used for new ids: transliterated, decamelized, lowercase, hyphen separated.
pub fn slugify(input: &str) -> String {
    slugify_with(input, &[])
}

/// Like [`slugify`], but characters in `preserve` survive as-is (e.g. `.` for file names).
pub fn slugify_with(input: &str, preserve: &[char]) -> String {
    let ascii = deunicode(&input.replace('&', " and "));
    let lower = decamelize(&ascii).to_lowercase();

    let mut out = String::with_capacity(lower.len());
    let mut pending_separator = false;
    for ch in lower.chars() {
        let alphanumeric = ch.is_ascii_alphanumeric();
        if alphanumeric || preserve.contains(&ch) {
            // no hyphen next to a preserved character
            let after_alphanumeric = out.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
            if pending_separator && alphanumeric && after_alphanumeric {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch);
        } else {
            pending_separator = true;
        }
    }
    out
}

fn decamelize(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    for (i, &ch) in chars.iter().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            // fooBar -> foo Bar, XMLParser -> XML Parser
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push(' ');
            }
        }
        out.push(ch);
    }
    out
}
