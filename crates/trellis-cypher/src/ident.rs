//! Identifier checks for names interpolated into statement text

/// Variables, labels, relationship types, property and parameter names
pub(crate) fn check(kind: &str, name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("invalid {} `{}`", kind, name))
    }
}
