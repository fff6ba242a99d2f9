// Key rules shared by flags and the workspace/project/environment hierarchy.

const MAX_KEY_LEN: usize = 64;

fn validate_key(key: &str, label: &str) -> Result<(), String> {
    let first = match key.chars().next() {
        Some(c) => c,
        None => return Err(format!("{} key cannot be empty", label)),
    };

    if key.len() > MAX_KEY_LEN {
        return Err(format!(
            "{} key is too long (Max: {} characters)",
            label, MAX_KEY_LEN
        ));
    }

    if !first.is_ascii_alphabetic() {
        return Err(format!("{} key must start with a letter", label));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(format!(
            "{} key can only contain lowercase letters, numbers, underscores, and hyphens",
            label
        ));
    }

    Ok(())
}

/// Validate a flag key
pub fn validate_flag_key(key: &str) -> Result<(), String> {
    validate_key(key, "Flag")
}

/// Validate a workspace, project or environment key
pub fn validate_resource_key(key: &str) -> Result<(), String> {
    validate_key(key, "Resource")
}
