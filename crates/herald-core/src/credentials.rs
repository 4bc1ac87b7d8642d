//! Credential gate: presence check for the externally-managed session
//! artifact, plus operator phone-number handling for the pairing path.

use std::{
    fs,
    path::Path,
    sync::LazyLock,
};

use regex::Regex;

use crate::Result;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+\d{7,15}$").unwrap()
});

/// Report whether a session artifact exists at `session_file`, creating its
/// containing directory on first use. Content is opaque to the host.
pub fn has_credential(session_file: &Path) -> Result<bool> {
    if let Some(dir) = session_file.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(session_file.exists())
}

/// Normalize an operator-supplied phone number.
///
/// Keeps digits only, applies the regional mobile rewrite (a `52` country
/// code without the `1` mobile marker and 12+ digits gets the `1` inserted),
/// and always returns a `+`-prefixed number.
pub fn normalize_phone_number(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with("52") && !digits.starts_with("521") && digits.len() >= 12 {
        digits.insert(2, '1');
    }
    format!("+{digits}")
}

/// Accepts exactly `+` followed by 7 to 15 digits.
pub fn is_valid_phone_number(s: &str) -> bool {
    PHONE_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn normalization_keeps_already_clean_numbers() {
        assert_eq!(normalize_phone_number("+5219992095479"), "+5219992095479");
    }

    #[test]
    fn normalization_prepends_plus() {
        assert_eq!(normalize_phone_number("5219992095479"), "+5219992095479");
        assert_eq!(normalize_phone_number("9992095479"), "+9992095479");
    }

    #[test]
    fn normalization_inserts_mobile_marker_for_bare_country_code() {
        // 52-prefixed, no 1 marker, 12 digits.
        assert_eq!(normalize_phone_number("529992095479"), "+5219992095479");
        // Too short for the rewrite: left alone.
        assert_eq!(normalize_phone_number("5299920954"), "+5299920954");
    }

    #[test]
    fn normalization_strips_noise_characters() {
        assert_eq!(normalize_phone_number("+52 (199) 920-9547 9"), "+5219992095479");
    }

    #[test]
    fn validation_accepts_plus_and_digits_only() {
        assert!(is_valid_phone_number("+5219992095479"));
        assert!(is_valid_phone_number("+1234567"));
        assert!(!is_valid_phone_number("12345"));
        assert!(!is_valid_phone_number("+12345"));
        assert!(!is_valid_phone_number("+abc1234567"));
        assert!(!is_valid_phone_number("+1234567890123456"));
    }

    #[test]
    fn has_credential_creates_dir_and_checks_file() {
        let root = PathBuf::from(format!("/tmp/herald-creds-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);

        let session_file = root.join("auth").join("creds.json");
        assert!(!has_credential(&session_file).unwrap());
        // Directory was created, calling again is fine.
        assert!(session_file.parent().unwrap().is_dir());
        assert!(!has_credential(&session_file).unwrap());

        fs::write(&session_file, "{}").unwrap();
        assert!(has_credential(&session_file).unwrap());

        let _ = fs::remove_dir_all(&root);
    }
}
