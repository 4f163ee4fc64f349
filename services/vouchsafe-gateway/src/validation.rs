//! Input checks for the public request endpoint

use reqwest::Url;

/// Validates an email address format.
///
/// Email addresses must:
/// - Not contain whitespace or control characters
/// - Have exactly one '@' character
/// - Have non-empty local and domain parts
/// - Have at least one dot in the domain part, not at its start or end
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email cannot be empty".to_string());
    }

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("email cannot contain whitespace".to_string());
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err("email must contain an '@' character".to_string()),
    };

    if local.is_empty() {
        return Err("email local part cannot be empty".to_string());
    }

    if domain.is_empty() || domain.contains('@') {
        return Err("email domain must be non-empty and contain no '@'".to_string());
    }

    if !domain.contains('.') {
        return Err("email domain must contain at least one dot".to_string());
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err("email domain has a misplaced dot".to_string());
    }

    Ok(())
}

/// Accept `raw` only as an absolute http(s) URL with a host.
///
/// Returns the trimmed input when it is plain printable ASCII, so the caller's
/// URL is forwarded exactly as given. Anything else comes back in its
/// normalized, percent-encoded form, which is always a valid header value.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    if trimmed.bytes().all(|b| b.is_ascii_graphic()) {
        Some(trimmed.to_string())
    } else {
        Some(url.to_string())
    }
}

/// Like `sanitize_url`, additionally requiring the host to be listed when
/// `allowed_hosts` is non-empty.
pub fn sanitize_redirect(raw: &str, allowed_hosts: &[String]) -> Option<String> {
    let url = sanitize_url(raw)?;
    if allowed_hosts.is_empty() {
        return Some(url);
    }
    let host = Url::parse(&url).ok()?.host_str()?.to_ascii_lowercase();
    allowed_hosts
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&host))
        .then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.co.uk").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "not-an-email",
            "@example.com",
            "user@",
            "user@localhost",
            "user@.example.com",
            "user@example.com.",
            "user@exa..mple.com",
            "us er@example.com",
            "a@b@c.com",
        ] {
            assert!(validate_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn url_must_be_absolute_http() {
        assert_eq!(
            sanitize_url("  https://x.test  ").as_deref(),
            Some("https://x.test")
        );
        assert!(sanitize_url("http://shop.example/thanks?id=1").is_some());
        assert!(sanitize_url("javascript:alert(1)").is_none());
        assert!(sanitize_url("/relative/path").is_none());
        assert!(sanitize_url("ftp://files.example").is_none());
        assert!(sanitize_url("").is_none());
    }

    #[test]
    fn non_ascii_url_is_percent_encoded() {
        let url = sanitize_url("https://shop.example/danke schön").unwrap();
        assert!(url.is_ascii());
        assert!(!url.contains(' '));
        assert!(url.starts_with("https://shop.example/danke%20sch"));
    }

    #[test]
    fn redirect_allow_list() {
        let allowed = vec!["shop.example".to_string()];
        assert!(sanitize_redirect("https://SHOP.example/oops", &allowed).is_some());
        assert!(sanitize_redirect("https://evil.example/", &allowed).is_none());
        assert!(sanitize_redirect("https://anything.test/", &[]).is_some());
    }
}
