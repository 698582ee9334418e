//! Input validation for the public API surface.
//!
//! These rules run on both sides of the wire: the client rejects bad input
//! before any network call or cache mutation, and the server enforces the
//! same rules on every write.

use crate::error::SharedError;
use crate::richtext;

/// Minimum length of a message's plain-text content.
pub const MIN_MESSAGE_CHARS: usize = 2;

/// Channel name length bounds (before normalization).
pub const CHANNEL_NAME_MIN: usize = 2;
pub const CHANNEL_NAME_MAX: usize = 50;

/// Invite display-name bounds.
pub const INVITE_NAME_MIN: usize = 3;
pub const INVITE_NAME_MAX: usize = 80;

/// Validate message content: at least [`MIN_MESSAGE_CHARS`] characters of
/// plain text once rich-text structure is stripped.
pub fn message_content(content: &str) -> Result<(), SharedError> {
    let text = richtext::plain_text(content);
    if text.trim().chars().count() < MIN_MESSAGE_CHARS {
        return Err(SharedError::Validation(format!(
            "Message must be at least {MIN_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

/// Validate an optional attached image URL: http(s) only.
pub fn image_url(url: &str) -> Result<(), SharedError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => Err(SharedError::Validation("Invalid image URL".into())),
    }
}

/// Normalize a channel name: lowercase, whitespace runs become dashes,
/// anything outside `[a-z0-9-]` is stripped, dash runs collapse, and
/// leading/trailing dashes are trimmed.
pub fn normalize_channel_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;

    for c in name.to_lowercase().chars() {
        let mapped = if c.is_whitespace() { '-' } else { c };
        match mapped {
            '-' => {
                if !last_dash && !out.is_empty() {
                    out.push('-');
                    last_dash = true;
                }
            }
            'a'..='z' | '0'..='9' => {
                out.push(mapped);
                last_dash = false;
            }
            _ => {}
        }
    }

    out.trim_end_matches('-').to_string()
}

/// Validate and normalize a channel name.  Returns the normalized form.
pub fn channel_name(name: &str) -> Result<String, SharedError> {
    let len = name.chars().count();
    if len < CHANNEL_NAME_MIN {
        return Err(SharedError::Validation(format!(
            "Channel name must be at least {CHANNEL_NAME_MIN} characters"
        )));
    }
    if len > CHANNEL_NAME_MAX {
        return Err(SharedError::Validation(format!(
            "Channel name must be less than {CHANNEL_NAME_MAX} characters"
        )));
    }

    let normalized = normalize_channel_name(name);
    if normalized.chars().count() < CHANNEL_NAME_MIN {
        return Err(SharedError::Validation(
            "Channel name must be at least 2 characters after normalizing".into(),
        ));
    }

    Ok(normalized)
}

/// Validate a member invite: display name bounds plus a syntactically
/// plausible email (one `@`, non-empty local part, dotted domain).
pub fn invite(name: &str, email: &str) -> Result<(), SharedError> {
    let len = name.chars().count();
    if len < INVITE_NAME_MIN {
        return Err(SharedError::Validation(format!(
            "Name must be at least {INVITE_NAME_MIN} characters"
        )));
    }
    if len > INVITE_NAME_MAX {
        return Err(SharedError::Validation(format!(
            "Name must be less than {INVITE_NAME_MAX} characters"
        )));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(SharedError::Validation("Invalid email address".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_rejected() {
        assert!(message_content("a").is_err());
        assert!(message_content("  ").is_err());
        assert!(message_content("hi").is_ok());
    }

    #[test]
    fn rich_text_content_measured_as_plain_text() {
        // A document whose only text is one character fails even though the
        // serialized JSON is long.
        let doc = r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"x"}]}]}"#;
        assert!(message_content(doc).is_err());
    }

    #[test]
    fn image_urls_must_be_http() {
        assert!(image_url("https://cdn.example/a.png").is_ok());
        assert!(image_url("http://cdn.example/a.png").is_ok());
        assert!(image_url("ftp://cdn.example/a.png").is_err());
        assert!(image_url("https://").is_err());
        assert!(image_url("not a url").is_err());
    }

    #[test]
    fn channel_names_are_normalized() {
        assert_eq!(channel_name("General Chat").unwrap(), "general-chat");
        assert_eq!(channel_name("  Dev -- Ops!  ").unwrap(), "dev-ops");
        assert_eq!(normalize_channel_name("--a--b--"), "a-b");
    }

    #[test]
    fn channel_name_bounds() {
        assert!(channel_name("x").is_err());
        assert!(channel_name(&"x".repeat(51)).is_err());
        // Valid length but nothing survives normalization.
        assert!(channel_name("!!!").is_err());
    }

    #[test]
    fn invite_validation() {
        assert!(invite("Ada", "ada@example.com").is_ok());
        assert!(invite("Al", "al@example.com").is_err());
        assert!(invite("Ada", "not-an-email").is_err());
        assert!(invite("Ada", "a@b").is_err());
    }
}
