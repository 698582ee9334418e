//! Avatar resolution.
//!
//! An explicit picture URL from the identity provider wins; otherwise a
//! deterministic placeholder is derived from the user's email address.

/// Resolve the avatar URL for a user.
pub fn resolve(picture: Option<&str>, email: &str) -> String {
    match picture {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!("https://avatar.vercel.sh/{email}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_picture_wins() {
        assert_eq!(
            resolve(Some("https://cdn.example/me.png"), "a@b.c"),
            "https://cdn.example/me.png"
        );
    }

    #[test]
    fn falls_back_to_email_placeholder() {
        assert_eq!(resolve(None, "a@b.c"), "https://avatar.vercel.sh/a@b.c");
        assert_eq!(resolve(Some(""), "a@b.c"), "https://avatar.vercel.sh/a@b.c");
    }
}
