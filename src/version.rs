//! Build identification for the CLI, the startup log and the `Server` header.

/// `SCRAPEWATCH_VERSION` from the release build environment, else the crate version.
pub const VERSION: &str = match option_env!("SCRAPEWATCH_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// [`VERSION`] without the leading `v` a git tag carries.
pub fn release() -> &'static str {
    normalize(VERSION)
}

fn normalize(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => raw,
    }
}

/// `scrapewatch/<release>`.
pub fn banner() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), release())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_prefix_is_dropped() {
        assert_eq!(normalize("v1.4.0"), "1.4.0");
        assert_eq!(normalize(" V2.0.1-rc1 "), "2.0.1-rc1");
        assert_eq!(normalize("0.1.0"), "0.1.0");
        assert_eq!(normalize("vnext"), "vnext");
    }

    #[test]
    fn test_banner_names_the_crate() {
        let banner = banner();
        assert!(banner.starts_with("scrapewatch/"));
        assert!(!banner.ends_with('/'));
    }
}
