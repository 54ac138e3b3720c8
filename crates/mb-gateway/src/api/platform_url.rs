//! Platform-specific meeting URL construction, keyed off the validated
//! shapes each platform's native id and passcode actually take.

use mb_domain::Platform;
use regex::Regex;
use std::sync::OnceLock;

fn google_meet_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{3}-[a-z]{4}-[a-z]{3}$").expect("valid regex"))
}

fn zoom_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{9,11}$").expect("valid regex"))
}

/// Builds the URL the launched bot navigates to. Returns `None` when the
/// `(platform, native_id)` pair doesn't match the platform's known id
/// shape, which the caller turns into a 422.
pub fn build_meeting_url(platform: Platform, native_id: &str, passcode: Option<&str>) -> Option<String> {
    match platform {
        Platform::GoogleMeet => {
            if !google_meet_id_re().is_match(native_id) {
                return None;
            }
            Some(format!("https://meet.google.com/{native_id}"))
        }
        Platform::Zoom => {
            if !zoom_id_re().is_match(native_id) {
                return None;
            }
            match passcode {
                Some(pwd) if !pwd.is_empty() => {
                    Some(format!("https://zoom.us/j/{native_id}?pwd={pwd}"))
                }
                _ => Some(format!("https://zoom.us/j/{native_id}")),
            }
        }
        Platform::Teams => {
            if native_id.is_empty() {
                return None;
            }
            // Teams URLs are accepted verbatim from the caller's native id;
            // the only validation is that it's non-empty.
            Some(native_id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_meet_builds_expected_url() {
        let url = build_meeting_url(Platform::GoogleMeet, "abc-defg-hij", None);
        assert_eq!(url.as_deref(), Some("https://meet.google.com/abc-defg-hij"));
    }

    #[test]
    fn google_meet_rejects_malformed_id() {
        assert!(build_meeting_url(Platform::GoogleMeet, "not-a-meeting-code", None).is_none());
        assert!(build_meeting_url(Platform::GoogleMeet, "", None).is_none());
    }

    #[test]
    fn zoom_builds_url_without_passcode() {
        let url = build_meeting_url(Platform::Zoom, "123456789", None);
        assert_eq!(url.as_deref(), Some("https://zoom.us/j/123456789"));
    }

    #[test]
    fn zoom_builds_url_with_passcode() {
        let url = build_meeting_url(Platform::Zoom, "123456789", Some("abc123"));
        assert_eq!(url.as_deref(), Some("https://zoom.us/j/123456789?pwd=abc123"));
    }

    #[test]
    fn zoom_rejects_non_numeric_id() {
        assert!(build_meeting_url(Platform::Zoom, "not-numbers", None).is_none());
    }

    #[test]
    fn teams_accepts_nonempty_id_verbatim() {
        let url = build_meeting_url(
            Platform::Teams,
            "https://teams.live.com/meet/9398850880426",
            None,
        );
        assert_eq!(url.as_deref(), Some("https://teams.live.com/meet/9398850880426"));
    }

    #[test]
    fn teams_rejects_empty_id() {
        assert!(build_meeting_url(Platform::Teams, "", None).is_none());
    }
}
