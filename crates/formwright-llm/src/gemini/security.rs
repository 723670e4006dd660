//! Error message sanitizing for Gemini responses

/// Strip credential and quota details from a Gemini error before it is
/// logged or stored.
pub(crate) fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("permission denied")
    {
        return "API authentication error. Check GEMINI_API_KEY.".to_string();
    }

    if lower.contains("quota") || lower.contains("resource_exhausted") {
        return "API quota exhausted.".to_string();
    }

    if error.len() > 300 {
        format!("{}...(truncated)", crate::util::truncate_safe(error, 300))
    } else {
        error.to_string()
    }
}
