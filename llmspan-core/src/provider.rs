use std::fmt;

use serde::{Deserialize, Serialize};

/// Providers recognized from their API endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Azure,
    Anthropic,
    Cohere,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Azure => "azure",
            Self::Anthropic => "anthropic",
            Self::Cohere => "cohere",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ProviderKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<ProviderKind> for String {
    fn from(p: ProviderKind) -> Self {
        p.as_str().to_string()
    }
}

/// Host fragments in priority order; the first match wins.
const HOST_TABLE: &[(&str, ProviderKind)] = &[
    ("generativelanguage.googleapis.com", ProviderKind::Gemini),
    ("api.openai.com", ProviderKind::OpenAi),
    ("openai.azure.com", ProviderKind::Azure),
    ("api.anthropic.com", ProviderKind::Anthropic),
    ("api.cohere.ai", ProviderKind::Cohere),
];

/// Provider for an API endpoint URL by case-insensitive substring match.
/// Unrecognized endpoints (self-hosted, proxies) default to OpenAI, whose wire
/// format they almost always speak.
pub fn detect_provider_from_url(url: &str) -> ProviderKind {
    let url = url.to_ascii_lowercase();
    HOST_TABLE
        .iter()
        .find(|(host, _)| url.contains(host))
        .map(|(_, kind)| *kind)
        .unwrap_or(ProviderKind::OpenAi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_hosts() {
        let cases = [
            (
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                ProviderKind::Gemini,
            ),
            ("https://api.openai.com/v1/chat/completions", ProviderKind::OpenAi),
            (
                "https://my-resource.openai.azure.com/openai/deployments/gpt4/chat/completions",
                ProviderKind::Azure,
            ),
            ("https://api.anthropic.com/v1/messages", ProviderKind::Anthropic),
            ("https://api.cohere.ai/v1/chat", ProviderKind::Cohere),
        ];
        for (url, expected) in cases {
            assert_eq!(detect_provider_from_url(url), expected, "{url}");
        }
    }

    #[test]
    fn match_is_case_insensitive() {
        assert_eq!(
            detect_provider_from_url("HTTPS://GenerativeLanguage.GoogleAPIs.com/v1"),
            ProviderKind::Gemini
        );
    }

    #[test]
    fn unknown_hosts_default_to_openai() {
        assert_eq!(detect_provider_from_url("http://localhost:11434/api/chat"), ProviderKind::OpenAi);
        assert_eq!(detect_provider_from_url(""), ProviderKind::OpenAi);
    }

    #[test]
    fn first_entry_wins_when_two_match() {
        // Contrived: both fragments present, the Gemini entry is checked first.
        let url = "https://generativelanguage.googleapis.com/proxy/api.openai.com";
        assert_eq!(detect_provider_from_url(url), ProviderKind::Gemini);
    }

    #[test]
    fn display_is_canonical_identifier() {
        assert_eq!(ProviderKind::Azure.to_string(), "azure");
        assert_eq!(String::from(ProviderKind::OpenAi), "openai");
    }
}
