// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Static token-limit catalog.
//!
//! Context windows for the models the runtime is commonly pointed at.
//! Unknown models fall back to [`DEFAULT_TOKEN_LIMIT`]; backends that know
//! better can ignore this table entirely.

/// Context window assumed for models missing from the table.
pub const DEFAULT_TOKEN_LIMIT: u64 = 131_072;

/// Context window (input tokens) for `model`.
pub fn token_limit(model: &str) -> u64 {
    match model {
        m if m.starts_with("gemini-1.5-pro") => 2_097_152,
        m if m.starts_with("gemini-1.5-flash")
            || m.starts_with("gemini-2.0-flash")
            || m.starts_with("gemini-2.5-pro")
            || m.starts_with("gemini-2.5-flash") =>
        {
            1_048_576
        }
        m if m.starts_with("claude-") => 200_000,
        m if m.starts_with("gpt-4o") || m.starts_with("gpt-4.1") => 128_000,
        _ => DEFAULT_TOKEN_LIMIT,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_use_catalog_windows() {
        assert_eq!(token_limit("gemini-1.5-pro"), 2_097_152);
        assert_eq!(token_limit("gemini-2.5-pro"), 1_048_576);
        assert_eq!(token_limit("claude-sonnet-4-5"), 200_000);
        assert_eq!(token_limit("gpt-4o-mini"), 128_000);
    }

    #[test]
    fn unknown_model_uses_default() {
        assert_eq!(token_limit("mystery-model"), DEFAULT_TOKEN_LIMIT);
    }

    #[test]
    fn version_suffixes_match_prefix() {
        assert_eq!(token_limit("gemini-2.0-flash-001"), 1_048_576);
    }
}
