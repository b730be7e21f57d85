use vaultcards_core::config::Provider;

/// Parse provider name from string
pub fn parse_provider(s: &str) -> std::result::Result<Provider, String> {
    s.parse::<Provider>().map_err(|e| e.to_string())
}

/// Parse a strictly positive count
pub fn parse_positive(s: &str) -> std::result::Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("lmstudio").unwrap(), Provider::LmStudio);
        assert!(parse_provider("openai").unwrap_err().contains("ollama"));
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("3").unwrap(), 3);
        assert!(parse_positive("0").is_err());
        assert!(parse_positive("-1").is_err());
    }
}
