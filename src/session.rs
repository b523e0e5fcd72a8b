use uuid::Uuid;

/// Identifier scoping the remote conversation. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
}

impl Session {
    /// Uses the configured identifier when present, otherwise a fresh UUID.
    pub fn resolve(configured: Option<&str>) -> Self {
        let id = configured
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_configured_identifier() {
        assert_eq!(Session::resolve(Some(" chat-42 ")).id(), "chat-42");
    }

    #[test]
    fn generates_identifier_when_missing_or_blank() {
        let first = Session::resolve(None);
        let second = Session::resolve(Some("  "));
        assert!(Uuid::parse_str(first.id()).is_ok());
        assert_ne!(first.id(), second.id());
    }
}
