use serde::{Deserialize, Serialize};

/// Optional per-request filters. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_login_type(mut self, value: impl Into<String>) -> Self {
        self.login_type = Some(value.into());
        self
    }

    pub fn with_user_id(mut self, value: impl Into<String>) -> Self {
        self.user_id = Some(value.into());
        self
    }

    pub fn with_user_ip(mut self, value: impl Into<String>) -> Self {
        self.user_ip = Some(value.into());
        self
    }

    pub fn with_segment(mut self, value: impl Into<String>) -> Self {
        self.segment = Some(value.into());
        self
    }

    pub fn with_user_type(mut self, value: impl Into<String>) -> Self {
        self.user_type = Some(value.into());
        self
    }

    /// Trimmed copy with blank values dropped.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            login_type: clean(&self.login_type),
            user_id: clean(&self.user_id),
            user_ip: clean(&self.user_ip),
            segment: clean(&self.segment),
            user_type: clean(&self.user_type),
        }
    }

    /// Only the fields the summary and comparison views accept.
    pub fn login_scoped(&self) -> Self {
        Self {
            segment: None,
            user_type: None,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        let n = self.normalized();
        n.login_type.is_none()
            && n.user_id.is_none()
            && n.user_ip.is_none()
            && n.segment.is_none()
            && n.user_type.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_drops_blanks() {
        let filters = FilterSet::new()
            .with_login_type("  ")
            .with_user_id(" u-1 ")
            .with_segment("");
        let normalized = filters.normalized();
        assert_eq!(normalized.login_type, None);
        assert_eq!(normalized.user_id.as_deref(), Some("u-1"));
        assert_eq!(normalized.segment, None);
        assert!(!filters.is_empty());
        assert!(FilterSet::new().with_user_ip(" ").is_empty());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let filters: FilterSet =
            serde_json::from_str(r#"{"loginType":"1","userIp":"10.0.0.1"}"#).unwrap();
        assert_eq!(filters.login_type.as_deref(), Some("1"));
        assert_eq!(filters.user_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(filters.user_type, None);
    }
}
