//! Known keys recognised in params scripts

/// Internal name under which the propagated-parameters bucket is stored,
/// whichever alias the document used.
pub const PROPAGATED_KEY: &str = "cloud_propagated";

/// Optional cloud name key. Matched case-insensitively.
pub const CLOUD_KEY: &str = "cloud";

/// A required onboarding field: internal source key and external label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    pub key: &'static str,
    pub label: &'static str,
}

impl RequiredField {
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self { key, label }
    }
}

pub const TENANT_ID: RequiredField = RequiredField::new("tenant_id", "OrgId");
pub const SUBSCRIPTION_ID: RequiredField = RequiredField::new("subscription_id", "SubscriptionId");
pub const SERVICE_PRINCIPAL_ID: RequiredField =
    RequiredField::new("service_principal_id", "ServicePrincipalId");
pub const AUTH_TYPE: RequiredField = RequiredField::new("authType", "AuthType");
pub const LOCATION: RequiredField = RequiredField::new("azurelocation", "Location");
pub const CORRELATION_ID: RequiredField = RequiredField::new("correlationId", "CorrelationId");

/// Required onboarding fields in payload order. Labels are the payload's
/// field names.
pub const MDE_REQUIRED: [RequiredField; 6] = [
    TENANT_ID,
    SUBSCRIPTION_ID,
    SERVICE_PRINCIPAL_ID,
    AUTH_TYPE,
    LOCATION,
    CORRELATION_ID,
];

/// The set of variable names both extractors look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    required: Vec<RequiredField>,
    cloud: &'static str,
    aliases: Vec<&'static str>,
}

impl KeySet {
    pub fn new(
        required: Vec<RequiredField>,
        cloud: &'static str,
        aliases: Vec<&'static str>,
    ) -> Self {
        Self {
            required,
            cloud,
            aliases,
        }
    }

    /// Defender for Endpoint onboarding keys.
    pub fn mde() -> Self {
        Self::new(
            MDE_REQUIRED.to_vec(),
            CLOUD_KEY,
            vec![
                "cloudPropagatedParameters",
                "cloud_propagated_parameters",
                PROPAGATED_KEY,
                "propagated_parameters",
                "propagatedParams",
            ],
        )
    }

    pub fn required(&self) -> &[RequiredField] {
        &self.required
    }

    pub fn aliases(&self) -> &[&'static str] {
        &self.aliases
    }

    pub fn cloud(&self) -> &'static str {
        self.cloud
    }

    /// Keys holding a single scalar: every required key plus `cloud`.
    pub fn scalar_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required
            .iter()
            .map(|f| f.key)
            .chain(std::iter::once(self.cloud))
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains(&name)
    }

    /// Classify an assignment target, returning the internal key to store
    /// under. `None` for names that are not of interest.
    pub fn classify(&self, name: &str) -> Option<KeyKind> {
        if self.is_alias(name) {
            return Some(KeyKind::Alias);
        }
        if name.eq_ignore_ascii_case(self.cloud) {
            return Some(KeyKind::Scalar(self.cloud));
        }
        self.required
            .iter()
            .find(|f| f.key == name)
            .map(|f| KeyKind::Scalar(f.key))
    }
}

impl Default for KeySet {
    fn default() -> Self {
        Self::mde()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Scalar(&'static str),
    Alias,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mde_keys() {
        let keys = KeySet::mde();
        assert_eq!(keys.required().len(), 6);
        assert_eq!(keys.aliases().len(), 5);
        assert_eq!(keys.scalar_keys().count(), 7);
        assert!(keys.is_alias(PROPAGATED_KEY));
    }

    #[test]
    fn test_classify_is_case_sensitive_except_cloud() {
        let keys = KeySet::mde();
        assert_eq!(
            keys.classify("tenant_id"),
            Some(KeyKind::Scalar("tenant_id"))
        );
        assert_eq!(keys.classify("TENANT_ID"), None);
        assert_eq!(keys.classify("authtype"), None);
        assert_eq!(keys.classify("Cloud"), Some(KeyKind::Scalar("cloud")));
        assert_eq!(keys.classify("CLOUD"), Some(KeyKind::Scalar("cloud")));
        assert_eq!(keys.classify("propagatedParams"), Some(KeyKind::Alias));
        assert_eq!(keys.classify("other"), None);
    }
}
