#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Unknown plugin '{name}'")]
    Unknown { name: String },

    #[error("Duplicate plugin name '{name}'")]
    DuplicateName { name: String },

    #[error("Invalid plugin name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::Unknown {
            name: "CheckJira".into(),
        };
        assert_eq!(err.to_string(), "Unknown plugin 'CheckJira'");

        let err = PluginError::DuplicateName {
            name: "CheckAcls".into(),
        };
        assert!(err.to_string().contains("CheckAcls"));

        let err = PluginError::InvalidName {
            name: "bad name".into(),
            reason: "contains whitespace".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bad name"));
        assert!(msg.contains("whitespace"));
    }

    #[test]
    fn test_crate_error_conversion() {
        let err: crate::Error = PluginError::Unknown { name: "X".into() }.into();
        assert!(matches!(err, crate::Error::Plugin(_)));
    }
}
