//! Configuration source trait

use super::ConfigEntry;

/// A layer of configuration entries.
///
/// Sources are read exactly once per invocation by the
/// [`ConfigLoader`](super::ConfigLoader). An unreadable source fails with
/// [`Error::ConfigSource`](crate::Error::ConfigSource).
#[async_trait::async_trait]
pub trait ConfigSource: Send + Sync {
    /// Source name for logging and error messages
    fn name(&self) -> &str;

    /// All entries of this source in definition order
    async fn entries(&self) -> crate::Result<Vec<ConfigEntry>>;
}
