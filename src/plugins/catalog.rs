use std::collections::BTreeSet;
use std::sync::Arc;

use super::{CheckAcls, Plugin, PluginError};
use crate::config::ResolvedConfig;
use crate::hooks::HookRegistry;

/// Separator of qualified plugin names such as `githooks::CheckAcls`.
pub const NAMESPACE_SEP: &str = "::";

/// Last component of a possibly qualified plugin name.
pub fn short_name(name: &str) -> &str {
    name.rsplit(NAMESPACE_SEP).next().unwrap_or(name)
}

/// Plugins that configuration may enable.
pub struct PluginCatalog {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PluginCatalog {
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            plugins: vec![Arc::new(CheckAcls)],
        }
    }

    pub fn add(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(PluginError::InvalidName {
                name: name.to_string(),
                reason: "must be a single non-empty word".into(),
            });
        }
        if name.contains(NAMESPACE_SEP) {
            return Err(PluginError::InvalidName {
                name: name.to_string(),
                reason: format!("must not contain '{}'", NAMESPACE_SEP),
            });
        }
        if self.contains(name) {
            return Err(PluginError::DuplicateName {
                name: name.to_string(),
            });
        }
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn with_plugin<P: Plugin + 'static>(mut self, plugin: P) -> Result<Self, PluginError> {
        self.add(Arc::new(plugin))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        let name = short_name(name);
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// `githooks.plugin` values, whitespace separated, in first-seen order.
    pub fn enabled_names(config: &ResolvedConfig) -> Vec<String> {
        let mut seen = BTreeSet::new();
        config
            .get_all("githooks", None, "plugin")
            .iter()
            .flat_map(|value| value.split_whitespace())
            .map(short_name)
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// `githooks.disable` values plus every known or enabled plugin whose
    /// environment variable is `0`.
    pub fn disabled_names(&self, config: &ResolvedConfig) -> BTreeSet<String> {
        let env = config.env();
        let mut disabled: BTreeSet<String> = config
            .get_all("githooks", None, "disable")
            .iter()
            .flat_map(|value| value.split_whitespace())
            .map(|name| short_name(name).to_string())
            .collect();

        let candidates = self
            .names()
            .into_iter()
            .map(str::to_string)
            .chain(Self::enabled_names(config));
        disabled.extend(candidates.filter(|name| env.disables(name)));
        disabled
    }

    /// Registers every enabled, not disabled plugin. Returns their names.
    pub fn load(
        &self,
        registry: &mut HookRegistry,
        config: &ResolvedConfig,
    ) -> crate::Result<Vec<String>> {
        let disabled = self.disabled_names(config);
        let mut loaded = Vec::new();

        for name in Self::enabled_names(config) {
            if disabled.contains(&name) {
                tracing::debug!(plugin = %name, "Plugin disabled");
                continue;
            }
            let plugin = self
                .get(&name)
                .ok_or_else(|| PluginError::Unknown { name: name.clone() })?;
            plugin.register(registry, config)?;
            tracing::debug!(plugin = %name, "Plugin loaded");
            loaded.push(name);
        }

        Ok(loaded)
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigEntry, ConfigKey, ConfigScope};
    use crate::environment::EnvSnapshot;
    use crate::hooks::{HookOutput, HookPhase};

    struct Echo(&'static str);

    impl Plugin for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn register(&self, registry: &mut HookRegistry, _: &ResolvedConfig) -> crate::Result<()> {
            registry.register_fn(HookPhase::PreCommit, self.0, |_, _| Ok(HookOutput::pass()))
        }
    }

    fn config(values: &[(&str, &str)], env: EnvSnapshot) -> ResolvedConfig {
        let entries: Vec<ConfigEntry> = values
            .iter()
            .map(|(k, v)| ConfigEntry::new(ConfigScope::Local, ConfigKey::parse(k).unwrap(), *v))
            .collect();
        ResolvedConfig::from_entries(entries, env, ".")
    }

    fn catalog() -> PluginCatalog {
        PluginCatalog::builtin()
            .with_plugin(Echo("Alpha"))
            .unwrap()
            .with_plugin(Echo("Beta"))
            .unwrap()
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("githooks::CheckAcls"), "CheckAcls");
        assert_eq!(short_name("CheckAcls"), "CheckAcls");
    }

    #[test]
    fn test_add_rejects_bad_names() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.add(Arc::new(Echo("Alpha"))),
            Err(PluginError::DuplicateName { .. })
        ));
        assert!(matches!(
            catalog.add(Arc::new(Echo("a::b"))),
            Err(PluginError::InvalidName { .. })
        ));
        assert!(matches!(
            catalog.add(Arc::new(Echo(""))),
            Err(PluginError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_load_enabled_in_order() {
        let config = config(
            &[
                ("githooks.plugin", "Beta githooks::Alpha"),
                ("githooks.plugin", "Beta"),
            ],
            EnvSnapshot::empty(),
        );
        let mut registry = HookRegistry::new();
        let loaded = catalog().load(&mut registry, &config).unwrap();
        assert_eq!(loaded, vec!["Beta", "Alpha"]);
        assert_eq!(registry.handler_names(), vec!["Beta", "Alpha"]);
    }

    #[test]
    fn test_disabled_by_config_and_env() {
        let config = config(
            &[
                ("githooks.plugin", "Alpha Beta CheckAcls"),
                ("githooks.disable", "Alpha"),
            ],
            EnvSnapshot::empty().with_var("Beta", "0").with_var("CheckAcls", "1"),
        );
        let catalog = catalog();
        let disabled = catalog.disabled_names(&config);
        assert!(disabled.contains("Alpha"));
        assert!(disabled.contains("Beta"));
        assert!(!disabled.contains("CheckAcls"));

        let mut registry = HookRegistry::new();
        let loaded = catalog.load(&mut registry, &config).unwrap();
        assert_eq!(loaded, vec!["CheckAcls"]);
    }

    #[test]
    fn test_unknown_plugin() {
        let config = config(&[("githooks.plugin", "CheckJira")], EnvSnapshot::empty());
        let err = catalog()
            .load(&mut HookRegistry::new(), &config)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Plugin(PluginError::Unknown { .. })
        ));
    }

    #[test]
    fn test_disabled_unknown_plugin_is_not_an_error() {
        let config = config(
            &[("githooks.plugin", "CheckJira")],
            EnvSnapshot::empty().with_var("CheckJira", "0"),
        );
        let loaded = catalog().load(&mut HookRegistry::new(), &config).unwrap();
        assert!(loaded.is_empty());
    }
}
