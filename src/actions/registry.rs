// ABOUTME: Registry mapping action references to registered action implementations
// ABOUTME: Supports explicit registration, callback discovery and pinned `name@version` lookups

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::descriptor::ActionDescriptor;
use super::error::RegistryError;
use super::shell::ShellAction;
use super::Action;

/// Package name for actions whose name has no `/` prefix.
pub const CORE_PACKAGE: &str = "core";

pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

/// A parsed `name` or `name@version` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReference<'a> {
    pub name: &'a str,
    pub version: Option<&'a str>,
}

impl<'a> ActionReference<'a> {
    pub fn parse(reference: &'a str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (name, version) = match reference.split_once('@') {
            Some((name, version)) => {
                if version.is_empty() {
                    return Err(invalid("version after '@' is empty"));
                }
                if version.contains('@') {
                    return Err(invalid("more than one '@'"));
                }
                (name, Some(version))
            }
            None => (reference, None),
        };

        if name.trim().is_empty() {
            return Err(invalid("action name is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("action name contains whitespace"));
        }

        Ok(Self { name, version })
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// A registry with the built-in actions already registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .actions
            .insert(super::SHELL_ACTION.to_string(), Arc::new(ShellAction::new()));
        registry
    }

    /// Register `action` under its declared name.
    ///
    /// Registering an identical definition again is a no-op; a different
    /// definition under the same name is a conflict.
    pub fn register(&mut self, action: Arc<dyn Action>) -> Result<bool, RegistryError> {
        let incoming = action.descriptor();
        ActionReference::parse(&incoming.name)?;

        if let Some(existing) = self.actions.get(&incoming.name) {
            let existing = existing.descriptor();
            if existing == incoming {
                debug!("Action '{}' already registered, skipping", incoming);
                return Ok(false);
            }
            return Err(RegistryError::Conflict {
                name: incoming.name.clone(),
                existing: existing.summary(),
                incoming: incoming.summary(),
            });
        }

        debug!("Registered action {}", incoming);
        let name = incoming.name.clone();
        self.actions.insert(name, action);
        Ok(true)
    }

    /// Register every action produced by `discovery`.
    ///
    /// All conflicts are collected; actions that registered cleanly stay
    /// registered. Returns how many new actions were added.
    pub fn discover<F, I>(&mut self, discovery: F) -> Result<usize, RegistryError>
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = Arc<dyn Action>>,
    {
        let mut added = 0;
        let mut errors = Vec::new();

        for action in discovery() {
            match self.register(action) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Discovery conflict: {}", e);
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            debug!("Discovered {} new actions", added);
            Ok(added)
        } else {
            Err(RegistryError::Discovery(errors))
        }
    }

    /// Look up an action by `name` or `name@version`.
    pub fn resolve(&self, reference: &str) -> Result<Arc<dyn Action>, RegistryError> {
        let parsed = ActionReference::parse(reference)?;
        let not_found = || RegistryError::NotFound {
            reference: reference.to_string(),
        };

        let action = self.actions.get(parsed.name).ok_or_else(not_found)?;
        if let Some(version) = parsed.version {
            if action.descriptor().version != version {
                return Err(not_found());
            }
        }
        Ok(Arc::clone(action))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.resolve(reference).is_ok()
    }

    /// Descriptors of every registered action, sorted by name.
    pub fn list_actions(&self) -> Vec<&ActionDescriptor> {
        let mut descriptors: Vec<&ActionDescriptor> =
            self.actions.values().map(|a| a.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Descriptors grouped by the package prefix of their name (`pkg/action`).
    pub fn actions_by_package(&self) -> BTreeMap<String, Vec<&ActionDescriptor>> {
        let mut packages: BTreeMap<String, Vec<&ActionDescriptor>> = BTreeMap::new();
        for descriptor in self.list_actions() {
            let package = match descriptor.name.split_once('/') {
                Some((package, _)) => package.to_string(),
                None => CORE_PACKAGE.to_string(),
            };
            packages.entry(package).or_default().push(descriptor);
        }
        packages
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field(
                "actions",
                &self.list_actions().iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
