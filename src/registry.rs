//! Command registry: which fragment defines which command

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::parser::CommandKind;

/// One registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub command: String,
    pub fragment: String,
    pub kind: CommandKind,
}

/// Maps exposed command names to the fragment that defines them.
///
/// A later registration of the same command replaces the earlier one, the
/// same way a later definition shadows an earlier one in a shell.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: Mutex<BTreeMap<String, RegistryEntry>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, command: &str, fragment: &str, kind: CommandKind) {
        let entry = RegistryEntry {
            command: command.to_string(),
            fragment: fragment.to_string(),
            kind,
        };
        if let Some(previous) = self.lock().insert(command.to_string(), entry) {
            if previous.fragment != fragment {
                debug!(
                    "Command '{}' now provided by '{}' (was '{}')",
                    command, fragment, previous.fragment
                );
            }
        }
    }

    /// Name of the fragment that defines `command`.
    pub fn lookup(&self, command: &str) -> Option<String> {
        self.lock().get(command).map(|e| e.fragment.clone())
    }

    pub fn entry(&self, command: &str) -> Option<RegistryEntry> {
        self.lock().get(command).cloned()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.lock().contains_key(command)
    }

    /// Commands currently attributed to `fragment`, sorted by name.
    pub fn commands_for(&self, fragment: &str) -> Vec<RegistryEntry> {
        self.lock()
            .values()
            .filter(|e| e.fragment == fragment)
            .cloned()
            .collect()
    }

    /// All entries sorted by command name.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.lock().values().cloned().collect()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, RegistryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
