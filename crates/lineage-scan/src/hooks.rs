//! Hook-site selection
//!
//! A hook site is a public method of a qualifying class whose name and
//! descriptor match the configured hook method. The byte-code transform
//! inserts its entry call at each site; selecting them is all this module
//! does.

use lineage_classfile::{normalize_class_name, ClassInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::ConfigError;
use crate::corpus::{CorpusError, CorpusUnit};

/// Method to hook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookSpec {
    /// Method name
    #[serde(default = "default_method_name")]
    pub method_name: String,

    /// Method descriptor
    #[serde(default = "default_descriptor")]
    pub descriptor: String,
}

fn default_method_name() -> String {
    "damage".to_string()
}

fn default_descriptor() -> String {
    "(Lnet/minecraft/entity/damage/DamageSource;F)Z".to_string()
}

impl Default for HookSpec {
    fn default() -> Self {
        Self {
            method_name: default_method_name(),
            descriptor: default_descriptor(),
        }
    }
}

impl HookSpec {
    /// Create a spec; dotted class names inside the descriptor are normalized
    pub fn new(method_name: impl Into<String>, descriptor: &str) -> Self {
        Self {
            method_name: method_name.into(),
            descriptor: normalize_class_name(descriptor),
        }
    }

    /// Reject empty names and descriptors that are not method descriptors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.method_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "hook method_name cannot be empty".to_string(),
            ));
        }
        if !self.descriptor.starts_with('(') || !self.descriptor.contains(')') {
            return Err(ConfigError::ValidationError(format!(
                "hook descriptor is not a method descriptor: {}",
                self.descriptor
            )));
        }
        Ok(())
    }
}

/// One method the transform must patch
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct HookSite {
    /// Internal name of the declaring class
    pub class: String,
    /// Method name
    pub method: String,
    /// Method descriptor
    pub descriptor: String,
}

/// Public methods of `class` matching `spec`
pub fn hook_sites(class: &ClassInfo, spec: &HookSpec) -> Vec<HookSite> {
    class
        .methods
        .iter()
        .filter(|m| m.is_public() && m.matches(&spec.method_name, &spec.descriptor))
        .map(|m| {
            tracing::debug!(
                class = class.name(),
                method = %m.name,
                descriptor = %m.descriptor,
                "hook site"
            );
            HookSite {
                class: class.name().to_string(),
                method: m.name.clone(),
                descriptor: m.descriptor.clone(),
            }
        })
        .collect()
}

/// Hook sites across a corpus
#[derive(Debug, Clone, Default, Serialize)]
pub struct HookPlan {
    /// Sites in class order
    pub sites: Vec<HookSite>,
    /// Qualifying classes that were parsed
    pub classes_examined: usize,
    /// Qualifying classes that failed to parse
    pub parse_failures: usize,
}

/// Collect the hook sites of every qualifying class found in `units`
pub fn plan(
    units: &[CorpusUnit],
    qualifying: &BTreeSet<String>,
    spec: &HookSpec,
) -> Result<HookPlan, CorpusError> {
    let mut plan = HookPlan::default();
    for unit in units {
        unit.for_each_class(
            |name| qualifying.contains(name),
            |name, bytes| match ClassInfo::read(bytes) {
                Ok(info) => {
                    plan.classes_examined += 1;
                    plan.sites.extend(hook_sites(&info, spec));
                }
                Err(e) => {
                    plan.parse_failures += 1;
                    tracing::warn!(unit = %unit.id, class = name, error = %e, "failed to parse class");
                }
            },
        )?;
    }
    plan.sites.sort();
    plan.sites.dedup();
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_classfile::{access, ClassWriter};

    fn spec() -> HookSpec {
        HookSpec::new("damage", "(Lcom/example/Source;F)Z")
    }

    #[test]
    fn test_only_public_matching_methods() {
        let bytes = ClassWriter::new("com/example/Zombie")
            .extends("com/example/Entity")
            .method(access::PUBLIC, "damage", "(Lcom/example/Source;F)Z")
            .method(access::PROTECTED, "damage", "(Lcom/example/Source;I)Z")
            .method(access::PUBLIC, "damage", "(F)Z")
            .method(access::PUBLIC, "tick", "()V")
            .to_bytes();
        let info = ClassInfo::read(&bytes).unwrap();

        let sites = hook_sites(&info, &spec());
        assert_eq!(
            sites,
            vec![HookSite {
                class: "com/example/Zombie".to_string(),
                method: "damage".to_string(),
                descriptor: "(Lcom/example/Source;F)Z".to_string(),
            }]
        );
    }

    #[test]
    fn test_private_override_is_not_a_site() {
        let bytes = ClassWriter::new("A")
            .method(access::PRIVATE, "damage", "(Lcom/example/Source;F)Z")
            .to_bytes();
        let info = ClassInfo::read(&bytes).unwrap();
        assert!(hook_sites(&info, &spec()).is_empty());
    }

    #[test]
    fn test_plan_over_memory_unit() {
        let unit = CorpusUnit::memory(
            "mod",
            vec![
                (
                    "com/example/Zombie.class".to_string(),
                    ClassWriter::new("com/example/Zombie")
                        .method(access::PUBLIC, "damage", "(Lcom/example/Source;F)Z")
                        .to_bytes(),
                ),
                (
                    "com/example/Rock.class".to_string(),
                    ClassWriter::new("com/example/Rock")
                        .method(access::PUBLIC, "damage", "(Lcom/example/Source;F)Z")
                        .to_bytes(),
                ),
                ("com/example/Broken.class".to_string(), vec![0xCA, 0xFE]),
            ],
        );
        let qualifying: BTreeSet<String> = ["com/example/Zombie", "com/example/Broken"]
            .into_iter()
            .map(String::from)
            .collect();

        let plan = plan(&[unit], &qualifying, &spec()).unwrap();
        assert_eq!(plan.sites.len(), 1);
        assert_eq!(plan.sites[0].class, "com/example/Zombie");
        assert_eq!(plan.classes_examined, 1);
        assert_eq!(plan.parse_failures, 1);
    }

    #[test]
    fn test_spec_validation() {
        assert!(HookSpec::default().validate().is_ok());
        assert!(HookSpec::new("", "(F)Z").validate().is_err());
        assert!(HookSpec::new("damage", "F").validate().is_err());
        assert_eq!(
            HookSpec::new("damage", "(Lcom.example.Source;F)Z").descriptor,
            "(Lcom/example/Source;F)Z"
        );
    }
}
