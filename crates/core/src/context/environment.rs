use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

/// Ordered environment overrides; `None` removes an inherited variable.
pub type EnvironmentOverrides = IndexMap<String, Option<String>>;

const SYSTEM_PROPERTY_PREFIX: &str = "-D";

const SYSTEM_PROPERTY_SEPARATOR: char = '=';

/// Computes the full environment for a call from the inherited one.
///
/// Inherited entries are kept as they are, including values that are not
/// valid UTF-8; only the overridden names change.
pub fn apply_overrides<I>(inherited: I, overrides: &EnvironmentOverrides) -> IndexMap<OsString, OsString>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut environment: IndexMap<OsString, OsString> = inherited.into_iter().collect();
    for (key, value) in overrides {
        match value {
            Some(value) => {
                environment.insert(OsString::from(key), OsString::from(value));
            }
            None => {
                environment.shift_remove(OsStr::new(key));
            }
        }
    }
    environment
}

/// Extracts `-Dkey=value` entries; a bare `-Dkey` maps to an empty value.
pub fn extract_system_properties(jvm_arguments: &[String]) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for argument in jvm_arguments {
        let Some(body) = argument.strip_prefix(SYSTEM_PROPERTY_PREFIX) else {
            continue;
        };
        let (key, value) = match body.split_once(SYSTEM_PROPERTY_SEPARATOR) {
            Some((key, value)) => (key, value),
            None => (body, ""),
        };
        properties.insert(key.to_string(), value.to_string());
    }
    properties
}
