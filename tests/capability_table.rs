use proptest::prelude::*;
use scriptbridge::interop::{NativeType, NativeValue};
use scriptbridge::reflect::{CapabilityTable, Class, ClassBuilder, Member, ScriptingPolicy, Scriptable};
use scriptbridge::BridgeError;
use std::collections::{HashMap, HashSet};

struct Panel;

const PROPERTIES: [&str; 3] = ["width", "height", "title"];
const METHODS: [&str; 4] = ["open", "close", "resize", "focus"];

impl Scriptable for Panel {
    fn define(class: &mut ClassBuilder<Self>) {
        class
            .property("width", NativeType::I32, |_| NativeValue::I32(0), |_, _| {})
            .property("height", NativeType::I32, |_| NativeValue::I32(0), |_, _| {})
            .readonly_property("title", NativeType::String, |_| "panel".to_string().into());
        for name in METHODS {
            class.method(name, &[], NativeType::Void, |_, _| NativeValue::Void);
        }
    }
}

/// Renames and exclusions chosen per native name
#[derive(Debug, Clone)]
struct GeneratedPolicy {
    renames: HashMap<String, String>,
    excluded: HashSet<String>,
}

impl GeneratedPolicy {
    fn exposed(&self, native: &str) -> Option<String> {
        if self.excluded.contains(native) {
            return None;
        }
        Some(self.renames.get(native).cloned().unwrap_or_else(|| native.to_string()))
    }
}

impl ScriptingPolicy for GeneratedPolicy {
    fn script_name_for_method(&self, selector: &str) -> Option<String> {
        self.renames.get(selector).cloned()
    }

    fn script_name_for_key(&self, key: &str) -> Option<String> {
        self.renames.get(key).cloned()
    }

    fn is_method_excluded(&self, selector: &str) -> bool {
        self.excluded.contains(selector)
    }

    fn is_key_excluded(&self, key: &str) -> bool {
        self.excluded.contains(key)
    }
}

fn policy_strategy() -> impl Strategy<Value = GeneratedPolicy> {
    let names: Vec<&'static str> = PROPERTIES.iter().chain(METHODS.iter()).copied().collect();
    let pool = prop::sample::select(vec!["width", "open", "alpha", "beta", "gamma"]);
    let per_member = (prop::option::of(pool), any::<bool>());
    prop::collection::vec(per_member, names.len()).prop_map(move |choices| {
        let mut policy = GeneratedPolicy { renames: HashMap::new(), excluded: HashSet::new() };
        for (native, (rename, excluded)) in names.iter().zip(choices) {
            if let Some(rename) = rename {
                policy.renames.insert(native.to_string(), rename.to_string());
            }
            if excluded {
                policy.excluded.insert(native.to_string());
            }
        }
        policy
    })
}

proptest! {
    #[test]
    fn table_names_are_unique_or_build_fails(policy in policy_strategy()) {
        let class = Class::of::<Panel>();
        let exposed: Vec<(String, bool)> = PROPERTIES
            .iter()
            .map(|p| (p, true))
            .chain(METHODS.iter().map(|m| (m, false)))
            .filter_map(|(native, is_property)| policy.exposed(native).map(|name| (name, is_property)))
            .collect();
        let distinct: HashSet<&str> = exposed.iter().map(|(name, _)| name.as_str()).collect();

        match CapabilityTable::build(&class, &policy) {
            Ok(table) => {
                prop_assert_eq!(distinct.len(), exposed.len());
                prop_assert_eq!(table.len(), exposed.len());
                for (name, is_property) in &exposed {
                    let member = table.get(name);
                    prop_assert!(member.is_some());
                    prop_assert_eq!(member.map(Member::is_property), Some(*is_property));
                }
            }
            Err(BridgeError::NameConflict { name, .. }) => {
                prop_assert!(distinct.len() < exposed.len());
                prop_assert!(exposed.iter().filter(|(n, _)| *n == name).count() > 1);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}

#[test]
fn test_accessors_are_not_exposed_as_methods() {
    let table = Class::of::<Panel>().table().unwrap();
    assert_eq!(table.len(), PROPERTIES.len() + METHODS.len());
    assert!(!table.contains("set_width"));
    assert_eq!(table.get("width").and_then(Member::setter), Some("set_width"));
    assert_eq!(table.get("title").and_then(Member::setter), None);
    assert!(table.default_member().is_none());
}
