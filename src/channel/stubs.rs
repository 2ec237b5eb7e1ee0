//! Bootstrap script generation
//!
//! One self-invoking closure per channel. The helper library (installed separately)
//! provides `createPlugin`, `invokeNative` and `defineProperty`; this module only
//! emits the per-member forwarders that call into it.

use crate::binding::NativeProxy;
use crate::reflect::{CapabilityTable, Member};
use crate::script::serialize;

fn method_stub(helper: &str, key: &str, this: &str, prebind: bool) -> String {
    let stub = format!("{}.invokeNative.bind({}, '{}')", helper, this, key);
    if prebind {
        format!("{};", stub)
    } else {
        format!("function(){{return {}.apply(null, arguments);}}", stub)
    }
}

pub(crate) fn generate(identifier: &str, helper: &str, principal: &NativeProxy, table: &CapabilityTable) -> String {
    let object = principal.object();
    let rewrite = |stub: String, key: &str| object.rewrite_generated_stub(stub, key);

    // A constructible plugin binds its forwarders per instance
    let prebind = !table.default_member().is_some_and(Member::is_constructor);
    let this = if prebind { "exports" } else { "this" };

    let mut stubs = String::new();
    for (key, member) in table.iter() {
        let stub = match member {
            Member::Method { .. } if !key.is_empty() => {
                let forwarder = method_stub(helper, &format!("{}{}", key, member.stub_type()), this, prebind);
                format!("exports.{} = {}", key, forwarder)
            }
            Member::Property { setter, .. } => {
                let value = principal.property(key).unwrap_or_default();
                format!(
                    "{}.defineProperty(exports, '{}', {}, {});",
                    helper,
                    key,
                    serialize(&value),
                    setter.is_some()
                )
            }
            _ => continue,
        };
        stubs.push_str(&rewrite(stub, key));
        stubs.push('\n');
    }

    let base = match table.default_member() {
        Some(member) if member.is_constructor() => format!("'{}'", member.stub_type()),
        Some(member) => method_stub(helper, &member.stub_type(), "arguments.callee", false),
        None => rewrite("null".to_string(), ".base"),
    };

    rewrite(
        format!(
            "(function(exports) {{\n{}}})({}.createPlugin('{}', '{}', {}));\n",
            rewrite(stubs, ".local"),
            helper,
            identifier,
            principal.namespace(),
            base
        ),
        ".global",
    )
}
