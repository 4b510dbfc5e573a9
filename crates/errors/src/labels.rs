use crate::model::ErrorObj;
use std::collections::BTreeMap;

/// Low-cardinality fields for the exception log: code, kind and call site.
pub fn labels(err: &ErrorObj) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("code", err.code.0.to_string());
    map.insert("kind", err.kind.as_str().to_string());
    map.insert("recovery", err.recovery.as_str().to_string());
    if let Some(site) = &err.site {
        map.insert("service", site.service.clone());
        map.insert("method", site.method.clone());
        if let Some(caller) = &site.caller {
            map.insert("caller", caller.clone());
        }
    }
    map
}
