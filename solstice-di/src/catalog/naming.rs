//! Strategies deriving default service IDs from type names. The container uses the configured
//! strategy when auto-wiring a parameter annotated with a service type: the parameter is satisfied
//! by the service registered under the ID derived from the annotation's type name.

/// Maps a fully-qualified type name to a service ID.
pub type IdNaming = fn(type_name: &str) -> String;

/// Uses the type name unchanged, e.g. `app::services::Greeter`. This is the default strategy.
pub fn fully_qualified_type_name(type_name: &str) -> String {
    type_name.to_string()
}

/// Shortens module segments to their first lowercase character and joins with dots, e.g.
/// `app::services::Greeter` becomes `a.s.Greeter`.
pub fn shortened_type_name(type_name: &str) -> String {
    let segments: Vec<&str> = type_name.split("::").collect();
    let Some((name, modules)) = segments.split_last() else {
        return type_name.to_string();
    };

    modules
        .iter()
        .filter_map(|segment| segment.chars().next())
        .flat_map(char::to_lowercase)
        .map(String::from)
        .chain(std::iter::once(name.to_string()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Uses only the last path segment, e.g. `Greeter`.
pub fn type_name_only(type_name: &str) -> String {
    type_name
        .rsplit("::")
        .next()
        .unwrap_or(type_name)
        .to_string()
}
