use gwadm::commands;
use gwadm::flags::Verb;

const CONCRETE_VERBS: &[Verb] = &[
    Verb::Get,
    Verb::List,
    Verb::Insert,
    Verb::Update,
    Verb::Patch,
    Verb::Delete,
];

#[test]
fn every_catalog_satisfies_structural_invariants() {
    for catalog in commands::all_catalogs() {
        catalog
            .validate()
            .unwrap_or_else(|e| panic!("catalog {}: {}", catalog.resource, e));
    }
}

#[test]
fn required_is_subset_of_available() {
    for catalog in commands::all_catalogs() {
        for &verb in CONCRETE_VERBS {
            let available: Vec<&str> = catalog
                .available_for(verb)
                .iter()
                .map(|f| f.id)
                .collect();
            for flag in catalog.required_for(verb) {
                assert!(
                    available.contains(&flag.id),
                    "{}: required flag {} not available for {}",
                    catalog.resource,
                    flag.id,
                    verb.name()
                );
            }
        }
    }
}

#[test]
fn wildcard_expansion_is_subset_of_available() {
    for catalog in commands::all_catalogs() {
        for &verb in CONCRETE_VERBS {
            let available: Vec<&str> = catalog
                .available_for(verb)
                .iter()
                .map(|f| f.id)
                .collect();
            for flag in catalog.wildcard_expansion(verb) {
                assert!(
                    available.contains(&flag.id),
                    "{}: wildcard flag {} not available for {}",
                    catalog.resource,
                    flag.id,
                    verb.name()
                );
            }
        }
    }
}

#[test]
fn recursive_flags_are_subset_of_available() {
    for catalog in commands::all_catalogs() {
        for &verb in CONCRETE_VERBS {
            let available: Vec<&str> = catalog
                .available_for(verb)
                .iter()
                .map(|f| f.id)
                .collect();
            for flag in catalog.recursive_flags(verb) {
                assert!(
                    available.contains(&flag.id),
                    "{}: recursive flag {} not available for {}",
                    catalog.resource,
                    flag.id,
                    verb.name()
                );
            }
        }
    }
}

#[test]
fn excluded_flags_stay_available_but_do_not_expand() {
    // password is settable on insert/update yet carved out of the catch-all
    // expansion; expansion equals available minus excluded.
    let catalog = &gwadm::commands::users::CATALOG;

    let available: Vec<&str> = catalog
        .available_for(Verb::Update)
        .iter()
        .map(|f| f.id)
        .collect();
    assert!(available.contains(&"password"));

    let expanded: Vec<&str> = catalog
        .wildcard_expansion(Verb::Update)
        .iter()
        .map(|f| f.id)
        .collect();
    assert!(!expanded.contains(&"password"));
    assert!(expanded.contains(&"orgUnitPath"));
}

#[test]
fn fields_all_projection_expands_without_excluded_flags() {
    use gwadm::bind::ValueMap;
    use gwadm::flags::FlagValue;

    let mut values = ValueMap::new();
    values.set("fields", FlagValue::Str("all".to_string()), true);
    let projection =
        gwadm::commands::users::field_selection(&values, Verb::List).unwrap();

    assert!(projection.contains("primaryEmail"));
    assert!(projection.contains("orgUnitPath"));
    assert!(!projection.contains("password"));

    let mut values = ValueMap::new();
    values.set("fields", FlagValue::Str("primaryEmail,suspended".to_string()), true);
    assert_eq!(
        gwadm::commands::users::field_selection(&values, Verb::List).unwrap(),
        "primaryEmail,suspended"
    );
}

#[test]
fn defaults_resolve_per_verb() {
    let catalog = &gwadm::commands::users::CATALOG;
    let default = catalog.default(Verb::List, "maxResults").unwrap();
    assert_eq!(default, gwadm::flags::FlagValue::Int(100));
    assert!(catalog.default(Verb::Get, "maxResults").is_none());
}

#[test]
fn delegates_marks_only_recursive_verbs() {
    let catalog = &gwadm::commands::delegates::CATALOG;
    assert!(!catalog.recursive_flags(Verb::Insert).is_empty());
    assert!(!catalog.recursive_flags(Verb::Delete).is_empty());
    assert!(catalog.recursive_flags(Verb::List).is_empty());
    assert!(catalog.recursive_flags(Verb::Get).is_empty());
}
