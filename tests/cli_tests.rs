use gwadm::cli::{build_cli, global_opts};
use gwadm::output::Format;

#[test]
fn command_tree_is_internally_consistent() {
    // Catches duplicate argument ids, bad subcommand wiring, and the like.
    build_cli().debug_assert();
}

#[test]
fn every_resource_registers_its_verbs() {
    let cli = build_cli();
    let resources: Vec<&str> = cli.get_subcommands().map(|c| c.get_name()).collect();
    for expected in [
        "users",
        "groups",
        "members",
        "orgunits",
        "schemas",
        "calendarlist",
        "delegates",
        "sendas",
        "permissions",
        "userphotos",
    ] {
        assert!(resources.contains(&expected), "missing resource {}", expected);
    }
}

#[test]
fn batch_is_nested_under_every_verb() {
    let cli = build_cli();
    for resource in cli.get_subcommands() {
        for verb in resource.get_subcommands() {
            let children: Vec<&str> =
                verb.get_subcommands().map(|c| c.get_name()).collect();
            assert!(
                children.contains(&"batch"),
                "{} {} is missing its batch child",
                resource.get_name(),
                verb.get_name()
            );
        }
    }
}

#[test]
fn recursive_exists_only_where_the_catalog_marks_it() {
    let cli = build_cli();
    let delegates = cli
        .get_subcommands()
        .find(|c| c.get_name() == "delegates")
        .unwrap();

    let insert = delegates
        .get_subcommands()
        .find(|c| c.get_name() == "insert")
        .unwrap();
    assert!(insert
        .get_subcommands()
        .any(|c| c.get_name() == "recursive"));

    let list = delegates
        .get_subcommands()
        .find(|c| c.get_name() == "list")
        .unwrap();
    assert!(!list
        .get_subcommands()
        .any(|c| c.get_name() == "recursive"));
}

#[test]
fn single_record_invocation_parses_catalog_flags() {
    let matches = build_cli()
        .try_get_matches_from([
            "gwadm",
            "calendarlist",
            "patch",
            "--calendarId",
            "primary",
            "--summaryOverride",
            "",
        ])
        .unwrap();

    let (resource, sub) = matches.subcommand().unwrap();
    assert_eq!(resource, "calendarlist");
    let (verb, verb_matches) = sub.subcommand().unwrap();
    assert_eq!(verb, "patch");
    assert_eq!(
        verb_matches.get_one::<String>("calendarId").unwrap(),
        "primary"
    );
}

#[test]
fn missing_required_flag_fails_single_but_not_batch() {
    // Single-record patch without --calendarId is rejected by the parser.
    assert!(build_cli()
        .try_get_matches_from(["gwadm", "calendarlist", "patch"])
        .is_err());

    // The batch child negates parent requirements; rows carry the values.
    assert!(build_cli()
        .try_get_matches_from([
            "gwadm",
            "calendarlist",
            "patch",
            "batch",
            "--path",
            "rows.csv"
        ])
        .is_ok());
}

#[test]
fn global_options_parse_from_any_level() {
    let matches = build_cli()
        .try_get_matches_from([
            "gwadm",
            "users",
            "list",
            "--format",
            "yaml",
            "--streamOutput",
            "--threads",
            "8",
        ])
        .unwrap();

    let opts = global_opts(&matches).unwrap();
    assert_eq!(opts.output.format, Format::Yaml);
    assert!(opts.output.stream);
    assert!(!opts.output.compress);
    assert_eq!(opts.threads, Some(8));
}

#[test]
fn bad_format_is_rejected() {
    let matches = build_cli()
        .try_get_matches_from(["gwadm", "users", "list", "--format", "xml"])
        .unwrap();
    assert!(global_opts(&matches).is_err());
}
