use csv::StringRecord;
use serde_json::json;

use gwadm::assemble::Payload;
use gwadm::bind::{self, ValueMap};
use gwadm::commands::{calendarlist, sendas, users};
use gwadm::error::Error;
use gwadm::flags::{FlagValue, Verb};

fn map_with(entries: &[(&'static str, FlagValue, bool)]) -> ValueMap {
    let mut map = ValueMap::new();
    for (id, value, explicit) in entries {
        map.set(id, value.clone(), *explicit);
    }
    map
}

#[test]
fn unset_fields_are_omitted() {
    let map = ValueMap::new();
    let mut p = Payload::new();
    p.set("summaryOverride", &map, "summaryOverride");
    assert_eq!(p.into_value(), json!({}));
}

#[test]
fn non_zero_values_are_emitted_without_force() {
    let map = map_with(&[("colorId", FlagValue::Str("7".to_string()), true)]);
    let mut p = Payload::new();
    p.set("colorId", &map, "colorId");
    assert_eq!(p.into_value(), json!({ "colorId": "7" }));
}

#[test]
fn explicit_zero_emits_value_and_force_entry() {
    let map = map_with(&[("summaryOverride", FlagValue::Str(String::new()), true)]);
    let mut p = Payload::new();
    p.set("summaryOverride", &map, "summaryOverride");
    assert_eq!(
        p.into_value(),
        json!({ "summaryOverride": "", "forceSendFields": ["SummaryOverride"] })
    );
}

#[test]
fn non_explicit_zero_from_default_is_omitted() {
    // A defaulted false must not leak into the payload.
    let map = map_with(&[("hidden", FlagValue::Bool(false), false)]);
    let mut p = Payload::new();
    p.set("hidden", &map, "hidden");
    assert_eq!(p.into_value(), json!({}));
}

#[test]
fn explicit_false_gets_force_entry() {
    let map = map_with(&[("selected", FlagValue::Bool(false), true)]);
    let mut p = Payload::new();
    p.set("selected", &map, "selected");
    assert_eq!(
        p.into_value(),
        json!({ "selected": false, "forceSendFields": ["Selected"] })
    );
}

#[test]
fn patch_that_clears_a_field() {
    // calendarlist patch --calendarId primary --summaryOverride ""
    let map = map_with(&[
        ("calendarId", FlagValue::Str("primary".to_string()), true),
        ("summaryOverride", FlagValue::Str(String::new()), true),
    ]);
    let body = calendarlist::build_entry(&map).unwrap().into_value();
    assert_eq!(
        body,
        json!({ "summaryOverride": "", "forceSendFields": ["SummaryOverride"] })
    );
}

#[test]
fn patch_that_omits_an_unspecified_field() {
    // calendarlist patch --calendarId primary --colorId 7
    let map = map_with(&[
        ("calendarId", FlagValue::Str("primary".to_string()), true),
        ("colorId", FlagValue::Str("7".to_string()), true),
    ]);
    let body = calendarlist::build_entry(&map).unwrap().into_value();
    assert_eq!(body, json!({ "colorId": "7" }));
}

#[test]
fn csv_clearing_marker_flows_through_to_the_wire() {
    // Header calendarId,summaryOverride! with an empty override cell.
    let header_row = StringRecord::from(vec!["calendarId", "summaryOverride!"]);
    let header =
        bind::parse_header(&calendarlist::CATALOG, Verb::Patch, &header_row).unwrap();
    let row = StringRecord::from(vec!["primary", ""]);
    let map = bind::bind_csv_row(&calendarlist::CATALOG, Verb::Patch, &header, &row).unwrap();

    let body = calendarlist::build_entry(&map).unwrap().into_value();
    assert_eq!(
        body,
        json!({ "summaryOverride": "", "forceSendFields": ["SummaryOverride"] })
    );
}

#[test]
fn name_substructure_allocated_only_when_bound() {
    let map = map_with(&[("primaryEmail", FlagValue::Str("a@x".to_string()), true)]);
    let body = users::build_user(&map).unwrap().into_value();
    assert_eq!(body, json!({ "primaryEmail": "a@x" }));

    let map = map_with(&[
        ("givenName", FlagValue::Str("Ada".to_string()), true),
        ("familyName", FlagValue::Str(String::new()), true),
    ]);
    let body = users::build_user(&map).unwrap().into_value();
    assert_eq!(
        body,
        json!({
            "name": {
                "givenName": "Ada",
                "familyName": "",
                "forceSendFields": ["FamilyName"]
            }
        })
    );
}

#[test]
fn reminders_regroup_at_method_tokens() {
    let map = map_with(&[(
        "defaultReminders",
        FlagValue::StrList(vec![
            "method=popup".to_string(),
            "minutes=10".to_string(),
            "method=email".to_string(),
            "minutes=30".to_string(),
        ]),
        true,
    )]);
    let body = calendarlist::build_entry(&map).unwrap().into_value();
    assert_eq!(
        body,
        json!({
            "defaultReminders": [
                { "method": "popup", "minutes": 10 },
                { "method": "email", "minutes": 30 }
            ]
        })
    );
}

#[test]
fn explicit_empty_reminder_list_clears_on_the_wire() {
    let map = map_with(&[("defaultReminders", FlagValue::StrList(Vec::new()), true)]);
    let body = calendarlist::build_entry(&map).unwrap().into_value();
    assert_eq!(
        body,
        json!({
            "defaultReminders": [],
            "forceSendFields": ["DefaultReminders"]
        })
    );
}

#[test]
fn bad_reminder_method_is_invalid_invocation() {
    let map = map_with(&[(
        "defaultReminders",
        FlagValue::StrList(vec!["method=pigeon".to_string()]),
        true,
    )]);
    let err = calendarlist::build_entry(&map).unwrap_err();
    assert!(matches!(err, Error::InvalidInvocation(_)));
}

#[test]
fn smtp_msa_substructure_requires_host_and_known_mode() {
    let map = map_with(&[
        ("smtpMsaHost", FlagValue::Str("smtp.x".to_string()), true),
        ("smtpMsaPort", FlagValue::Int(587), true),
        (
            "smtpMsaSecurityMode",
            FlagValue::Str("starttls".to_string()),
            true,
        ),
    ]);
    let body = sendas::build_sendas(&map).unwrap().into_value();
    assert_eq!(
        body,
        json!({
            "smtpMsa": {
                "host": "smtp.x",
                "port": 587,
                "securityMode": "starttls"
            }
        })
    );

    let map = map_with(&[(
        "smtpMsaSecurityMode",
        FlagValue::Str("carrier-pigeon".to_string()),
        true,
    )]);
    assert!(matches!(
        sendas::build_sendas(&map).unwrap_err(),
        Error::InvalidInvocation(_)
    ));

    // Any relay leaf without a host is rejected.
    let map = map_with(&[("smtpMsaPort", FlagValue::Int(587), true)]);
    assert!(matches!(
        sendas::build_sendas(&map).unwrap_err(),
        Error::InvalidInvocation(_)
    ));
}

#[test]
fn absent_substructure_is_not_allocated() {
    let map = map_with(&[("displayName", FlagValue::Str("Ops".to_string()), true)]);
    let body = sendas::build_sendas(&map).unwrap().into_value();
    assert_eq!(body, json!({ "displayName": "Ops" }));
    assert!(body.get("smtpMsa").is_none());
}
