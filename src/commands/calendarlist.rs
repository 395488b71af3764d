//! Calendar list entries
//!
//! The calendar-list catalog exercises most of the assembler: clearable
//! string fields (`summaryOverride`), booleans with per-verb defaults
//! (`selected`), and the `defaultReminders` sub-structured list whose CSV
//! encoding regroups `;`-separated `k=v` sub-tokens into reminder objects at
//! each `method=` boundary.

use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::Value;

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::assemble::{check_enum, Payload};
use crate::batch::BatchOp;
use crate::bind::{parse_kv_pairs, ValueMap};
use crate::error::{Error, Result};
use crate::flags::{
    Catalog, DefaultValue, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS,
};
use crate::rest::RestClient;

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "userId",
        kind: FlagKind::Str,
        available: &[Verb::All],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[
            (Verb::Get, DefaultValue::Str("me")),
            (Verb::List, DefaultValue::Str("me")),
            (Verb::Insert, DefaultValue::Str("me")),
            (Verb::Patch, DefaultValue::Str("me")),
            (Verb::Delete, DefaultValue::Str("me")),
        ],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "calendarId",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Insert, Verb::Patch, Verb::Delete],
        required: &[Verb::Get, Verb::Insert, Verb::Patch, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch, Verb::Delete],
    },
    FlagDescriptor {
        id: "summaryOverride",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "colorId",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "backgroundColor",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "foregroundColor",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "hidden",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "selected",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::Insert, DefaultValue::Bool(true))],
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "defaultReminders",
        kind: FlagKind::StrList,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "minAccessRole",
        kind: FlagKind::Str,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "showDeleted",
        kind: FlagKind::Bool,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "showHidden",
        kind: FlagKind::Bool,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("calendarlist", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Patch, Verb::Delete];

pub fn command() -> Command {
    resource_command("calendarlist", "Calendar list entries", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "userId", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let user = values.str_value("userId").unwrap_or("me").to_string();
    let base = format!("{}/users/{}/calendarList", rest.endpoints().calendar, user);

    match verb {
        Verb::Get => {
            let calendar = require_str(&values, "calendarId")?;
            rest.get(&format!("{}/{}", base, calendar), &[]).await
        }
        Verb::List => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(role) = values.str_value("minAccessRole") {
                check_enum(
                    "minAccessRole",
                    role,
                    &["freeBusyReader", "reader", "writer", "owner"],
                )?;
                query.push(("minAccessRole", role.to_string()));
            }
            if let Some(true) = values.bool_value("showDeleted") {
                query.push(("showDeleted", "true".to_string()));
            }
            if let Some(true) = values.bool_value("showHidden") {
                query.push(("showHidden", "true".to_string()));
            }
            rest.get(&base, &query).await
        }
        Verb::Insert => {
            let calendar = require_str(&values, "calendarId")?;
            let mut body = build_entry(&values)?;
            body.set_value("id", Value::String(calendar));
            rest.post(&base, &body.into_value()).await
        }
        Verb::Patch => {
            let calendar = require_str(&values, "calendarId")?;
            let body = build_entry(&values)?;
            rest.patch(&format!("{}/{}", base, calendar), &body.into_value())
                .await
        }
        Verb::Delete => {
            let calendar = require_str(&values, "calendarId")?;
            rest.delete(&format!("{}/{}", base, calendar)).await?;
            Ok(delete_record(&[
                ("userId", &user),
                ("calendarId", &calendar),
            ]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for calendarlist",
            verb.name()
        ))),
    }
}

/// Assembles the sparse calendar-list entry body
pub fn build_entry(values: &ValueMap) -> Result<Payload> {
    let mut p = Payload::new();
    p.set("summaryOverride", values, "summaryOverride");
    p.set("colorId", values, "colorId");
    p.set("backgroundColor", values, "backgroundColor");
    p.set("foregroundColor", values, "foregroundColor");
    p.set("hidden", values, "hidden");
    p.set("selected", values, "selected");

    if let Some(resolved) = values.get("defaultReminders") {
        if let Some(items) = resolved.value.as_list() {
            let reminders = build_reminders(items)?;
            if reminders.is_empty() && resolved.explicit {
                // Explicit empty list clears the reminders on the wire.
                p.set_value("defaultReminders", Value::Array(Vec::new()));
                p.force_field("defaultReminders");
            } else {
                p.set_object_list("defaultReminders", reminders);
            }
        }
    }
    Ok(p)
}

/// Regroups `k=v` sub-tokens into reminder structs at each `method=` token
fn build_reminders(items: &[String]) -> Result<Vec<Payload>> {
    let mut reminders: Vec<Payload> = Vec::new();
    for item in items {
        if item.is_empty() {
            continue;
        }
        for (key, value) in parse_kv_pairs(item)? {
            match key.as_str() {
                "method" => {
                    check_enum("defaultReminders.method", &value, &["email", "popup"])?;
                    let mut r = Payload::new();
                    r.set_value("method", Value::String(value));
                    reminders.push(r);
                }
                "minutes" => {
                    let minutes: i64 = value.parse().map_err(|_| {
                        Error::InvalidInvocation(format!(
                            "defaultReminders.minutes {:?} is not a number",
                            value
                        ))
                    })?;
                    let current = reminders.last_mut().ok_or_else(|| {
                        Error::InvalidInvocation(
                            "defaultReminders minutes before any method".to_string(),
                        )
                    })?;
                    current.set_value("minutes", Value::Number(minutes.into()));
                }
                other => {
                    return Err(Error::InvalidInvocation(format!(
                        "unknown defaultReminders key {:?}",
                        other
                    )))
                }
            }
        }
    }
    Ok(reminders)
}
