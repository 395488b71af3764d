//! Drive file permissions
//!
//! Ownership transfer is the cross-field case: `role=owner` is rejected
//! unless `--transferOwnership true` accompanies it, and the notification
//! controls travel as query parameters rather than body fields.

use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::Value;

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::assemble::{check_enum, Payload};
use crate::batch::BatchOp;
use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::flags::{
    Catalog, DefaultValue, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS,
};
use crate::rest::RestClient;

const ROLES: &[&str] = &[
    "owner",
    "organizer",
    "fileOrganizer",
    "writer",
    "commenter",
    "reader",
];
const GRANTEE_TYPES: &[&str] = &["user", "group", "domain", "anyone"];

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "fileId",
        kind: FlagKind::Str,
        available: &[Verb::All],
        required: &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "permissionId",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Update, Verb::Delete],
        required: &[Verb::Get, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "emailAddress",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "role",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert, Verb::Update],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "type",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "domain",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "allowFileDiscovery",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "expirationTime",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "transferOwnership",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "sendNotificationEmail",
        kind: FlagKind::Bool,
        available: &[Verb::Insert],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::Insert, DefaultValue::Bool(true))],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "emailMessage",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "pageSize",
        kind: FlagKind::Int,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("permissions", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("permissions", "Drive file permissions", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "permissionId", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let file = require_str(&values, "fileId")?;
    let base = format!("{}/files/{}/permissions", rest.endpoints().drive, file);

    match verb {
        Verb::Get => {
            let id = require_str(&values, "permissionId")?;
            rest.get(&format!("{}/{}", base, id), &[]).await
        }
        Verb::List => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(resolved) = values.get("pageSize") {
                if let crate::flags::FlagValue::Int(n) = resolved.value {
                    if n > 0 {
                        query.push(("pageSize", n.to_string()));
                    }
                }
            }
            rest.get(&base, &query).await
        }
        Verb::Insert => {
            let body = build_permission(&values, true)?;
            let query = transfer_query(&values);
            rest.request_json(
                reqwest::Method::POST,
                &base,
                &query,
                Some(&body.into_value()),
            )
            .await
        }
        Verb::Update => {
            let id = require_str(&values, "permissionId")?;
            let body = build_permission(&values, false)?;
            let query = transfer_query(&values);
            rest.request_json(
                reqwest::Method::PATCH,
                &format!("{}/{}", base, id),
                &query,
                Some(&body.into_value()),
            )
            .await
        }
        Verb::Delete => {
            let id = require_str(&values, "permissionId")?;
            rest.delete(&format!("{}/{}", base, id)).await?;
            Ok(delete_record(&[("fileId", &file), ("permissionId", &id)]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for permissions",
            verb.name()
        ))),
    }
}

fn build_permission(values: &ValueMap, with_grantee: bool) -> Result<Payload> {
    if let Some(role) = values.str_value("role") {
        check_enum("role", role, ROLES)?;
        if role == "owner" && values.bool_value("transferOwnership") != Some(true) {
            return Err(Error::InvalidInvocation(
                "role owner requires --transferOwnership true".to_string(),
            ));
        }
    }

    let mut p = Payload::new();
    p.set("role", values, "role");
    p.set("allowFileDiscovery", values, "allowFileDiscovery");
    p.set("expirationTime", values, "expirationTime");

    if with_grantee {
        let grantee = values.str_value("type").unwrap_or_default();
        check_enum("type", grantee, GRANTEE_TYPES)?;
        p.set("type", values, "type");
        match grantee {
            "user" | "group" => {
                if values.str_value("emailAddress").map_or(true, str::is_empty) {
                    return Err(Error::InvalidInvocation(format!(
                        "type {} requires --emailAddress",
                        grantee
                    )));
                }
                p.set("emailAddress", values, "emailAddress");
            }
            "domain" => {
                if values.str_value("domain").map_or(true, str::is_empty) {
                    return Err(Error::InvalidInvocation(
                        "type domain requires --domain".to_string(),
                    ));
                }
                p.set("domain", values, "domain");
            }
            _ => {}
        }
    }
    Ok(p)
}

/// Notification and transfer controls travel as query parameters
fn transfer_query(values: &ValueMap) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(true) = values.bool_value("transferOwnership") {
        query.push(("transferOwnership", "true".to_string()));
    }
    if let Some(resolved) = values.get("sendNotificationEmail") {
        if let Some(b) = resolved.value.as_bool() {
            query.push(("sendNotificationEmail", b.to_string()));
        }
    }
    if let Some(message) = values.str_value("emailMessage") {
        if !message.is_empty() {
            query.push(("emailMessage", message.to_string()));
        }
    }
    query
}
