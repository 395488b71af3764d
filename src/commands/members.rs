//! Group membership

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

const ROLES: &[&str] = &["OWNER", "MANAGER", "MEMBER"];
const DELIVERY: &[&str] = &["ALL_MAIL", "DAILY", "DIGEST", "DISABLED", "NONE"];

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "groupKey",
        kind: FlagKind::Str,
        available: &[Verb::All],
        required: &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "memberKey",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Update, Verb::Delete],
        required: &[Verb::Get, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "email",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "role",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::Insert, DefaultValue::Str("MEMBER"))],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "deliverySettings",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "roles",
        kind: FlagKind::StrList,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "includeDerivedMembership",
        kind: FlagKind::Bool,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("members", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("members", "Group membership", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "memberKey", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let group = require_str(&values, "groupKey")?;
    let base = format!("{}/groups/{}/members", rest.endpoints().directory, group);

    match verb {
        Verb::Get => {
            let member = require_str(&values, "memberKey")?;
            rest.get(&format!("{}/{}", base, member), &[]).await
        }
        Verb::List => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(roles) = values.list_value("roles") {
                for role in roles.iter().filter(|r| !r.is_empty()) {
                    check_enum("roles", role, ROLES)?;
                }
                query.push(("roles", roles.join(",")));
            }
            if let Some(true) = values.bool_value("includeDerivedMembership") {
                query.push(("includeDerivedMembership", "true".to_string()));
            }
            rest.get(&base, &query).await
        }
        Verb::Insert => {
            let body = build_member(&values, true)?;
            rest.post(&base, &body.into_value()).await
        }
        Verb::Update => {
            let member = require_str(&values, "memberKey")?;
            let body = build_member(&values, false)?;
            rest.patch(&format!("{}/{}", base, member), &body.into_value())
                .await
        }
        Verb::Delete => {
            let member = require_str(&values, "memberKey")?;
            rest.delete(&format!("{}/{}", base, member)).await?;
            Ok(delete_record(&[
                ("groupKey", &group),
                ("memberKey", &member),
            ]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for members",
            verb.name()
        ))),
    }
}

fn build_member(values: &ValueMap, with_email: bool) -> Result<Payload> {
    if let Some(role) = values.str_value("role") {
        if !role.is_empty() {
            check_enum("role", role, ROLES)?;
        }
    }
    if let Some(delivery) = values.str_value("deliverySettings") {
        if !delivery.is_empty() {
            check_enum("deliverySettings", delivery, DELIVERY)?;
        }
    }

    let mut p = Payload::new();
    if with_email {
        p.set("email", values, "email");
    }
    p.set("role", values, "role");
    p.set("delivery_settings", values, "deliverySettings");
    Ok(p)
}
