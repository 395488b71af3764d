//! Directory groups

use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::Value;

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::assemble::Payload;
use crate::batch::BatchOp;
use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::flags::{
    Catalog, DefaultValue, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS,
};
use crate::rest::RestClient;

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "groupKey",
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
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "name",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "description",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "query",
        kind: FlagKind::Str,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "domain",
        kind: FlagKind::Str,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "maxResults",
        kind: FlagKind::Int,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::List, DefaultValue::Int(200))],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "userKey",
        kind: FlagKind::Str,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("groups", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("groups", "Directory groups", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "groupKey", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let base = format!("{}/groups", rest.endpoints().directory);

    match verb {
        Verb::Get => {
            let key = require_str(&values, "groupKey")?;
            rest.get(&format!("{}/{}", base, key), &[]).await
        }
        Verb::List => {
            let mut query: Vec<(&str, String)> = Vec::new();
            match values.str_value("domain") {
                Some(domain) if !domain.is_empty() => {
                    query.push(("domain", domain.to_string()))
                }
                _ => query.push(("customer", "my_customer".to_string())),
            }
            if let Some(q) = values.str_value("query") {
                query.push(("query", q.to_string()));
            }
            if let Some(user) = values.str_value("userKey") {
                query.push(("userKey", user.to_string()));
            }
            if let Some(resolved) = values.get("maxResults") {
                if let crate::flags::FlagValue::Int(n) = resolved.value {
                    query.push(("maxResults", n.to_string()));
                }
            }
            rest.get(&base, &query).await
        }
        Verb::Insert => {
            let body = build_group(&values)?;
            rest.post(&base, &body.into_value()).await
        }
        Verb::Update => {
            let key = require_str(&values, "groupKey")?;
            let body = build_group(&values)?;
            rest.patch(&format!("{}/{}", base, key), &body.into_value())
                .await
        }
        Verb::Delete => {
            let key = require_str(&values, "groupKey")?;
            rest.delete(&format!("{}/{}", base, key)).await?;
            Ok(delete_record(&[("groupKey", &key)]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for groups",
            verb.name()
        ))),
    }
}

pub fn build_group(values: &ValueMap) -> Result<Payload> {
    let mut p = Payload::new();
    p.set("email", values, "email");
    p.set("name", values, "name");
    p.set("description", values, "description");
    Ok(p)
}
