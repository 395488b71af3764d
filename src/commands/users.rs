//! Directory users
//!
//! Largest of the directory catalogs. Update uses PATCH with a sparse body,
//! so an explicit `--orgUnitPath ""` or `--recoveryEmail ""` clears the field
//! through the force-send path while untouched fields stay untouched.

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

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "userKey",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Update, Verb::Delete],
        required: &[Verb::Get, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "primaryEmail",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "givenName",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "familyName",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "password",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        // Settable, but never auto-included in the catch-all expansion.
        excluded_from_all: &[Verb::Insert, Verb::Update],
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "orgUnitPath",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::Insert, DefaultValue::Str("/"))],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "suspended",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "changePasswordAtNextLogin",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "recoveryEmail",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "recoveryPhone",
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
        defaults: &[(Verb::List, DefaultValue::Int(100))],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "orderBy",
        kind: FlagKind::Str,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "projection",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[
            (Verb::Get, DefaultValue::Str("basic")),
            (Verb::List, DefaultValue::Str("basic")),
        ],
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
        id: "fields",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::List],
        required: NO_VERBS,
        excluded_from_all: &[Verb::Get, Verb::List],
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("users", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("users", "Directory users", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "userKey", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let base = format!("{}/users", rest.endpoints().directory);

    match verb {
        Verb::Get => {
            let key = require_str(&values, "userKey")?;
            let mut query = Vec::new();
            if let Some(projection) = values.str_value("projection") {
                check_enum("projection", projection, &["basic", "custom", "full"])?;
                query.push(("projection", projection.to_string()));
            }
            if let Some(fields) = field_selection(&values, verb) {
                query.push(("fields", fields));
            }
            rest.get(&format!("{}/{}", base, key), &query).await
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
            if let Some(resolved) = values.get("maxResults") {
                if let crate::flags::FlagValue::Int(n) = resolved.value {
                    query.push(("maxResults", n.to_string()));
                }
            }
            if let Some(order) = values.str_value("orderBy") {
                check_enum("orderBy", order, &["email", "familyName", "givenName"])?;
                query.push(("orderBy", order.to_string()));
            }
            if let Some(true) = values.bool_value("showDeleted") {
                query.push(("showDeleted", "true".to_string()));
            }
            if let Some(fields) = field_selection(&values, verb) {
                query.push(("fields", fields));
            }
            rest.get(&base, &query).await
        }
        Verb::Insert => {
            let body = build_user(&values)?;
            rest.post(&base, &body.into_value()).await
        }
        Verb::Update => {
            let key = require_str(&values, "userKey")?;
            let body = build_user(&values)?;
            rest.patch(&format!("{}/{}", base, key), &body.into_value())
                .await
        }
        Verb::Delete => {
            let key = require_str(&values, "userKey")?;
            rest.delete(&format!("{}/{}", base, key)).await?;
            Ok(delete_record(&[("userKey", &key)]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for users",
            verb.name()
        ))),
    }
}

/// Resolves the `fields` projection for get and list
///
/// `all` expands to the mutable attribute surface via the catch-all
/// expansion, which keeps excluded fields like password out of the
/// projection; anything else passes through verbatim.
pub fn field_selection(values: &ValueMap, _verb: Verb) -> Option<String> {
    let fields = values.str_value("fields")?;
    if fields.is_empty() {
        return None;
    }
    if fields == "all" {
        let expanded: Vec<&str> = CATALOG
            .wildcard_expansion(Verb::Update)
            .iter()
            .filter(|f| f.id != "userKey")
            .map(|f| f.id)
            .collect();
        return Some(expanded.join(","));
    }
    Some(fields.to_string())
}

/// Assembles the sparse user body; the name substructure is allocated only
/// when one of its leaves is bound
pub fn build_user(values: &ValueMap) -> Result<Payload> {
    let mut p = Payload::new();
    p.set("primaryEmail", values, "primaryEmail");
    p.set("password", values, "password");
    p.set("orgUnitPath", values, "orgUnitPath");
    p.set("suspended", values, "suspended");
    p.set("changePasswordAtNextLogin", values, "changePasswordAtNextLogin");
    p.set("recoveryEmail", values, "recoveryEmail");
    p.set("recoveryPhone", values, "recoveryPhone");

    let mut name = Payload::new();
    name.set("givenName", values, "givenName");
    name.set("familyName", values, "familyName");
    p.set_object("name", name);

    Ok(p)
}
