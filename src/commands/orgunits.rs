//! Organizational units
//!
//! Org units are addressed by path; the Directory API wants the leading
//! slash stripped from the URL segment but kept everywhere else.

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
        id: "orgUnitPath",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Update, Verb::Delete, Verb::List],
        required: &[Verb::Get, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::List, DefaultValue::Str("/"))],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "name",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "parentOrgUnitPath",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::Insert, DefaultValue::Str("/"))],
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
        id: "blockInheritance",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "type",
        kind: FlagKind::Str,
        available: &[Verb::List],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[(Verb::List, DefaultValue::Str("children"))],
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("orgunits", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("orgunits", "Organizational units", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "orgUnitPath", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

fn path_segment(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let base = format!(
        "{}/customer/my_customer/orgunits",
        rest.endpoints().directory
    );

    match verb {
        Verb::Get => {
            let path = require_str(&values, "orgUnitPath")?;
            rest.get(&format!("{}/{}", base, path_segment(&path)), &[])
                .await
        }
        Verb::List => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(path) = values.str_value("orgUnitPath") {
                query.push(("orgUnitPath", path.to_string()));
            }
            if let Some(kind) = values.str_value("type") {
                check_enum("type", kind, &["all", "children", "allIncludingParent"])?;
                query.push(("type", kind.to_string()));
            }
            rest.get(&base, &query).await
        }
        Verb::Insert => {
            let body = build_orgunit(&values)?;
            rest.post(&base, &body.into_value()).await
        }
        Verb::Update => {
            let path = require_str(&values, "orgUnitPath")?;
            let body = build_orgunit(&values)?;
            rest.patch(
                &format!("{}/{}", base, path_segment(&path)),
                &body.into_value(),
            )
            .await
        }
        Verb::Delete => {
            let path = require_str(&values, "orgUnitPath")?;
            rest.delete(&format!("{}/{}", base, path_segment(&path)))
                .await?;
            Ok(delete_record(&[("orgUnitPath", &path)]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for orgunits",
            verb.name()
        ))),
    }
}

fn build_orgunit(values: &ValueMap) -> Result<Payload> {
    let mut p = Payload::new();
    p.set("name", values, "name");
    p.set("parentOrgUnitPath", values, "parentOrgUnitPath");
    p.set("description", values, "description");
    p.set("blockInheritance", values, "blockInheritance");
    Ok(p)
}
