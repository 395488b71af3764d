//! Custom user schemas
//!
//! `schemaFields` is the sub-structured list case: each occurrence (or each
//! CSV regrouping) is a `k=v;k=v` string describing one field, regrouped at
//! every `fieldName=` token.

use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::Value;

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::assemble::{check_enum, Payload};
use crate::batch::BatchOp;
use crate::bind::{parse_kv_pairs, ValueMap};
use crate::error::{Error, Result};
use crate::flags::{Catalog, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS};
use crate::rest::RestClient;

const FIELD_TYPES: &[&str] = &["STRING", "INT64", "BOOL", "DOUBLE", "EMAIL", "PHONE", "DATE"];

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "schemaKey",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Update, Verb::Delete],
        required: &[Verb::Get, Verb::Update, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "schemaName",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "displayName",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "schemaFields",
        kind: FlagKind::StrList,
        available: &[Verb::Insert, Verb::Update],
        required: &[Verb::Insert],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("schemas", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("schemas", "Custom user schemas", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "schemaKey", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        async move { execute(rest, verb, values).await }.boxed()
    })
}

async fn execute(rest: Arc<RestClient>, verb: Verb, values: ValueMap) -> Result<Value> {
    let base = format!(
        "{}/customer/my_customer/schemas",
        rest.endpoints().directory
    );

    match verb {
        Verb::Get => {
            let key = require_str(&values, "schemaKey")?;
            rest.get(&format!("{}/{}", base, key), &[]).await
        }
        Verb::List => rest.get(&base, &[]).await,
        Verb::Insert => {
            let body = build_schema(&values)?;
            rest.post(&base, &body.into_value()).await
        }
        Verb::Update => {
            let key = require_str(&values, "schemaKey")?;
            let body = build_schema(&values)?;
            rest.patch(&format!("{}/{}", base, key), &body.into_value())
                .await
        }
        Verb::Delete => {
            let key = require_str(&values, "schemaKey")?;
            rest.delete(&format!("{}/{}", base, key)).await?;
            Ok(delete_record(&[("schemaKey", &key)]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for schemas",
            verb.name()
        ))),
    }
}

fn build_schema(values: &ValueMap) -> Result<Payload> {
    let mut p = Payload::new();
    p.set("schemaName", values, "schemaName");
    p.set("displayName", values, "displayName");

    if let Some(items) = values.list_value("schemaFields") {
        p.set_object_list("fields", build_fields(items)?);
    }
    Ok(p)
}

/// One field spec per `fieldName=` boundary
fn build_fields(items: &[String]) -> Result<Vec<Payload>> {
    let mut fields: Vec<Payload> = Vec::new();
    for item in items {
        if item.is_empty() {
            continue;
        }
        for (key, value) in parse_kv_pairs(item)? {
            match key.as_str() {
                "fieldName" => {
                    let mut f = Payload::new();
                    f.set_value("fieldName", Value::String(value));
                    fields.push(f);
                }
                "fieldType" => {
                    check_enum("schemaFields.fieldType", &value, FIELD_TYPES)?;
                    current(&mut fields, &key)?.set_value("fieldType", Value::String(value));
                }
                "multiValued" => {
                    let b = matches!(value.as_str(), "true" | "yes");
                    current(&mut fields, &key)?.set_value("multiValued", Value::Bool(b));
                }
                "readAccessType" => {
                    check_enum(
                        "schemaFields.readAccessType",
                        &value,
                        &["READ_ONLY", "ADMINS_AND_SELF"],
                    )?;
                    current(&mut fields, &key)?
                        .set_value("readAccessType", Value::String(value));
                }
                other => {
                    return Err(Error::InvalidInvocation(format!(
                        "unknown schemaFields key {:?}",
                        other
                    )))
                }
            }
        }
    }
    Ok(fields)
}

fn current<'a>(fields: &'a mut Vec<Payload>, key: &str) -> Result<&'a mut Payload> {
    fields.last_mut().ok_or_else(|| {
        Error::InvalidInvocation(format!("schemaFields {} before any fieldName", key))
    })
}
