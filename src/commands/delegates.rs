//! Gmail delegate settings
//!
//! The smallest catalog in the tree: a delegate is identified entirely by
//! the mailbox owner and the delegate address, so create and delete are the
//! interesting verbs and both fan out well over org units and groups.

use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::{json, Value};

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::batch::BatchOp;
use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::flags::{Catalog, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS};
use crate::rest::RestClient;

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "userId",
        kind: FlagKind::Str,
        available: &[Verb::All],
        required: &[Verb::Insert, Verb::Get, Verb::List, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "delegateEmail",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Get, Verb::Delete],
        required: &[Verb::Insert, Verb::Get, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Delete],
    },
];

pub static CATALOG: Catalog = Catalog::new("delegates", FLAGS);

const VERBS: &[Verb] = &[Verb::Insert, Verb::Get, Verb::List, Verb::Delete];

pub fn command() -> Command {
    resource_command("delegates", "Gmail mailbox delegates", &CATALOG, VERBS)
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
    let user = require_str(&values, "userId")?;
    let base = format!("{}/users/{}/settings/delegates", rest.endpoints().gmail, user);

    match verb {
        Verb::Insert => {
            let delegate = require_str(&values, "delegateEmail")?;
            rest.post(&base, &json!({ "delegateEmail": delegate })).await
        }
        Verb::Get => {
            let delegate = require_str(&values, "delegateEmail")?;
            rest.get(&format!("{}/{}", base, delegate), &[]).await
        }
        Verb::List => rest.get(&base, &[]).await,
        Verb::Delete => {
            let delegate = require_str(&values, "delegateEmail")?;
            rest.delete(&format!("{}/{}", base, delegate)).await?;
            Ok(delete_record(&[
                ("userId", &user),
                ("delegateEmail", &delegate),
            ]))
        }
        _ => Err(unsupported(verb)),
    }
}

fn unsupported(verb: Verb) -> Error {
    Error::InvalidInvocation(format!("verb {} not supported for delegates", verb.name()))
}
