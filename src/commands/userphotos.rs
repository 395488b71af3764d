//! User profile photos
//!
//! The file-bearing resource: update reads the photo from disk through the
//! injectable file source and sends it URL-safe base64-encoded, which is the
//! encoding the photos endpoint expects.

use std::path::Path;
use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::Value;

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::assemble::Payload;
use crate::batch::BatchOp;
use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::fileutil::{read_base64_urlsafe, FileSource};
use crate::flags::{Catalog, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS};
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
        id: "photoFile",
        kind: FlagKind::Str,
        available: &[Verb::Update],
        required: &[Verb::Update],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Update],
    },
    FlagDescriptor {
        id: "mimeType",
        kind: FlagKind::Str,
        available: &[Verb::Update],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Update],
    },
];

pub static CATALOG: Catalog = Catalog::new("userphotos", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::Update, Verb::Delete];

pub fn command() -> Command {
    resource_command("userphotos", "User profile photos", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "userKey", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    let files = Arc::clone(&ctx.files);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        let files = Arc::clone(&files);
        async move { execute(rest, files, verb, values).await }.boxed()
    })
}

async fn execute(
    rest: Arc<RestClient>,
    files: Arc<dyn FileSource>,
    verb: Verb,
    values: ValueMap,
) -> Result<Value> {
    let user = require_str(&values, "userKey")?;
    let url = format!(
        "{}/users/{}/photos/thumbnail",
        rest.endpoints().directory,
        user
    );

    match verb {
        Verb::Get => rest.get(&url, &[]).await,
        Verb::Update => {
            let path = require_str(&values, "photoFile")?;
            let encoded = read_base64_urlsafe(&*files, Path::new(&path))?;
            let mut body = Payload::new();
            body.set_value("photoData", Value::String(encoded));
            body.set("mimeType", &values, "mimeType");
            rest.put(&url, &body.into_value()).await
        }
        Verb::Delete => {
            rest.delete(&url).await?;
            Ok(delete_record(&[("userKey", &user)]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for userphotos",
            verb.name()
        ))),
    }
}
