//! Host functions exposed to policy scripts.
//!
//! This is the whole capability surface: nothing registered here touches
//! the process environment, and file reads go through a [`TreeReader`]
//! pinned to the revision under validation.

use std::sync::{Arc, Mutex};

use gk_policy::{
    check_genre, check_metadata, check_release_date, check_title, is_metadata_path,
    parse_document, Document,
};
use gk_store::TreeReader;
use gk_types::ChangeEntry;
use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Position};

/// Shared buffer collecting console output from one run.
pub(crate) type Console = Arc<Mutex<Vec<String>>>;

type HostResult = Result<Dynamic, Box<EvalAltResult>>;

pub(crate) fn register(
    engine: &mut Engine,
    changes: &[ChangeEntry],
    reader: TreeReader,
    metadata_filenames: Vec<String>,
    console: &Console,
) {
    register_console(engine, console);

    let staged: Arc<[ChangeEntry]> = changes.into();
    engine.register_fn("list_staged", move || -> Array {
        staged.iter().map(change_to_dynamic).collect()
    });

    engine.register_fn("read_file", move |path: &str| -> HostResult {
        match reader.read(path) {
            Ok(Some(bytes)) => Ok(Dynamic::from(String::from_utf8_lossy(&bytes).into_owned())),
            Ok(None) => Ok(Dynamic::UNIT),
            Err(e) => Err(format!("read_file('{path}') failed: {e}").into()),
        }
    });

    engine.register_fn("is_metadata_path", move |path: &str| {
        is_metadata_path(path, metadata_filenames.as_slice())
    });

    engine.register_fn("parse_document", |text: &str| -> HostResult {
        match parse_document(text.as_bytes()) {
            Ok(doc) => to_dynamic(&doc),
            Err(e) => {
                tracing::debug!(target: "gatekeeper::policy", error = %e, "parse_document returned ()");
                Ok(Dynamic::UNIT)
            }
        }
    });

    engine.register_fn("check_title", |doc: Map, label: &str| -> HostResult {
        Ok(optional(check_title(&to_document(doc)?, label)))
    });
    engine.register_fn("check_release_date", |doc: Map, label: &str| -> HostResult {
        Ok(optional(check_release_date(&to_document(doc)?, label)))
    });
    engine.register_fn("check_genre", |doc: Map, label: &str| -> HostResult {
        Ok(optional(check_genre(&to_document(doc)?, label)))
    });
    engine.register_fn(
        "check_metadata",
        |doc: Map, label: &str| -> Result<Array, Box<EvalAltResult>> {
            Ok(check_metadata(&to_document(doc)?, label)
                .into_iter()
                .map(Dynamic::from)
                .collect())
        },
    );
}

fn register_console(engine: &mut Engine, console: &Console) {
    let printed = Arc::clone(console);
    engine.on_print(move |text| {
        tracing::info!(target: "gatekeeper::policy", "{text}");
        printed.lock().expect("lock poisoned").push(text.to_string());
    });

    let debugged = Arc::clone(console);
    engine.on_debug(move |text, source, pos: Position| {
        tracing::debug!(target: "gatekeeper::policy", source, position = %pos, "{text}");
        debugged.lock().expect("lock poisoned").push(text.to_string());
    });
}

fn change_to_dynamic(change: &ChangeEntry) -> Dynamic {
    let mut map = Map::new();
    map.insert("status".into(), Dynamic::from(change.status.letter().to_string()));
    map.insert("path".into(), Dynamic::from(change.path.clone()));
    Dynamic::from_map(map)
}

fn to_document(doc: Map) -> Result<Document, Box<EvalAltResult>> {
    let value = Dynamic::from_map(doc);
    from_dynamic(&value)
}

fn optional(message: Option<String>) -> Dynamic {
    message.map_or(Dynamic::UNIT, Dynamic::from)
}
