//! Data-layer event contract
//!
//! The persistence and network layers talk to the engine only through these
//! events. A requester notifies a `DataLoadRequest`/`DataSaveRequest`; the
//! data layer answers with `DataLoaded`/`DataSaved` carrying the same request
//! id in the context.

use toml::{Table, Value};

use super::{Event, EventTag, Owner};
use crate::ecs::context::Context;
use crate::ecs::kind::Kind;

/// Root of all data-layer events
pub const DATA_EVENT: Kind = Kind::root("DataEvent");
/// Ask the data layer to load something
pub const DATA_LOAD_REQUEST: Kind = Kind::derived("DataLoadRequest", &DATA_EVENT);
/// Ask the data layer to save something
pub const DATA_SAVE_REQUEST: Kind = Kind::derived("DataSaveRequest", &DATA_EVENT);
/// A load finished
pub const DATA_LOADED: Kind = Kind::derived("DataLoaded", &DATA_EVENT);
/// A save finished
pub const DATA_SAVED: Kind = Kind::derived("DataSaved", &DATA_EVENT);

/// Context key holding the request id
pub const KEY_REQUEST_ID: &str = "data.request_id";
/// Context key holding the dotted path of the data
pub const KEY_PATH: &str = "data.path";
/// Context key holding the payload
pub const KEY_PAYLOAD: &str = "data.payload";

/// Build a load request for the data at `path`
pub fn load_request(owner: Owner, request_id: EventTag, path: &str) -> Event {
    Event::new(DATA_LOAD_REQUEST, owner, request_id).with_context(
        Context::new("DataLoadRequest")
            .with(KEY_REQUEST_ID, request_id)
            .with(KEY_PATH, path),
    )
}

/// Build a save request for `payload` at `path`
pub fn save_request(owner: Owner, request_id: EventTag, path: &str, payload: Table) -> Event {
    Event::new(DATA_SAVE_REQUEST, owner, request_id).with_context(
        Context::new("DataSaveRequest")
            .with(KEY_REQUEST_ID, request_id)
            .with(KEY_PATH, path)
            .with(KEY_PAYLOAD, Value::Table(payload)),
    )
}

/// Answer a load request with the loaded data
pub fn loaded(request: &Event, payload: Table) -> Event {
    Event::new(DATA_LOADED, request.owner(), request.tag())
        .with_context(reply_context(request, "DataLoaded").with(KEY_PAYLOAD, Value::Table(payload)))
}

/// Answer a save request
pub fn saved(request: &Event) -> Event {
    Event::new(DATA_SAVED, request.owner(), request.tag())
        .with_context(reply_context(request, "DataSaved"))
}

/// Payload carried by a load/save event, if any
pub fn payload(event: &Event) -> Option<&Table> {
    event.context()?.get(KEY_PAYLOAD)?.as_table()
}

/// Dotted data path carried by a data event, if any
pub fn path(event: &Event) -> Option<&str> {
    event.context()?.get(KEY_PATH)?.as_str()
}

fn reply_context(request: &Event, label: &str) -> Context {
    let context = Context::new(label).with(KEY_REQUEST_ID, request.tag());
    match path(request) {
        Some(path) => context.with(KEY_PATH, path),
        None => context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::identity::{MonotonicId, SystemId};

    #[test]
    fn test_request_and_reply() {
        let owner = Owner::System(SystemId::from_raw(2));
        let request = load_request(owner, 41, "saved.party");
        assert!(request.kind().is_a(&DATA_EVENT));
        assert_eq!(path(&request), Some("saved.party"));

        let mut data = Table::new();
        data.insert("gold".to_string(), Value::Integer(150));
        let reply = loaded(&request, data);
        assert_eq!(reply.kind(), &DATA_LOADED);
        assert_eq!(reply.owner(), owner);
        assert_eq!(reply.tag(), 41);
        assert_eq!(path(&reply), Some("saved.party"));
        assert_eq!(
            payload(&reply).and_then(|p| p.get("gold")).and_then(Value::as_integer),
            Some(150)
        );
    }

    #[test]
    fn test_save_round() {
        let request = save_request(Owner::None, 3, "saved.party", Table::new());
        assert_eq!(request.kind(), &DATA_SAVE_REQUEST);
        assert!(payload(&request).is_some());

        let reply = saved(&request);
        assert_eq!(reply.kind(), &DATA_SAVED);
        assert!(payload(&reply).is_none());
    }
}
