//! Streaming access to snapshot documents
//!
//! Resources are decoded one element at a time from the `resources` array
//! and handed to a callback, so memory stays bounded by a single resource
//! regardless of document size. Other top-level keys are skipped without
//! being materialised. Cancellation is checked before every element.

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::cancel::CancellationToken;
use crate::constants::BUFFER_SIZE;
use crate::error::{Error, Phase, Result};
use crate::models::Resource;

/// Invoke `visit` for every resource in the snapshot document at `path`.
///
/// Returns the number of resources visited. Aborts at the first decode
/// error, callback error or cancellation.
pub fn for_each_resource<F>(path: &Path, cancel: &CancellationToken, mut visit: F) -> Result<usize>
where
    F: FnMut(Resource) -> Result<()>,
{
    let file = File::open(path).map_err(|e| Error::io(Phase::Read, path, e))?;
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut de = serde_json::Deserializer::from_reader(reader);

    let mut state = StreamState {
        visit: &mut visit,
        cancel,
        count: 0,
        abort: None,
    };
    let outcome = DocumentSeed { state: &mut state }.deserialize(&mut de);

    // A stashed abort reason wins over the decode error it was smuggled through
    if let Some(err) = state.abort.take() {
        return Err(err);
    }
    outcome.map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    de.end().map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(state.count)
}

/// Count resources without keeping any of them
pub fn count_resources(path: &Path, cancel: &CancellationToken) -> Result<usize> {
    for_each_resource(path, cancel, |_| Ok(()))
}

struct StreamState<'a, F> {
    visit: &'a mut F,
    cancel: &'a CancellationToken,
    count: usize,
    abort: Option<Error>,
}

struct DocumentSeed<'s, 'a, F> {
    state: &'s mut StreamState<'a, F>,
}

impl<'de, 's, 'a, F> DeserializeSeed<'de> for DocumentSeed<'s, 'a, F>
where
    F: FnMut(Resource) -> Result<()>,
{
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 's, 'a, F> Visitor<'de> for DocumentSeed<'s, 'a, F>
where
    F: FnMut(Resource) -> Result<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snapshot document")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            if key == "resources" {
                map.next_value_seed(ResourcesSeed {
                    state: &mut *self.state,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct ResourcesSeed<'s, 'a, F> {
    state: &'s mut StreamState<'a, F>,
}

impl<'de, 's, 'a, F> DeserializeSeed<'de> for ResourcesSeed<'s, 'a, F>
where
    F: FnMut(Resource) -> Result<()>,
{
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 's, 'a, F> Visitor<'de> for ResourcesSeed<'s, 'a, F>
where
    F: FnMut(Resource) -> Result<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of resources")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        loop {
            if self.state.cancel.is_cancelled() {
                self.state.abort = Some(Error::Cancelled);
                return Err(de::Error::custom("cancelled"));
            }
            let Some(resource) = seq.next_element::<Resource>()? else {
                return Ok(());
            };
            if let Err(err) = (self.state.visit)(resource) {
                self.state.abort = Some(err);
                return Err(de::Error::custom("visitor aborted"));
            }
            self.state.count += 1;
        }
    }
}
