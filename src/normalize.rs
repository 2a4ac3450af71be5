//! Response normalization pipeline
//!
//! The catalog's XML serialization is irregular: conceptually-list fields are
//! pipe-delimited strings, blank fields decode as empty objects, and a handful
//! of entity lists arrive wrapped in an extra envelope element. This module
//! holds the rules that collapse those irregular shapes into the catalog's
//! logical schema, plus the merge step for archive responses that bundle
//! several XML files into one logical payload.
//!
//! The pipeline operates on the generic tree produced by [`crate::decode`] and
//! is pure data transformation: no I/O, no shared state, total functions apart
//! from the two explicit error cases ([`NormalizeError::Remote`] and
//! [`NormalizeError::UnexpectedShape`]).

use crate::xml_decode::{self, DecodeError};
use serde_json::{Map, Value};
use thiserror::Error;

/// A single normalized catalog record: named fields mapping to scalars,
/// string lists, or nested records. Field order follows the source document.
pub type Record = Map<String, Value>;

/// Errors produced while normalizing a decoded response
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The response carried the catalog's error marker instead of a payload
    #[error("TheTVDB returned an error: {0}")]
    Remote(String),

    /// The response claimed an entity envelope but its expected content
    /// was missing or had the wrong shape
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// An archive entry could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The logical entity type a response is expected to carry.
///
/// The kind is decided once at the call boundary, by which endpoint was
/// invoked, rather than re-inferred from the payload's keys. Each kind selects
/// the reshaping that entity needs: envelope flattening for actor, banner, and
/// language lists, and pipe-list splitting for the fields that are serialized
/// as `|`-delimited strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A series record or list of search results under the `Series` key
    Series,
    /// An episode record or list under the `Episode` key
    Episode,
    /// An actor list wrapped in an `Actors` envelope
    Actor,
    /// A banner list wrapped in a `Banners` envelope
    Banner,
    /// A language list wrapped in a `Languages` envelope
    Language,
    /// No reshaping beyond the generic pipeline steps
    Unknown,
}

impl EntityKind {
    /// Maps a payload's top-level key to the entity kind it carries.
    ///
    /// Used for merged archives, where one payload holds several entity keys
    /// at once and every matching reshape must run.
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "Series" => Some(Self::Series),
            "Episode" => Some(Self::Episode),
            "Actors" => Some(Self::Actor),
            "Banners" => Some(Self::Banner),
            "Languages" => Some(Self::Language),
            _ => None,
        }
    }
}

/// Fails with [`NormalizeError::Remote`] when the decoded tree carries the
/// catalog's error marker.
///
/// Runs against the raw decoded tree, before envelope unwrapping: the marker
/// is the response's root element, so it would be destroyed by unwrapping.
/// A response with the marker never carries a payload.
pub fn detect_error(tree: &Value) -> Result<(), NormalizeError> {
    if let Value::Object(map) = tree
        && let Some(marker) = map.get("Error")
    {
        return Err(NormalizeError::Remote(error_message(marker)));
    }
    Ok(())
}

/// Renders the error marker's content as a message string.
fn error_message(marker: &Value) -> String {
    match marker {
        Value::String(message) => message.clone(),
        // A blank <Error/> element decodes as an empty object
        Value::Object(map) if map.is_empty() => String::new(),
        other => other.to_string(),
    }
}

/// Strips the catalog's universal single-root wrapper.
///
/// Every response wraps its payload in one root key, `Data` or `Items`. When
/// the input is an object with exactly one key and that key is one of the two
/// recognized names, the value underneath is returned; any other shape passes
/// through unchanged, so unrecognized envelopes keep working.
pub fn unwrap_envelope(tree: Value) -> Value {
    match tree {
        Value::Object(mut map) if map.len() == 1 => {
            let key = map.keys().next().map(String::as_str);
            if matches!(key, Some("Data") | Some("Items")) {
                map.values_mut()
                    .next()
                    .map(Value::take)
                    .unwrap_or(Value::Null)
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

/// Recursively rewrites every empty object into an empty string.
///
/// Empty XML elements decode as empty objects; logically they mean a blank
/// field. The rewrite applies everywhere in the tree, including inside arrays
/// and nested objects, and is idempotent. Scalars and non-empty composites
/// keep their shape and order.
pub fn collapse_empty(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                *value = Value::String(String::new());
            } else {
                for nested in map.values_mut() {
                    collapse_empty(nested);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collapse_empty(item);
            }
        }
        _ => {}
    }
}

/// Splits a pipe-delimited scalar into its non-empty tokens.
///
/// Leading, trailing, and doubled delimiters produce empty segments, which
/// are dropped; the relative order of the surviving tokens is preserved. Any
/// non-string input (a collapsed blank field, an empty object, an array)
/// yields an empty list rather than an error.
///
/// # Examples
///
/// ```
/// use thetvdb_client::split_pipe;
/// use serde_json::json;
///
/// assert_eq!(
///     split_pipe(&json!("|Apes||Oranges|Man|")),
///     vec!["Apes", "Oranges", "Man"]
/// );
/// assert!(split_pipe(&json!({})).is_empty());
/// ```
pub fn split_pipe(value: &Value) -> Vec<String> {
    match value.as_str() {
        Some(raw) => raw
            .split('|')
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Replaces the named fields of a record, or of every record in an array,
/// with their pipe-split list form.
///
/// The dual arity exists because the catalog returns a single record or a
/// list for the same logical endpoint depending on how many results there
/// were; callers never branch on cardinality before splitting. Fields that
/// are absent or not strings end up as empty lists.
pub fn split_pipe_fields(value: &mut Value, fields: &[&str]) {
    match value {
        Value::Array(records) => {
            for record in records {
                split_pipe_fields(record, fields);
            }
        }
        Value::Object(record) => {
            for field in fields {
                let tokens = record.get(*field).map(split_pipe).unwrap_or_default();
                record.insert(
                    (*field).to_string(),
                    Value::Array(tokens.into_iter().map(Value::String).collect()),
                );
            }
        }
        _ => {}
    }
}

/// Applies the reshape one entity kind needs to an unwrapped payload.
///
/// At most one top-level key matches per kind; when the key is absent the
/// call is a no-op, so the same payload can be run through several kinds (the
/// merged-archive case) without interference.
fn assemble(kind: EntityKind, payload: &mut Record) -> Result<(), NormalizeError> {
    match kind {
        EntityKind::Series => {
            if let Some(series) = payload.get_mut("Series") {
                split_pipe_fields(series, &["Actors", "Genre"]);
            }
        }
        EntityKind::Episode => {
            if let Some(episodes) = payload.get_mut("Episode") {
                split_pipe_fields(episodes, &["GuestStars", "Director", "Writer"]);
            }
        }
        EntityKind::Actor => {
            flatten_envelope(payload, "Actors", "Actor")?;
        }
        EntityKind::Banner => {
            if flatten_envelope(payload, "Banners", "Banner")?
                && let Some(banners) = payload.get_mut("Banners")
            {
                split_pipe_fields(banners, &["Colors"]);
            }
        }
        EntityKind::Language => {
            flatten_envelope(payload, "Languages", "Language")?;
        }
        EntityKind::Unknown => {}
    }
    Ok(())
}

/// Collapses one envelope level: `payload[outer]` is replaced by the value of
/// its nested `inner` field.
///
/// Returns whether a replacement happened. A blank envelope (empty object, or
/// an already-collapsed empty string) means "no entries" and is left alone
/// for the empty-element collapser; an envelope that has content but not the
/// expected nested field is malformed and fails, so callers can tell "no
/// actors" apart from a broken actors envelope.
fn flatten_envelope(
    payload: &mut Record,
    outer: &str,
    inner: &str,
) -> Result<bool, NormalizeError> {
    let Some(envelope) = payload.get_mut(outer) else {
        return Ok(false);
    };

    let entries = match envelope {
        Value::Object(map) if map.is_empty() => return Ok(false),
        Value::String(text) if text.is_empty() => return Ok(false),
        Value::Object(map) => match map.get_mut(inner) {
            Some(entries) => entries.take(),
            None => {
                return Err(NormalizeError::UnexpectedShape(format!(
                    "`{outer}` envelope is missing its `{inner}` entries"
                )));
            }
        },
        _ => {
            return Err(NormalizeError::UnexpectedShape(format!(
                "`{outer}` envelope is not an object"
            )));
        }
    };

    payload.insert(outer.to_string(), entries);
    Ok(true)
}

/// Normalizes one decoded response into its logical payload.
///
/// Pipeline order: error detection on the raw tree, envelope unwrapping, the
/// entity-specific reshape for `kind`, and finally one tree-wide
/// empty-element collapse. No partially-normalized tree is ever returned
/// alongside an error.
pub fn normalize_single(decoded: Value, kind: EntityKind) -> Result<Value, NormalizeError> {
    detect_error(&decoded)?;
    let mut payload = unwrap_envelope(decoded);

    if let Value::Object(map) = &mut payload {
        assemble(kind, map)?;
    }

    collapse_empty(&mut payload);
    Ok(payload)
}

/// Normalizes a multi-file archive response into one merged payload.
///
/// Each entry is decoded independently and overlaid into a single
/// accumulator: every top-level key of an entry's unwrapped payload is
/// assigned into the result, later entries winning on collision. The
/// catalog's archives contribute disjoint keys per file, so in practice
/// nothing collides. Once every entry is consumed, each entity key present in
/// the accumulator gets its reshape, followed by a final empty-element
/// collapse.
pub fn normalize_archive(entries: &[(String, Vec<u8>)]) -> Result<Record, NormalizeError> {
    let mut merged = Record::new();

    for (_, bytes) in entries {
        let decoded = xml_decode::decode(bytes)?;
        detect_error(&decoded)?;

        let mut payload = unwrap_envelope(decoded);
        collapse_empty(&mut payload);

        if let Value::Object(map) = payload {
            for (key, value) in map {
                merged.insert(key, value);
            }
        }
    }

    // Every entity key the merge surfaced gets its reshape
    let kinds: Vec<EntityKind> = merged.keys().filter_map(|k| EntityKind::from_key(k)).collect();
    for kind in kinds {
        assemble(kind, &mut merged)?;
    }

    for value in merged.values_mut() {
        collapse_empty(value);
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_recognizes_data_and_items_envelopes() {
        let unwrapped = unwrap_envelope(json!({"Data": {"Series": [{"id": "1"}]}}));
        assert_eq!(unwrapped, json!({"Series": [{"id": "1"}]}));

        let unwrapped = unwrap_envelope(json!({"Items": {"Item": "x"}}));
        assert_eq!(unwrapped, json!({"Item": "x"}));
    }

    #[test]
    fn test_unwrap_passes_unrecognized_roots_through() {
        let tree = json!({"Foo": {"bar": "baz"}});
        assert_eq!(unwrap_envelope(tree.clone()), tree);

        // Two keys means no envelope, even when one of them is `Data`
        let tree = json!({"Data": {}, "Extra": "x"});
        assert_eq!(unwrap_envelope(tree.clone()), tree);

        let scalar = json!("just text");
        assert_eq!(unwrap_envelope(scalar.clone()), scalar);
    }

    #[test]
    fn test_error_marker_takes_precedence_over_everything() {
        let tree = json!({"Error": "Not found", "Data": {"Series": [{"id": "1"}]}});

        match normalize_single(tree, EntityKind::Series) {
            Err(NormalizeError::Remote(message)) => assert_eq!(message, "Not found"),
            other => panic!("expected a remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_error_marker_yields_empty_message() {
        match detect_error(&json!({"Error": {}})) {
            Err(NormalizeError::Remote(message)) => assert_eq!(message, ""),
            other => panic!("expected a remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_collapse_empty_rewrites_empty_objects_at_any_depth() {
        let mut tree = json!({
            "Series": [{"IMDB_ID": {}, "Overview": "text", "Nested": {"inner": {}}}],
            "Blank": {}
        });
        collapse_empty(&mut tree);

        assert_eq!(
            tree,
            json!({
                "Series": [{"IMDB_ID": "", "Overview": "text", "Nested": {"inner": ""}}],
                "Blank": ""
            })
        );
    }

    #[test]
    fn test_collapse_empty_is_idempotent() {
        let mut once = json!({"a": {}, "b": [{"c": {}}, "x"], "d": "y"});
        collapse_empty(&mut once);
        let mut twice = once.clone();
        collapse_empty(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_split_pipe_drops_empty_segments_and_keeps_order() {
        assert_eq!(
            split_pipe(&json!("|Apes||Oranges|Man|")),
            vec!["Apes", "Oranges", "Man"]
        );
        assert_eq!(split_pipe(&json!("solo")), vec!["solo"]);
    }

    #[test]
    fn test_split_pipe_of_non_strings_is_empty() {
        assert!(split_pipe(&json!({})).is_empty());
        assert!(split_pipe(&json!("")).is_empty());
        assert!(split_pipe(&json!(["already", "a", "list"])).is_empty());
        assert!(split_pipe(&json!(null)).is_empty());
    }

    #[test]
    fn test_split_pipe_fields_handles_one_record_or_many() {
        let mut single = json!({"Genre": "Drama|Crime|", "id": "1"});
        split_pipe_fields(&mut single, &["Genre"]);
        assert_eq!(single, json!({"Genre": ["Drama", "Crime"], "id": "1"}));

        let mut many = json!([
            {"Genre": "Drama", "id": "1"},
            {"Genre": "|Comedy|Sketch", "id": "2"}
        ]);
        split_pipe_fields(&mut many, &["Genre"]);
        assert_eq!(
            many,
            json!([
                {"Genre": ["Drama"], "id": "1"},
                {"Genre": ["Comedy", "Sketch"], "id": "2"}
            ])
        );
    }

    #[test]
    fn test_split_pipe_fields_replaces_absent_fields_with_empty_lists() {
        let mut record = json!({"id": "1"});
        split_pipe_fields(&mut record, &["GuestStars", "Director"]);
        assert_eq!(record, json!({"id": "1", "GuestStars": [], "Director": []}));
    }

    #[test]
    fn test_actors_envelope_flattens_to_its_actor_list() {
        let decoded = json!({"Actors": {"Actor": [{"Name": "A"}, {"Name": "B"}]}});
        let normalized = normalize_single(decoded, EntityKind::Actor).unwrap();
        assert_eq!(normalized, json!({"Actors": [{"Name": "A"}, {"Name": "B"}]}));
    }

    #[test]
    fn test_blank_actors_envelope_collapses_instead_of_failing() {
        let decoded = json!({"Actors": {}});
        let normalized = normalize_single(decoded, EntityKind::Actor).unwrap();
        assert_eq!(normalized, json!({"Actors": ""}));
    }

    #[test]
    fn test_malformed_actors_envelope_is_an_error() {
        let decoded = json!({"Actors": {"Unexpected": "content"}});
        assert!(matches!(
            normalize_single(decoded, EntityKind::Actor),
            Err(NormalizeError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_series_pipe_fields_split_after_unwrapping() {
        let decoded = json!({"Data": {"Series": [{
            "SeriesName": "The Wire",
            "Genre": "Drama|Crime|",
            "Actors": "|Dominic West|Idris Elba|"
        }]}});

        let normalized = normalize_single(decoded, EntityKind::Series).unwrap();
        let series = &normalized["Series"][0];
        assert_eq!(series["Genre"], json!(["Drama", "Crime"]));
        assert_eq!(series["Actors"], json!(["Dominic West", "Idris Elba"]));
        assert_eq!(series["SeriesName"], "The Wire");
    }

    #[test]
    fn test_banner_colors_split_per_record() {
        let decoded = json!({"Banners": {"Banner": [
            {"BannerPath": "a.jpg", "Colors": "|1,1,1|2,2,2|"},
            {"BannerPath": "b.jpg", "Colors": {}}
        ]}});

        let normalized = normalize_single(decoded, EntityKind::Banner).unwrap();
        assert_eq!(
            normalized["Banners"],
            json!([
                {"BannerPath": "a.jpg", "Colors": ["1,1,1", "2,2,2"]},
                {"BannerPath": "b.jpg", "Colors": []}
            ])
        );
    }

    #[test]
    fn test_languages_envelope_flattens() {
        let decoded = json!({"Data": {"Languages": {"Language": [{"abbreviation": "en"}]}}});
        let normalized = normalize_single(decoded, EntityKind::Language).unwrap();
        assert_eq!(normalized, json!({"Languages": [{"abbreviation": "en"}]}));
    }

    #[test]
    fn test_unknown_kind_only_runs_the_generic_steps() {
        let decoded = json!({"Data": {"Anything": {"blank": {}}}});
        let normalized = normalize_single(decoded, EntityKind::Unknown).unwrap();
        assert_eq!(normalized, json!({"Anything": {"blank": ""}}));
    }

    #[test]
    fn test_empty_elements_surface_as_empty_strings_inside_episode_lists() {
        // An episode list where one record's GuestStars was a blank element:
        // the split turns it into an empty list, and the blank Overview
        // inside the nested record collapses to an empty string.
        let decoded = json!({"Data": {"Episode": [
            {"EpisodeName": "Pilot", "GuestStars": "|A|B|", "Overview": {}},
            {"EpisodeName": "Two", "GuestStars": {}, "Overview": "text"}
        ]}});

        let normalized = normalize_single(decoded, EntityKind::Episode).unwrap();
        assert_eq!(
            normalized["Episode"],
            json!([
                {"EpisodeName": "Pilot", "GuestStars": ["A", "B"],
                 "Overview": "", "Director": [], "Writer": []},
                {"EpisodeName": "Two", "GuestStars": [],
                 "Overview": "text", "Director": [], "Writer": []}
            ])
        );
    }

    fn entry(name: &str, xml: &str) -> (String, Vec<u8>) {
        (name.to_string(), xml.as_bytes().to_vec())
    }

    #[test]
    fn test_archive_merge_combines_keys_from_every_entry() {
        let entries = vec![
            entry(
                "en.xml",
                "<Data><Series><SeriesName>X</SeriesName><Genre>Drama|Crime</Genre></Series>\
                 <Episode><EpisodeName>Pilot</EpisodeName></Episode></Data>",
            ),
            entry(
                "actors.xml",
                "<Actors><Actor><Name>A</Name></Actor></Actors>",
            ),
            entry(
                "banners.xml",
                "<Banners><Banner><BannerPath>b.jpg</BannerPath><Colors>|1|2|</Colors>\
                 </Banner></Banners>",
            ),
        ];

        let merged = normalize_archive(&entries).unwrap();

        assert_eq!(merged["Series"][0]["Genre"], json!(["Drama", "Crime"]));
        assert_eq!(
            merged["Episode"],
            json!([{"EpisodeName": "Pilot", "GuestStars": [], "Director": [], "Writer": []}])
        );
        assert_eq!(merged["Actors"], json!([{"Name": "A"}]));
        assert_eq!(
            merged["Banners"],
            json!([{"BannerPath": "b.jpg", "Colors": ["1", "2"]}])
        );
    }

    #[test]
    fn test_archive_merge_later_entries_win_on_key_collision() {
        let entries = vec![
            entry("first.xml", "<Data><Series><id>1</id></Series></Data>"),
            entry("second.xml", "<Data><Series><id>2</id></Series></Data>"),
        ];

        let merged = normalize_archive(&entries).unwrap();
        assert_eq!(merged["Series"], json!([{"id": "2", "Actors": [], "Genre": []}]));
    }

    #[test]
    fn test_archive_merge_fails_on_an_error_entry() {
        let entries = vec![entry("oops.xml", "<Error>key not found</Error>")];

        match normalize_archive(&entries) {
            Err(NormalizeError::Remote(message)) => assert_eq!(message, "key not found"),
            other => panic!("expected a remote error, got {other:?}"),
        }
    }
}
