//! Client facade for the legacy TheTVDB XML API.
//!
//! Builds endpoint URLs, performs the blocking HTTP requests, and feeds the
//! raw response bytes through the decoder and the normalization pipeline.
//! All request logic lives here; everything with actual rules lives in
//! [`crate::normalize`].

use crate::archive;
use crate::normalize::{self, EntityKind, NormalizeError, Record};
use crate::xml_decode;
use crate::TvdbError;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// The timeframe covered by an updates archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    /// Records updated within the last day
    #[default]
    Day,
    /// Records updated within the last week
    Week,
    /// Records updated within the last month
    Month,
    /// Every record the catalog ever updated
    All,
}

impl Timeframe {
    /// The URL path fragment for this timeframe.
    fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }
}

/// Client for the legacy TheTVDB XML API.
///
/// Holds the immutable per-client configuration (API key, mirror host,
/// preferred language) and a blocking HTTP client. One instance can serve any
/// number of calls; no state is shared between them beyond the configuration.
///
/// # Examples
///
/// ```no_run
/// use thetvdb_client::TvdbClient;
///
/// let client = TvdbClient::new("ABC123").with_language("de");
/// let results = client.search_series("The Wire").unwrap();
/// for series in &results {
///     println!("{}", series["SeriesName"]);
/// }
/// ```
pub struct TvdbClient {
    client: reqwest::blocking::Client,
    api_key: String,
    mirror: String,
    language: String,
}

impl TvdbClient {
    /// Creates a client for the given API key, with the default mirror
    /// (`http://www.thetvdb.com`) and language (`en`).
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key: api_key.into(),
            mirror: "http://www.thetvdb.com".to_string(),
            language: "en".to_string(),
        }
    }

    /// Replaces the mirror host. A trailing slash is stripped so URL
    /// templates stay well-formed.
    pub fn with_mirror(mut self, mirror: impl Into<String>) -> Self {
        let mirror = mirror.into();
        self.mirror = mirror.trim_end_matches('/').to_string();
        self
    }

    /// Replaces the preferred language (a two-letter catalog abbreviation,
    /// see [`TvdbClient::languages`]).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    // URL templates, one per endpoint

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.mirror, self.api_key, path)
    }

    fn search_series_url(&self, name: &str) -> String {
        format!(
            "{}/api/GetSeries.php?seriesname={}",
            self.mirror,
            urlencoding::encode(name)
        )
    }

    fn series_url(&self, series_id: u32) -> String {
        self.api_url(&format!("series/{}/{}.xml", series_id, self.language))
    }

    fn series_all_url(&self, series_id: u32) -> String {
        self.api_url(&format!("series/{}/all/{}.zip", series_id, self.language))
    }

    fn episode_url(&self, episode_id: u32) -> String {
        self.api_url(&format!("episodes/{}/{}.xml", episode_id, self.language))
    }

    fn episode_by_airing_url(&self, series_id: u32, season: u32, episode: u32) -> String {
        self.api_url(&format!(
            "series/{}/default/{}/{}/{}.xml",
            series_id, season, episode, self.language
        ))
    }

    fn episode_by_dvd_url(&self, series_id: u32, season: u32, episode: u32) -> String {
        self.api_url(&format!(
            "series/{}/dvd/{}/{}/{}.xml",
            series_id, season, episode, self.language
        ))
    }

    fn episode_by_absolute_url(&self, series_id: u32, absolute: u32) -> String {
        self.api_url(&format!(
            "series/{}/default/{}/{}.xml",
            series_id, absolute, self.language
        ))
    }

    fn actors_url(&self, series_id: u32) -> String {
        self.api_url(&format!("series/{}/actors.xml", series_id))
    }

    fn banners_url(&self, series_id: u32) -> String {
        self.api_url(&format!("series/{}/banners.xml", series_id))
    }

    fn languages_url(&self) -> String {
        self.api_url("languages.xml")
    }

    fn updates_url(&self, timeframe: Timeframe) -> String {
        self.api_url(&format!("updates/updates_{}.zip", timeframe.as_str()))
    }

    fn banner_url(&self, banner_path: &str) -> String {
        format!("{}/banners/{}", self.mirror, banner_path)
    }

    // Transport

    /// Fetches a URL and returns the response body, mapping any non-2xx
    /// status to a request error.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TvdbError> {
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TvdbError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TvdbError::Request(format!(
                "HTTP {} {} for {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                url
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| TvdbError::Request(e.to_string()))?;
        Ok(body.to_vec())
    }

    /// Fetches one XML document and runs it through the pipeline.
    fn fetch_normalized(&self, url: &str, kind: EntityKind) -> Result<Value, TvdbError> {
        let body = self.fetch(url)?;
        let decoded = xml_decode::decode(&body)?;
        Ok(normalize::normalize_single(decoded, kind)?)
    }

    /// Fetches one ZIP archive and runs its entries through the pipeline.
    fn fetch_merged(&self, url: &str) -> Result<Record, TvdbError> {
        let body = self.fetch(url)?;
        let entries = archive::read_entries(&body)?;
        Ok(normalize::normalize_archive(&entries)?)
    }

    // Endpoints

    /// Lists the languages the catalog can serve metadata in.
    pub fn languages(&self) -> Result<Vec<Record>, TvdbError> {
        let payload = self.fetch_normalized(&self.languages_url(), EntityKind::Language)?;
        Ok(records(payload, "Languages"))
    }

    /// Searches series by name; returns every match, best first.
    pub fn search_series(&self, name: &str) -> Result<Vec<Record>, TvdbError> {
        let payload = self.fetch_normalized(&self.search_series_url(name), EntityKind::Series)?;
        Ok(records(payload, "Series"))
    }

    /// Fetches the base record of one series.
    pub fn series(&self, series_id: u32) -> Result<Record, TvdbError> {
        let payload = self.fetch_normalized(&self.series_url(series_id), EntityKind::Series)?;
        single_record(payload, "Series")
    }

    /// Fetches one series with all of its related data in a single call.
    ///
    /// The catalog answers with an archive bundling the series record, its
    /// episodes, actors, and banners as separate XML files. The merged
    /// collections are attached onto the series record under `Actors`,
    /// `Banners`, and `Episodes` before it is returned.
    pub fn series_all(&self, series_id: u32) -> Result<Record, TvdbError> {
        let mut merged = self.fetch_merged(&self.series_all_url(series_id))?;

        let actors = merged.remove("Actors");
        let banners = merged.remove("Banners");
        let episodes = merged.remove("Episode");

        let mut series = match merged.remove("Series") {
            Some(value) => first_record(value, "Series")?,
            None => {
                return Err(NormalizeError::UnexpectedShape(
                    "archive carried no `Series` record".to_string(),
                )
                .into());
            }
        };

        if let Some(actors) = actors {
            series.insert("Actors".to_string(), actors);
        }
        if let Some(banners) = banners {
            series.insert("Banners".to_string(), banners);
        }
        if let Some(episodes) = episodes {
            series.insert("Episodes".to_string(), episodes);
        }

        Ok(series)
    }

    /// Fetches one episode by its catalog id.
    pub fn episode(&self, episode_id: u32) -> Result<Record, TvdbError> {
        let payload = self.fetch_normalized(&self.episode_url(episode_id), EntityKind::Episode)?;
        single_record(payload, "Episode")
    }

    /// Fetches one episode by its position in the default (aired) ordering.
    pub fn episode_by_airing(
        &self,
        series_id: u32,
        season: u32,
        episode: u32,
    ) -> Result<Record, TvdbError> {
        let url = self.episode_by_airing_url(series_id, season, episode);
        let payload = self.fetch_normalized(&url, EntityKind::Episode)?;
        single_record(payload, "Episode")
    }

    /// Fetches one episode by its position in the DVD ordering.
    pub fn episode_by_dvd(
        &self,
        series_id: u32,
        season: u32,
        episode: u32,
    ) -> Result<Record, TvdbError> {
        let url = self.episode_by_dvd_url(series_id, season, episode);
        let payload = self.fetch_normalized(&url, EntityKind::Episode)?;
        single_record(payload, "Episode")
    }

    /// Fetches one episode by its absolute number across all seasons.
    pub fn episode_by_absolute(
        &self,
        series_id: u32,
        absolute: u32,
    ) -> Result<Record, TvdbError> {
        let url = self.episode_by_absolute_url(series_id, absolute);
        let payload = self.fetch_normalized(&url, EntityKind::Episode)?;
        single_record(payload, "Episode")
    }

    /// Lists the actors of one series.
    pub fn actors(&self, series_id: u32) -> Result<Vec<Record>, TvdbError> {
        let payload = self.fetch_normalized(&self.actors_url(series_id), EntityKind::Actor)?;
        Ok(records(payload, "Actors"))
    }

    /// Lists the banner images of one series.
    pub fn banners(&self, series_id: u32) -> Result<Vec<Record>, TvdbError> {
        let payload = self.fetch_normalized(&self.banners_url(series_id), EntityKind::Banner)?;
        Ok(records(payload, "Banners"))
    }

    /// Fetches the archive of records updated within the given timeframe.
    ///
    /// The returned map carries the archive's `time` stamp plus `Series`,
    /// `Episode`, and `Banner` lists naming the updated records.
    pub fn updates(&self, timeframe: Timeframe) -> Result<Record, TvdbError> {
        self.fetch_merged(&self.updates_url(timeframe))
    }

    /// Downloads a banner image and returns its raw bytes.
    ///
    /// `banner_path` is the `BannerPath` field of a banner record.
    pub fn download_banner(&self, banner_path: &str) -> Result<Vec<u8>, TvdbError> {
        self.fetch(&self.banner_url(banner_path))
    }

    /// Downloads a banner image and writes it to `destination`.
    pub fn save_banner(&self, banner_path: &str, destination: &Path) -> Result<(), TvdbError> {
        let bytes = self.download_banner(banner_path)?;
        fs::write(destination, bytes)?;
        Ok(())
    }
}

/// Extracts the record list under `key` from a normalized payload.
///
/// A blank or absent collection (an empty search result, a series without
/// banners) yields an empty list; degenerate non-record elements are dropped.
fn records(payload: Value, key: &str) -> Vec<Record> {
    let Value::Object(mut map) = payload else {
        return Vec::new();
    };

    match map.remove(key) {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect(),
        Some(Value::Object(record)) => vec![record],
        _ => Vec::new(),
    }
}

/// Extracts exactly one record under `key`, failing when none is present.
///
/// Endpoints addressing a record by id are expected to answer with either an
/// error marker or one record; an empty payload here means the response shape
/// was not what the endpoint promises.
fn single_record(payload: Value, key: &str) -> Result<Record, TvdbError> {
    let Value::Object(mut map) = payload else {
        return Err(missing_record(key));
    };

    match map.remove(key) {
        Some(value) => first_record(value, key),
        None => Err(missing_record(key)),
    }
}

/// Takes the first record out of a singleton-or-list value.
fn first_record(value: Value, key: &str) -> Result<Record, TvdbError> {
    let first = match value {
        Value::Array(values) => values.into_iter().next(),
        other => Some(other),
    };

    match first {
        Some(Value::Object(record)) => Ok(record),
        _ => Err(missing_record(key)),
    }
}

fn missing_record(key: &str) -> TvdbError {
    NormalizeError::UnexpectedShape(format!("response carried no `{key}` record")).into()
}
