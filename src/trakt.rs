//! Trakt comparisons, backed by the v2 REST API.
//!
//! Known limitation, preserved on purpose: when a missing show is expanded
//! into episode rows, membership is still decided at show granularity. An
//! episode the reference user watched individually does not stop its show
//! from being reported, and the sibling episodes are never matched one by
//! one. Refining this would change the output semantics.

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use log::info;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::config::CONFIG;
use crate::diff::{self, DiffError};
use crate::export;

const SITE_URL: &str = "https://trakt.tv";

pub(crate) static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(&CONFIG.user_agent)
        .timeout(Duration::from_secs(CONFIG.request_timeout_secs))
        .build()
        .expect("failed to build Trakt client")
});

#[derive(Debug, Clone, Deserialize)]
pub struct Ids {
    pub trakt: u64,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Movie {
    pub title: String,
    pub ids: Ids,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Show {
    pub title: String,
    pub ids: Ids,
    pub seasons: Option<Vec<Season>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Season {
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    pub title: Option<String>,
    pub ids: Ids,
}

/// One entry of a list or watch history. The API nests the actual record
/// under a `movie` or `show` key depending on its type.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEntry {
    pub movie: Option<Movie>,
    pub show: Option<Show>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Show,
    Episode,
}

/// One row of `missing_items.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct MissingItem {
    pub trakt_id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub url: String,
}

fn slug_url(kind: ItemKind, ids: &Ids) -> Result<String> {
    let slug = ids
        .slug
        .as_deref()
        .ok_or_else(|| eyre!("{kind} {} has no slug", ids.trakt))?;
    Ok(format!("{SITE_URL}/{kind}s/{slug}"))
}

impl ListEntry {
    /// Identity key: the numeric Trakt id of the movie or show.
    pub fn trakt_id(&self) -> Result<u64, DiffError> {
        match (&self.movie, &self.show) {
            (Some(movie), _) => Ok(movie.ids.trakt),
            (None, Some(show)) => Ok(show.ids.trakt),
            (None, None) => Err(DiffError::MalformedItem(
                "entry has neither a movie nor a show".into(),
            )),
        }
    }

    /// CSV rows for one missing entry. With `expand_shows`, a show that
    /// carries episode data becomes one row per episode; a show without any
    /// episodes (or with expansion off) stays a single show row.
    fn rows(&self, expand_shows: bool) -> Result<Vec<MissingItem>> {
        if let Some(movie) = &self.movie {
            return Ok(vec![MissingItem {
                trakt_id: movie.ids.trakt,
                title: movie.title.clone(),
                kind: ItemKind::Movie,
                url: slug_url(ItemKind::Movie, &movie.ids)?,
            }]);
        }

        let show = self
            .show
            .as_ref()
            .ok_or_else(|| DiffError::MalformedItem("entry has neither a movie nor a show".into()))?;

        if expand_shows {
            let mut rows = Vec::new();
            for season in show.seasons.iter().flatten() {
                for episode in &season.episodes {
                    rows.push(MissingItem {
                        trakt_id: episode.ids.trakt,
                        title: episode.title.clone().unwrap_or_default(),
                        kind: ItemKind::Episode,
                        url: slug_url(ItemKind::Episode, &episode.ids)?,
                    });
                }
            }
            if !rows.is_empty() {
                return Ok(rows);
            }
        }

        Ok(vec![MissingItem {
            trakt_id: show.ids.trakt,
            title: show.title.clone(),
            kind: ItemKind::Show,
            url: slug_url(ItemKind::Show, &show.ids)?,
        }])
    }
}

pub struct TraktClient {
    base_url: String,
    client_id: String,
    access_token: String,
}

impl TraktClient {
    pub fn new(client_id: String, access_token: String) -> Self {
        Self::with_base_url(CONFIG.trakt_api_url.clone(), client_id, access_token)
    }

    fn with_base_url(base_url: String, client_id: String, access_token: String) -> Self {
        Self {
            base_url,
            client_id,
            access_token,
        }
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        CLIENT
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json")
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
    }

    fn read_entries(path: &str, res: reqwest::blocking::Response) -> Result<Vec<ListEntry>> {
        let status = res.status();
        if !status.is_success() {
            return Err(eyre!(
                "Trakt request for {path} failed: {status} - {}",
                res.text().unwrap_or_default()
            ));
        }
        res.json().map_err(Into::into)
    }

    fn fetch_page(&self, path: &str, page: u32) -> Result<Vec<ListEntry>> {
        let res = self
            .get(path)
            .query(&[("page", page), ("limit", CONFIG.page_size)])
            .send()?;
        Self::read_entries(path, res)
    }

    fn fetch_paginated(&self, path: &str) -> Result<Vec<ListEntry>> {
        info!("fetching {path}");
        diff::paginate(|page| self.fetch_page(path, page), CONFIG.max_pages)
    }

    /// The watched endpoints ignore `page` and return the full history on
    /// every request, so each one gets exactly one unpaginated GET; running
    /// them through the pagination loop would never see an empty page.
    fn fetch_once(&self, path: &str) -> Result<Vec<ListEntry>> {
        info!("fetching {path}");
        let res = self.get(path).send()?;
        Self::read_entries(path, res)
    }

    pub fn list_items(&self, user: &str, list_id: &str) -> Result<Vec<ListEntry>> {
        self.fetch_paginated(&format!("/users/{user}/lists/{list_id}/items"))
    }

    /// A user's full watch history: movies and shows concatenated.
    pub fn watched(&self, user: &str) -> Result<Vec<ListEntry>> {
        let mut entries = self.fetch_once(&format!("/users/{user}/watched/movies"))?;
        entries.extend(self.fetch_once(&format!("/users/{user}/watched/shows"))?);
        Ok(entries)
    }
}

/// Extracts `(user, list_id)` from a list URL shaped
/// `https://trakt.tv/users/<user>/lists/<list>`.
pub fn parse_list_url(url: &str) -> Result<(String, String)> {
    let parsed = Url::parse(url).map_err(|e| eyre!("invalid Trakt list URL {url}: {e}"))?;
    let segments: Vec<&str> = parsed.path().trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["users", user, "lists", list_id, ..] => Ok((user.to_string(), list_id.to_string())),
        _ => Err(eyre!(
            "invalid Trakt list URL: expected /users/<user>/lists/<list>, got {}",
            parsed.path()
        )),
    }
}

/// Extracts the username from a profile URL shaped `https://trakt.tv/users/<user>`.
pub fn parse_user_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| eyre!("invalid Trakt user URL {url}: {e}"))?;
    let segments: Vec<&str> = parsed.path().trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["users", user, ..] => Ok((*user).to_string()),
        _ => Err(eyre!(
            "invalid Trakt user URL: expected /users/<user>, got {}",
            parsed.path()
        )),
    }
}

fn collect_rows(entries: &[ListEntry], expand_shows: bool) -> Result<Vec<MissingItem>> {
    let mut rows = Vec::new();
    for entry in entries {
        rows.extend(entry.rows(expand_shows)?);
    }
    Ok(rows)
}

/// Items in the second list that are missing from the first, with missing
/// shows expanded into their episodes. Exported as `missing_items.csv`.
pub fn compare_lists(client: &TraktClient, first_url: &str, second_url: &str) -> Result<()> {
    let (first_user, first_list) = parse_list_url(first_url)?;
    let (second_user, second_list) = parse_list_url(second_url)?;

    let first = client.list_items(&first_user, &first_list)?;
    let second = client.list_items(&second_user, &second_list)?;

    let missing = diff::missing_from(&first, &second, ListEntry::trakt_id)?;
    let rows = collect_rows(&missing, true)?;

    println!(
        "\nFound {} items in the second list that are missing from the first",
        rows.len()
    );
    export::write_trakt_rows("missing_items.csv", &rows)
}

/// Items the second user has watched that the first has not. Exported as
/// `missing_items.csv`.
pub fn compare_watched(client: &TraktClient, first_url: &str, second_url: &str) -> Result<()> {
    let first_user = parse_user_url(first_url)?;
    let second_user = parse_user_url(second_url)?;

    let first = client.watched(&first_user)?;
    let second = client.watched(&second_user)?;

    let missing = diff::missing_from(&first, &second, ListEntry::trakt_id)?;
    let rows = collect_rows(&missing, false)?;

    println!(
        "\nFound {} items in {second_user}'s history that are missing from {first_user}'s",
        rows.len()
    );
    export::write_trakt_rows("missing_items.csv", &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: serde_json::Value) -> ListEntry {
        serde_json::from_value(value).unwrap()
    }

    fn movie_entry() -> ListEntry {
        entry(json!({
            "type": "movie",
            "movie": {"title": "Heat", "year": 1995, "ids": {"trakt": 1, "slug": "heat-1995"}}
        }))
    }

    fn show_entry(seasons: serde_json::Value) -> ListEntry {
        entry(json!({
            "type": "show",
            "show": {"title": "The Wire", "ids": {"trakt": 2, "slug": "the-wire"}, "seasons": seasons}
        }))
    }

    #[test]
    fn identity_is_the_movie_or_show_trakt_id() {
        assert_eq!(movie_entry().trakt_id().unwrap(), 1);
        assert_eq!(show_entry(json!(null)).trakt_id().unwrap(), 2);

        let err = entry(json!({"type": "person"})).trakt_id().unwrap_err();
        assert!(matches!(err, DiffError::MalformedItem(_)));
    }

    #[test]
    fn movie_becomes_a_single_row() {
        let rows = movie_entry().rows(true).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trakt_id, 1);
        assert_eq!(rows[0].kind, ItemKind::Movie);
        assert_eq!(rows[0].url, "https://trakt.tv/movies/heat-1995");
    }

    #[test]
    fn show_with_episodes_expands_into_episode_rows() {
        let rows = show_entry(json!([
            {"number": 1, "episodes": [
                {"title": "The Target", "ids": {"trakt": 10, "slug": "the-wire-1x01"}},
                {"title": "The Detail", "ids": {"trakt": 11, "slug": "the-wire-1x02"}}
            ]}
        ]))
        .rows(true)
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.kind == ItemKind::Episode));
        assert_eq!(rows[0].url, "https://trakt.tv/episodes/the-wire-1x01");
        assert_eq!(rows[1].trakt_id, 11);
    }

    #[test]
    fn show_without_episode_data_stays_one_row() {
        for seasons in [json!(null), json!([]), json!([{"number": 1, "episodes": []}])] {
            let rows = show_entry(seasons).rows(true).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].kind, ItemKind::Show);
            assert_eq!(rows[0].url, "https://trakt.tv/shows/the-wire");
        }
    }

    #[test]
    fn watched_comparison_never_expands_shows() {
        let rows = show_entry(json!([
            {"number": 1, "episodes": [{"title": "The Target", "ids": {"trakt": 10, "slug": "the-wire-1x01"}}]}
        ]))
        .rows(false)
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, ItemKind::Show);
    }

    #[test]
    fn list_urls_must_have_the_users_lists_shape() {
        let (user, list) = parse_list_url("https://trakt.tv/users/alice/lists/best-of-90s/").unwrap();
        assert_eq!(user, "alice");
        assert_eq!(list, "best-of-90s");

        assert!(parse_list_url("https://trakt.tv/users/alice/").is_err());
        assert!(parse_list_url("not a url").is_err());
    }

    #[test]
    fn user_urls_must_have_the_users_shape() {
        assert_eq!(parse_user_url("https://trakt.tv/users/bob").unwrap(), "bob");
        assert!(parse_user_url("https://trakt.tv/movies/heat-1995").is_err());
    }

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Serves the given JSON bodies one connection at a time and records the
    /// request target (path + query) of each.
    fn serve(bodies: Vec<&'static str>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);

        thread::spawn(move || {
            for body in bodies {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = stream.read(&mut buf).unwrap();
                    request.extend_from_slice(&buf[..n]);
                    if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&request).into_owned();
                let target = request.split_whitespace().nth(1).unwrap().to_string();
                recorded.lock().unwrap().push(target);

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });

        (format!("http://{addr}"), seen)
    }

    fn test_client(base_url: String) -> TraktClient {
        TraktClient::with_base_url(base_url, "client-id".into(), "token".into())
    }

    #[test]
    fn watched_history_is_one_unpaginated_request_per_endpoint() {
        let (base_url, seen) = serve(vec![
            r#"[{"movie": {"title": "Heat", "ids": {"trakt": 1, "slug": "heat-1995"}}}]"#,
            r#"[{"show": {"title": "The Wire", "ids": {"trakt": 2, "slug": "the-wire"}}}]"#,
        ]);

        let entries = test_client(base_url).watched("alice").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].trakt_id().unwrap(), 1);
        assert_eq!(entries[1].trakt_id().unwrap(), 2);

        // No page/limit query: these endpoints return the full history every
        // time, so paginating them would loop until the page ceiling.
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            ["/users/alice/watched/movies", "/users/alice/watched/shows"]
        );
    }

    #[test]
    fn list_items_paginate_until_an_empty_page() {
        let (base_url, seen) = serve(vec![
            r#"[{"movie": {"title": "Heat", "ids": {"trakt": 1, "slug": "heat-1995"}}}]"#,
            "[]",
        ]);

        let entries = test_client(base_url).list_items("alice", "noir").unwrap();
        assert_eq!(entries.len(), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("/users/alice/lists/noir/items?"));
        assert!(seen[0].contains("page=1"));
        assert!(seen[1].contains("page=2"));
    }
}
