//! Letterboxd comparisons, backed by HTML scraping of list and films pages.

use std::time::Duration;

use color_eyre::Result;
use log::info;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use scraper::{Html, Selector};

use crate::config::CONFIG;
use crate::diff;
use crate::export;

const SITE_URL: &str = "https://letterboxd.com";

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(&CONFIG.user_agent)
        .timeout(Duration::from_secs(CONFIG.request_timeout_secs))
        .build()
        .expect("failed to build Letterboxd client")
});

#[derive(Debug, Clone)]
pub struct Film {
    pub url: String,
    /// Star rating as rendered on the page ("★★★★½"). Absent markup is
    /// "no value", not an error.
    pub rating: Option<String>,
}

fn parse_films(html: &str) -> Vec<Film> {
    let document = Html::parse_document(html);
    let container = Selector::parse(".poster-container").unwrap();
    let target_link = Selector::parse("div[data-target-link]").unwrap();
    let rating = Selector::parse(".rating").unwrap();

    document
        .select(&container)
        .filter_map(|poster| {
            let link = poster.select(&target_link).next()?.attr("data-target-link")?;
            let rating = poster
                .select(&rating)
                .next()
                .map(|r| r.text().collect::<String>().trim().to_string());
            Some(Film {
                url: format!("{SITE_URL}{link}"),
                rating,
            })
        })
        .collect()
}

fn page_url(base: &str, page: u32) -> String {
    if page > 1 {
        format!("{base}page/{page}/")
    } else {
        base.to_string()
    }
}

/// A non-success status folds into an empty page: the pagination loop cannot
/// tell "no more pages" from "this page failed", and stops either way.
fn fetch_page(base: &str, page: u32) -> Result<Vec<Film>> {
    let res = CLIENT.get(page_url(base, page)).send()?;
    if !res.status().is_success() {
        info!("{} returned {}, treating as end of list", page_url(base, page), res.status());
        return Ok(Vec::new());
    }
    Ok(parse_films(&res.text()?))
}

pub fn scrape_collection(base: &str) -> Result<Vec<Film>> {
    info!("scraping {base}");
    diff::paginate(|page| fetch_page(base, page), CONFIG.max_pages)
}

fn films_url(user: &str, genre: Option<&str>) -> String {
    match genre {
        Some(genre) => format!("{SITE_URL}/{user}/films/genre/{genre}/"),
        None => format!("{SITE_URL}/{user}/films/"),
    }
}

/// Movies in `main_list` that are absent from `other_list`, exported as
/// `missing_movies.csv`.
pub fn compare_lists(main_list: &str, other_list: &str) -> Result<()> {
    let main_films = scrape_collection(main_list)?;
    let other_films = scrape_collection(other_list)?;

    let missing = diff::missing_from(&other_films, &main_films, |f| Ok(f.url.clone()))?;

    println!(
        "Number of movies in the first list but not in the second: {}",
        missing.len()
    );
    export::write_list_rows("missing_movies.csv", &missing)
}

/// Films `first_user` has watched that `second_user` has not, with the first
/// user's rating, sorted by rating descending. Exported as
/// `user2_missing_movies.csv`.
pub fn compare_watched(first_user: &str, second_user: &str, genre: Option<&str>) -> Result<()> {
    let first_films = scrape_collection(&films_url(first_user, genre))?;
    let second_films = scrape_collection(&films_url(second_user, genre))?;

    let mut missing = diff::missing_from(&second_films, &first_films, |f| Ok(f.url.clone()))?;
    diff::sort_desc_by(&mut missing, |f| f.rating.clone().unwrap_or_default());

    println!(
        "Found {} films {first_user} has watched that {second_user} has not",
        missing.len()
    );
    export::write_watched_rows("user2_missing_movies.csv", &missing)
}
