//! CSV export of diff results.

use std::path::Path;

use color_eyre::Result;
use log::info;
use serde::Serialize;

use crate::letterboxd::Film;
use crate::trakt::MissingItem;

#[derive(Serialize)]
struct ListRow<'a> {
    #[serde(rename = "Letterboxd URL")]
    url: &'a str,
}

#[derive(Serialize)]
struct WatchedRow<'a> {
    #[serde(rename = "Letterboxd URL")]
    url: &'a str,
    #[serde(rename = "Rating")]
    rating: &'a str,
}

fn finish(path: &Path, rows: usize) {
    info!("wrote {rows} rows");
    println!("Results have been saved to {}", path.display());
}

pub fn write_list_rows(path: impl AsRef<Path>, films: &[Film]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for film in films {
        writer.serialize(ListRow { url: &film.url })?;
    }
    writer.flush()?;
    finish(path, films.len());
    Ok(())
}

pub fn write_watched_rows(path: impl AsRef<Path>, films: &[Film]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for film in films {
        writer.serialize(WatchedRow {
            url: &film.url,
            rating: film.rating.as_deref().unwrap_or_default(),
        })?;
    }
    writer.flush()?;
    finish(path, films.len());
    Ok(())
}

pub fn write_trakt_rows(path: impl AsRef<Path>, items: &[MissingItem]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for item in items {
        writer.serialize(item)?;
    }
    writer.flush()?;
    finish(path, items.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trakt::ItemKind;

    fn film(url: &str, rating: Option<&str>) -> Film {
        Film {
            url: url.to_string(),
            rating: rating.map(String::from),
        }
    }

    #[test]
    fn list_rows_have_a_single_url_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_movies.csv");

        write_list_rows(&path, &[film("https://letterboxd.com/film/heat-1995/", None)]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Letterboxd URL\nhttps://letterboxd.com/film/heat-1995/\n"
        );
    }

    #[test]
    fn watched_rows_leave_missing_ratings_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user2_missing_movies.csv");

        write_watched_rows(
            &path,
            &[
                film("https://letterboxd.com/film/heat-1995/", Some("★★★★½")),
                film("https://letterboxd.com/film/ronin/", None),
            ],
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Letterboxd URL,Rating");
        assert_eq!(lines[1], "https://letterboxd.com/film/heat-1995/,★★★★½");
        assert_eq!(lines[2], "https://letterboxd.com/film/ronin/,");
    }

    #[test]
    fn trakt_rows_carry_id_title_type_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_items.csv");

        write_trakt_rows(
            &path,
            &[MissingItem {
                trakt_id: 42,
                title: "The Wire".into(),
                kind: ItemKind::Show,
                url: "https://trakt.tv/shows/the-wire".into(),
            }],
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "trakt_id,title,type,url");
        assert_eq!(lines[1], "42,The Wire,show,https://trakt.tv/shows/the-wire");
    }
}
