use clap::{Parser, Subcommand};
use color_eyre::Result;
use dialoguer::Input;

mod auth;
mod config;
mod diff;
mod export;
mod letterboxd;
mod trakt;

#[derive(Parser)]
#[command(name = "watchdiff", version, about = "Compare media-tracking lists and export what's missing to CSV")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Letterboxd comparisons (HTML scraping, no account needed)
    #[command(subcommand)]
    Letterboxd(LetterboxdCommand),
    /// Trakt comparisons (REST API, PIN-flow authentication)
    #[command(subcommand)]
    Trakt(TraktCommand),
}

#[derive(Subcommand)]
enum LetterboxdCommand {
    /// Movies in the first list that are missing from the second
    Lists {
        /// URL of the main list
        #[arg(long)]
        first: Option<String>,
        /// URL of the list to compare against
        #[arg(long)]
        second: Option<String>,
    },
    /// Films the first user has watched that the second has not
    Watched {
        /// Username whose watched films (and ratings) are exported
        #[arg(long)]
        first: Option<String>,
        /// Username whose watched films are subtracted
        #[arg(long)]
        second: Option<String>,
        /// Optional genre filter, e.g. "horror"
        #[arg(long)]
        genre: Option<String>,
    },
}

#[derive(Subcommand)]
enum TraktCommand {
    /// Items in the second list that are missing from the first
    Lists {
        /// URL of the first Trakt list
        #[arg(long)]
        first: Option<String>,
        /// URL of the second Trakt list
        #[arg(long)]
        second: Option<String>,
        /// Discard the cached token and run the PIN flow again
        #[arg(long)]
        reauth: bool,
    },
    /// Items the second user has watched that the first has not
    Watched {
        /// URL of the first user's profile
        #[arg(long)]
        first: Option<String>,
        /// URL of the second user's profile
        #[arg(long)]
        second: Option<String>,
        /// Discard the cached token and run the PIN flow again
        #[arg(long)]
        reauth: bool,
    },
}

fn prompt_if_missing(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Ok(Input::new().with_prompt(prompt).interact_text()?),
    }
}

fn prompt_genre(genre: Option<String>) -> Result<Option<String>> {
    let genre = match genre {
        Some(genre) => genre,
        None => Input::new()
            .with_prompt("Genre filter, e.g. horror (leave blank for all movies)")
            .allow_empty(true)
            .interact_text()?,
    };
    let genre = genre.trim().to_lowercase();
    Ok(if genre.is_empty() { None } else { Some(genre) })
}

fn trakt_client(reauth: bool) -> Result<trakt::TraktClient> {
    let store = auth::CredentialStore::new(".");
    let (token, credentials) = auth::authenticate(&store, reauth)?;
    Ok(trakt::TraktClient::new(
        credentials.client_id,
        token.access_token,
    ))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    match Cli::parse().command {
        Command::Letterboxd(LetterboxdCommand::Lists { first, second }) => {
            let first = prompt_if_missing(first, "URL of the main list (List 1)")?;
            let second = prompt_if_missing(second, "URL of the list to find missing movies (List 2)")?;
            letterboxd::compare_lists(first.trim(), second.trim())
        }
        Command::Letterboxd(LetterboxdCommand::Watched { first, second, genre }) => {
            let first = prompt_if_missing(first, "Username for User 1 (the primary list)")?;
            let second = prompt_if_missing(second, "Username for User 2 (the list to compare)")?;
            let genre = prompt_genre(genre)?;
            letterboxd::compare_watched(first.trim(), second.trim(), genre.as_deref())
        }
        Command::Trakt(TraktCommand::Lists { first, second, reauth }) => {
            let client = trakt_client(reauth)?;
            println!("Items in the second list but not in the first will be reported as missing.");
            let first = prompt_if_missing(first, "URL of the first Trakt list")?;
            let second = prompt_if_missing(second, "URL of the second Trakt list")?;
            trakt::compare_lists(&client, first.trim(), second.trim())
        }
        Command::Trakt(TraktCommand::Watched { first, second, reauth }) => {
            let client = trakt_client(reauth)?;
            println!("Items in the second user's history but not in the first's will be reported as missing.");
            let first = prompt_if_missing(first, "URL of the first Trakt user")?;
            let second = prompt_if_missing(second, "URL of the second Trakt user")?;
            trakt::compare_watched(&client, first.trim(), second.trim())
        }
    }
}
