pub mod discover;
pub mod links;
pub mod metadata;
pub mod utils;

use clap::{arg, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve video links for rows without one
    ///
    /// Rows whose LIEN cell is empty, NaN, "Non trouvé" or "Erreur" are
    /// searched on YouTube. Needs YOUTUBE_API_KEY.
    ///
    /// Usage examples:
    /// # Resolve every pending row
    /// playlist-match links rows.json
    ///
    /// # Accept weaker matches
    /// playlist-match links rows.json --threshold 2
    Links {
        /// Row file (JSON array of objects)
        rows: PathBuf,

        /// Override the acceptance threshold
        #[arg(long)]
        threshold: Option<u8>,

        /// Stop after this many rows (0 for no limit)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Fill album, release date, popularity and explicit flag from Spotify
    ///
    /// Needs SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET, or --credentials.
    Metadata {
        /// Row file (JSON array of objects)
        rows: PathBuf,

        /// JSON file with client_id and client_secret
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Override the acceptance threshold
        #[arg(long)]
        threshold: Option<u8>,

        /// Stop after this many rows (0 for no limit)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Find popular tracks in Spotify playlists matching a keyword
    ///
    /// Usage examples:
    /// # Preview 50 tracks for a genre
    /// playlist-match discover rows.json --query "Rap FR" --count 50 --playlist "Hip-hop/Rap FR"
    ///
    /// # Append them to the row file
    /// playlist-match discover rows.json --query "Rap FR" --count 50 --playlist "Hip-hop/Rap FR" --apply
    Discover {
        /// Row file (JSON array of objects)
        rows: PathBuf,

        /// Playlist search keyword
        #[arg(long)]
        query: String,

        /// Number of tracks to keep
        #[arg(long, default_value = "100")]
        count: usize,

        /// Value written to the PLAYLIST column
        #[arg(long)]
        playlist: String,

        /// Append the tracks instead of only listing them
        #[arg(long)]
        apply: bool,

        /// JSON file with client_id and client_secret
        #[arg(long)]
        credentials: Option<PathBuf>,
    },

    /// Print the normalized form of an artist/title pair
    Normalize {
        #[arg(long)]
        artist: String,

        #[arg(long)]
        title: String,
    },
}

pub async fn execute_command(
    command: Commands,
    config_path: Option<&Path>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Links {
            rows,
            threshold,
            limit,
        } => links::handle_links(&rows, config_path, threshold, limit, verbose).await,
        Commands::Metadata {
            rows,
            credentials,
            threshold,
            limit,
        } => {
            metadata::handle_metadata(
                &rows,
                config_path,
                credentials.as_deref(),
                threshold,
                limit,
                verbose,
            )
            .await
        }
        Commands::Discover {
            rows,
            query,
            count,
            playlist,
            apply,
            credentials,
        } => {
            discover::handle_discover(
                &rows,
                &query,
                count,
                &playlist,
                apply,
                credentials.as_deref(),
            )
            .await
        }
        Commands::Normalize { artist, title } => {
            let track = playlist_match::normalize(&artist, &title);
            println!("Artists: {}", track.artist_names.join(" | "));
            println!("Main artist: {}", track.main_artist());
            println!("Title: {}", track.title);
            println!(
                "Compact key: {} / {}",
                playlist_match::normalize::compact(track.main_artist()),
                playlist_match::normalize::compact(&track.title)
            );
            Ok(())
        }
    }
}
