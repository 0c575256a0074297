use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::cli::Command;
use crate::comments::Comment;
use crate::config;
use crate::data::{SearchService, UnconfiguredSearchService, UnsplashSearchService};
use crate::gallery::Gallery;
use crate::search::FetchStatus;
use crate::storage;
use crate::unsplash;

pub fn run(command: Command) -> Result<()> {
    if let Command::SetAccessKey { access_key } = &command {
        let stdout = std::io::stdout();
        return set_access_key(access_key, &mut stdout.lock());
    }

    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );

    let service: Arc<dyn SearchService> = if cfg.unsplash.access_key.trim().is_empty() {
        tracing::warn!("no Unsplash access key configured; searches will fail");
        Arc::new(UnconfiguredSearchService)
    } else {
        let client = unsplash::Client::new(unsplash::ClientConfig {
            access_key: cfg.unsplash.access_key.clone(),
            user_agent: cfg.unsplash.user_agent.clone(),
            base_url: Some(cfg.unsplash.base_url.clone()),
            timeout: Some(cfg.unsplash.timeout),
            http_client: None,
        })
        .context("create Unsplash client")?;
        Arc::new(UnsplashSearchService::new(Arc::new(client)))
    };

    let mut gallery = Gallery::new(store, service, cfg.search.keywords.clone());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&mut gallery, command, &mut out)
}

pub fn execute(gallery: &mut Gallery, command: Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Search {
            query,
            favorites_only,
        } => {
            let state = gallery.search_mut().search(query.as_deref());
            if state.status == FetchStatus::Failed {
                let reason = state.last_error.clone().unwrap_or_default();
                bail!(
                    "Failed to load images for {:?}: {reason}. Run the search again to retry.",
                    state.last_query
                );
            }
            writeln!(out, "Showing results for: {}", state.last_query)?;
            let photos = gallery.visible_photos(favorites_only);
            if photos.is_empty() {
                let message = if favorites_only {
                    "No favorite images yet."
                } else {
                    "No images found."
                };
                writeln!(out, "{message}")?;
            }
            for photo in photos {
                let marker = if gallery.favorites().is_favorite(&photo.id) {
                    "*"
                } else {
                    " "
                };
                writeln!(
                    out,
                    "{marker} {}\t{}\t{}",
                    photo.id,
                    photo.urls.small,
                    photo.alt_text()
                )?;
            }
        }
        Command::Favorites => {
            let ids = gallery.favorites().list();
            if ids.is_empty() {
                writeln!(out, "No favorite images yet.")?;
            }
            for id in ids {
                writeln!(out, "{id}")?;
            }
        }
        Command::ToggleFavorite { item_id } => {
            if gallery.favorites().toggle(&item_id)? {
                writeln!(out, "Added {item_id} to favorites")?;
            } else {
                writeln!(out, "Removed {item_id} from favorites")?;
            }
        }
        Command::Comments { item_id, sort } => {
            let comments = gallery.ledger(&item_id).sorted(sort);
            writeln!(
                out,
                "{} comment(s) on {item_id} ({})",
                comments.len(),
                sort.label()
            )?;
            for comment in &comments {
                write_comment(out, comment)?;
            }
        }
        Command::AddComment { item_id, text } => match gallery.ledger(&item_id).add(&text)? {
            Some(comment) => {
                writeln!(out, "Added comment {} on {item_id}", comment.id)?;
            }
            None => writeln!(out, "Ignored empty comment")?,
        },
        Command::Like {
            item_id,
            comment_id,
        } => {
            let comments = gallery.ledger(&item_id).like(comment_id)?;
            match comments.iter().find(|c| c.id == comment_id) {
                Some(comment) => write_comment(out, comment)?,
                None => writeln!(out, "No comment {comment_id} on {item_id}")?,
            }
        }
        Command::Edit {
            item_id,
            comment_id,
            text,
        } => {
            let ledger = gallery.ledger(&item_id);
            if !ledger.begin_edit(comment_id) {
                writeln!(out, "No comment {comment_id} on {item_id}")?;
                return Ok(());
            }
            ledger.set_edit_buffer(comment_id, &text);
            let comments = ledger.commit_buffered_edit(comment_id)?;
            if ledger.is_editing(comment_id) {
                ledger.cancel_edit(comment_id);
                writeln!(out, "Ignored empty comment")?;
            } else if let Some(comment) = comments.iter().find(|c| c.id == comment_id) {
                write_comment(out, comment)?;
            }
        }
        Command::Delete {
            item_id,
            comment_id,
        } => {
            let ledger = gallery.ledger(&item_id);
            let before = ledger.list().len();
            let after = ledger.delete(comment_id)?;
            if after.len() < before {
                writeln!(out, "Deleted comment {comment_id}")?;
            } else {
                writeln!(out, "No comment {comment_id} on {item_id}")?;
            }
        }
        Command::SetAccessKey { access_key } => set_access_key(&access_key, out)?,
    }
    Ok(())
}

fn set_access_key(access_key: &str, out: &mut dyn Write) -> Result<()> {
    let path = config::save_access_key(None, access_key)?;
    writeln!(out, "Saved access key to {}", path.display())?;
    Ok(())
}

fn write_comment(out: &mut dyn Write, comment: &Comment) -> Result<()> {
    writeln!(
        out,
        "[{}] {} ({} like(s), {})",
        comment.id, comment.text, comment.likes, comment.timestamp
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockSearchService;
    use crate::ordering::SortOrder;
    use crate::storage::Store;
    use crate::unsplash::{Photo, PhotoUrls};

    fn gallery_with(service: MockSearchService) -> Gallery {
        Gallery::new(
            Arc::new(Store::in_memory()),
            Arc::new(service),
            vec!["nature".into()],
        )
    }

    fn run_cmd(gallery: &mut Gallery, command: Command) -> Result<String> {
        let mut out = Vec::new();
        execute(gallery, command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn search_lists_results_and_marks_favorites() {
        let mut service = MockSearchService::new();
        service.expect_search_photos().returning(|_| {
            Ok(vec![Photo {
                id: "p1".into(),
                urls: PhotoUrls {
                    small: "https://img/p1".into(),
                },
                alt_description: Some("a lake".into()),
            }])
        });
        let mut gallery = gallery_with(service);
        gallery.favorites().toggle("p1").unwrap();

        let output = run_cmd(
            &mut gallery,
            Command::Search {
                query: None,
                favorites_only: false,
            },
        )
        .unwrap();
        assert!(output.starts_with("Showing results for: nature\n"));
        assert!(output.contains("* p1\thttps://img/p1\ta lake"));
    }

    #[test]
    fn failed_search_is_an_error() {
        let mut service = MockSearchService::new();
        service
            .expect_search_photos()
            .returning(|_| Err(anyhow::anyhow!("status 401")));
        let mut gallery = gallery_with(service);
        let err = run_cmd(
            &mut gallery,
            Command::Search {
                query: Some("cats".into()),
                favorites_only: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("status 401"));
    }

    #[test]
    fn comment_commands_round_trip() {
        let mut gallery = gallery_with(MockSearchService::new());
        run_cmd(
            &mut gallery,
            Command::AddComment {
                item_id: "p1".into(),
                text: "first".into(),
            },
        )
        .unwrap();
        let id = gallery.ledger("p1").list()[0].id;

        let liked = run_cmd(
            &mut gallery,
            Command::Like {
                item_id: "p1".into(),
                comment_id: id,
            },
        )
        .unwrap();
        assert!(liked.contains("(1 like(s)"));

        let edited = run_cmd(
            &mut gallery,
            Command::Edit {
                item_id: "p1".into(),
                comment_id: id,
                text: "second".into(),
            },
        )
        .unwrap();
        assert!(edited.contains("second"));

        let listed = run_cmd(
            &mut gallery,
            Command::Comments {
                item_id: "p1".into(),
                sort: SortOrder::MostLiked,
            },
        )
        .unwrap();
        assert!(listed.starts_with("1 comment(s) on p1 (Most Liked)"));

        let deleted = run_cmd(
            &mut gallery,
            Command::Delete {
                item_id: "p1".into(),
                comment_id: id,
            },
        )
        .unwrap();
        assert_eq!(deleted, format!("Deleted comment {id}\n"));
        assert!(gallery.ledger("p1").list().is_empty());
    }

    #[test]
    fn blank_edit_is_ignored() {
        let mut gallery = gallery_with(MockSearchService::new());
        let comment = gallery.ledger("p1").add("keep").unwrap().unwrap();
        let output = run_cmd(
            &mut gallery,
            Command::Edit {
                item_id: "p1".into(),
                comment_id: comment.id,
                text: "   ".into(),
            },
        )
        .unwrap();
        assert_eq!(output, "Ignored empty comment\n");
        assert_eq!(gallery.ledger("p1").list()[0].text, "keep");
        assert!(!gallery.ledger("p1").is_editing(comment.id));
    }

    #[test]
    fn toggling_favorite_reports_state() {
        let mut gallery = gallery_with(MockSearchService::new());
        let added = run_cmd(
            &mut gallery,
            Command::ToggleFavorite {
                item_id: "p9".into(),
            },
        )
        .unwrap();
        assert_eq!(added, "Added p9 to favorites\n");
        assert_eq!(run_cmd(&mut gallery, Command::Favorites).unwrap(), "p9\n");
    }
}
