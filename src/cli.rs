use crate::ordering::{SortOrder, UnknownSortOrder};

pub const USAGE: &str = "photo-gallery - search Unsplash, keep favorites and comments locally.

Usage: photo-gallery [FLAGS] <COMMAND>

Commands:
  search [--favorites-only] [QUERY]   Search photos (random keyword when QUERY is empty)
  favorites                           List favorite photo ids
  favorite <ID>                       Toggle a photo's favorite status
  comments <ID> [--sort MODE]         List comments (MODE: newest, oldest, mostLiked)
  comment <ID> <TEXT>                 Add a comment
  like <ID> <COMMENT_ID>              Like a comment
  edit <ID> <COMMENT_ID> <TEXT>       Replace a comment's text
  delete <ID> <COMMENT_ID>            Delete a comment
  config set-key <KEY>                Save the Unsplash access key to the config file

Comment and edit TEXT is taken verbatim, including words that look like flags.
Use `search -- QUERY` for a query that starts with `--`.

Flags (before the command):
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search {
        query: Option<String>,
        favorites_only: bool,
    },
    Favorites,
    ToggleFavorite {
        item_id: String,
    },
    Comments {
        item_id: String,
        sort: SortOrder,
    },
    AddComment {
        item_id: String,
        text: String,
    },
    Like {
        item_id: String,
        comment_id: i64,
    },
    Edit {
        item_id: String,
        comment_id: i64,
        text: String,
    },
    Delete {
        item_id: String,
        comment_id: i64,
    },
    SetAccessKey {
        access_key: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CliError {
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
    #[error("invalid comment id {0:?}")]
    InvalidCommentId(String),
    #[error("unexpected argument {0:?}")]
    UnexpectedArgument(String),
    #[error("{0}")]
    Sort(String),
}

impl From<UnknownSortOrder> for CliError {
    fn from(err: UnknownSortOrder) -> Self {
        CliError::Sort(err.to_string())
    }
}

pub fn parse<I, S>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut rest = args.into_iter().map(Into::into);
    let command = rest.next().ok_or(CliError::MissingCommand)?;
    let command = match command.as_str() {
        "search" => search(&mut rest)?,
        "favorites" => Command::Favorites,
        "favorite" => Command::ToggleFavorite {
            item_id: required(&mut rest, "ID")?,
        },
        "comments" => comments(&mut rest)?,
        "comment" => {
            let item_id = required(&mut rest, "ID")?;
            let text = joined(&mut rest, "TEXT")?;
            Command::AddComment { item_id, text }
        }
        "like" => Command::Like {
            item_id: required(&mut rest, "ID")?,
            comment_id: comment_id(&mut rest)?,
        },
        "edit" => {
            let item_id = required(&mut rest, "ID")?;
            let comment_id = comment_id(&mut rest)?;
            let text = joined(&mut rest, "TEXT")?;
            Command::Edit {
                item_id,
                comment_id,
                text,
            }
        }
        "delete" => Command::Delete {
            item_id: required(&mut rest, "ID")?,
            comment_id: comment_id(&mut rest)?,
        },
        "config" => match required(&mut rest, "SUBCOMMAND")?.as_str() {
            "set-key" => Command::SetAccessKey {
                access_key: required(&mut rest, "KEY")?,
            },
            other => return Err(CliError::UnknownCommand(format!("config {other}"))),
        },
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = rest.next() {
        return Err(CliError::UnexpectedArgument(extra));
    }
    Ok(command)
}

// Options lead the query; `--` or the first plain word ends them.
fn search(rest: &mut impl Iterator<Item = String>) -> Result<Command, CliError> {
    let mut favorites_only = false;
    let mut words = Vec::new();
    for arg in rest.by_ref() {
        if !words.is_empty() {
            words.push(arg);
            continue;
        }
        match arg.as_str() {
            "--favorites-only" => favorites_only = true,
            "--" => break,
            flag if flag.starts_with("--") => return Err(CliError::UnexpectedArgument(arg)),
            _ => words.push(arg),
        }
    }
    words.extend(rest.by_ref());
    let query = if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    };
    Ok(Command::Search {
        query,
        favorites_only,
    })
}

fn comments(rest: &mut impl Iterator<Item = String>) -> Result<Command, CliError> {
    let mut item_id = None;
    let mut sort = SortOrder::default();
    while let Some(arg) = rest.next() {
        if arg == "--sort" {
            sort = required(rest, "MODE")?.parse::<SortOrder>()?;
        } else if item_id.is_none() && !arg.starts_with("--") && !arg.trim().is_empty() {
            item_id = Some(arg);
        } else {
            return Err(CliError::UnexpectedArgument(arg));
        }
    }
    Ok(Command::Comments {
        item_id: item_id.ok_or(CliError::MissingArgument("ID"))?,
        sort,
    })
}

fn required(rest: &mut impl Iterator<Item = String>, name: &'static str) -> Result<String, CliError> {
    rest.next()
        .filter(|value| !value.trim().is_empty())
        .ok_or(CliError::MissingArgument(name))
}

fn joined(rest: &mut impl Iterator<Item = String>, name: &'static str) -> Result<String, CliError> {
    let words: Vec<String> = rest.collect();
    if words.is_empty() {
        return Err(CliError::MissingArgument(name));
    }
    Ok(words.join(" "))
}

fn comment_id(rest: &mut impl Iterator<Item = String>) -> Result<i64, CliError> {
    let raw = required(rest, "COMMENT_ID")?;
    raw.parse::<i64>()
        .map_err(|_| CliError::InvalidCommentId(raw))
}
