use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::comments::Comment;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Format written by browsers' en-US toLocaleString(), found in older stores.
const LOCALE_TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    MostLiked,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::MostLiked => "mostLiked",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::Newest => "Newest First",
            SortOrder::Oldest => "Oldest First",
            SortOrder::MostLiked => "Most Liked",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown sort order {0:?} (expected newest, oldest or mostLiked)")]
pub struct UnknownSortOrder(String);

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "new" => Ok(SortOrder::Newest),
            "oldest" | "old" => Ok(SortOrder::Oldest),
            "mostliked" | "most-liked" | "liked" => Ok(SortOrder::MostLiked),
            _ => Err(UnknownSortOrder(s.to_string())),
        }
    }
}

/// Parses a stored timestamp into an instant.
///
/// RFC 3339 values carry their own offset. The naive formats are written in
/// local time, so they are read back as local time; a local time skipped by a
/// DST jump falls back to UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, LOCALE_TIMESTAMP_FORMAT))
        .ok()?;
    let instant = Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive));
    Some(instant)
}

/// Display order for a ledger. The input is left untouched.
///
/// Every mode is a stable sort, so equal keys keep their stored (insertion)
/// order. Comments whose timestamp does not parse go after all the others.
pub fn order(comments: &[Comment], mode: SortOrder) -> Vec<Comment> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, &Comment)> = comments
        .iter()
        .map(|comment| (parse_timestamp(&comment.timestamp), comment))
        .collect();

    match mode {
        SortOrder::MostLiked => keyed.sort_by_key(|(_, comment)| Reverse(comment.likes)),
        SortOrder::Newest => keyed.sort_by(|(a, _), (b, _)| by_time(a, b, true)),
        SortOrder::Oldest => keyed.sort_by(|(a, _), (b, _)| by_time(a, b, false)),
    }

    keyed.into_iter().map(|(_, comment)| comment.clone()).collect()
}

fn by_time(
    a: &Option<DateTime<Utc>>,
    b: &Option<DateTime<Utc>>,
    descending: bool,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(a),
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, likes: u64, timestamp: &str) -> Comment {
        Comment {
            id,
            text: format!("comment {id}"),
            timestamp: timestamp.to_string(),
            likes,
        }
    }

    fn ids(comments: &[Comment]) -> Vec<i64> {
        comments.iter().map(|c| c.id).collect()
    }

    #[test]
    fn most_liked_is_stable() {
        let input = vec![
            comment(1, 2, "2024-01-01 10:00:00"),
            comment(2, 2, "2024-01-01 10:00:01"),
            comment(3, 5, "2024-01-01 10:00:02"),
        ];
        assert_eq!(ids(&order(&input, SortOrder::MostLiked)), vec![3, 1, 2]);
    }

    #[test]
    fn newest_and_oldest_follow_timestamps() {
        let input = vec![
            comment(1, 0, "2024-03-01 09:00:00"),
            comment(2, 0, "2024-01-01 09:00:00"),
            comment(3, 0, "2024-02-01 09:00:00"),
        ];
        assert_eq!(ids(&order(&input, SortOrder::Newest)), vec![1, 3, 2]);
        assert_eq!(ids(&order(&input, SortOrder::Oldest)), vec![2, 3, 1]);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let input = vec![
            comment(1, 0, "2024-01-01 09:00:00"),
            comment(2, 0, "2024-01-01 09:00:00"),
        ];
        assert_eq!(ids(&order(&input, SortOrder::Newest)), vec![1, 2]);
        assert_eq!(ids(&order(&input, SortOrder::Oldest)), vec![1, 2]);
    }

    #[test]
    fn unparseable_timestamps_go_last_in_insertion_order() {
        let input = vec![
            comment(1, 0, "yesterday-ish"),
            comment(2, 0, "2024-01-01 09:00:00"),
            comment(3, 0, ""),
            comment(4, 0, "2024-05-01 09:00:00"),
        ];
        assert_eq!(ids(&order(&input, SortOrder::Newest)), vec![4, 2, 1, 3]);
        assert_eq!(ids(&order(&input, SortOrder::Oldest)), vec![2, 4, 1, 3]);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = vec![comment(1, 0, "2024-01-01 09:00:00"), comment(2, 9, "x")];
        let before = input.clone();
        let _ = order(&input, SortOrder::MostLiked);
        assert_eq!(input, before);
    }

    #[test]
    fn parses_known_formats() {
        assert!(parse_timestamp("2024-01-02 03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05Z").is_some());
        assert!(parse_timestamp("01/02/2024, 03:04:05 PM").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn local_and_offset_timestamps_share_one_clock() {
        let local = Local
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .earliest()
            .unwrap();
        let local_raw = local.format(TIMESTAMP_FORMAT).to_string();
        let later_rfc = (local + chrono::Duration::minutes(1)).to_rfc3339();

        assert_eq!(
            parse_timestamp(&local_raw),
            Some(local.with_timezone(&Utc))
        );
        let input = vec![comment(1, 0, &local_raw), comment(2, 0, &later_rfc)];
        assert_eq!(ids(&order(&input, SortOrder::Newest)), vec![2, 1]);
        assert_eq!(ids(&order(&input, SortOrder::Oldest)), vec![1, 2]);
    }

    #[test]
    fn sort_order_names_round_trip() {
        for mode in [SortOrder::Newest, SortOrder::Oldest, SortOrder::MostLiked] {
            assert_eq!(mode.as_str().parse::<SortOrder>().unwrap(), mode);
        }
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(
            serde_json::to_string(&SortOrder::MostLiked).unwrap(),
            "\"mostLiked\""
        );
    }
}
