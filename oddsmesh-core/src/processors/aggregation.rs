//! Aggregation engine: groups per-venue events into canonical events.
//!
//! The canonical key is a pure function of the normalized title and a
//! 30-minute start-time bucket, so the same match always lands in the same
//! group no matter which venue it came from or how the title is punctuated.

use kanau::processor::Processor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::DatabaseProcessor;
use crate::entities::canonical::{EnsureLink, UpsertCanonicalEvent};
use crate::entities::event::{EventRecord, ListEventsForAggregation};
use crate::entities::odds::{GetOddsByEventIds, OddsRecord};

/// Upper bound on events considered per run.
const AGGREGATION_EVENT_LIMIT: i64 = 5000;

/// Start times are bucketed to half-hour slots.
const TIME_BUCKET_SECS: i64 = 30 * 60;

/// Column width of home_team/away_team.
const MAX_TEAM_LEN: usize = 128;

pub struct AggregationEngine {
    processor: DatabaseProcessor,
}

impl AggregationEngine {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }

    /// Group all events of `event_type` and upsert the canonical rows and
    /// links. Failures on one group do not stop the others.
    pub async fn run(&self, event_type: &str) -> Result<(), sqlx::Error> {
        let event_type = if event_type.is_empty() {
            "sports"
        } else {
            event_type
        };
        let events = self
            .processor
            .process(ListEventsForAggregation {
                event_type: event_type.to_string(),
                limit: AGGREGATION_EVENT_LIMIT,
            })
            .await?;
        if events.is_empty() {
            tracing::info!("aggregation: no events to group");
            return Ok(());
        }

        let mut groups: HashMap<String, Vec<&EventRecord>> = HashMap::new();
        for event in &events {
            groups
                .entry(canonical_key(&event.title, event.start_time))
                .or_default()
                .push(event);
        }

        // Team names come from venue option labels (e.g. Polymarket
        // outcomes), never parsed out of the title.
        let all_ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        let all_odds = self
            .processor
            .process(GetOddsByEventIds { event_ids: all_ids })
            .await?;
        let mut odds_by_event: HashMap<i64, Vec<&OddsRecord>> = HashMap::new();
        for odds in &all_odds {
            odds_by_event.entry(odds.event_id).or_default().push(odds);
        }

        let group_count = groups.len();
        for (key, group) in groups {
            let Some(first) = group.first() else {
                continue;
            };
            let (home_team, away_team) = extract_teams(&odds_by_event, &group);
            let canonical_id = match self
                .processor
                .process(UpsertCanonicalEvent {
                    sport_type: event_type.to_string(),
                    title: first.title.clone(),
                    home_team,
                    away_team,
                    match_time: first.start_time,
                    canonical_key: key.clone(),
                    status: first.status,
                })
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(canonical_key = %key, error = %e, "canonical upsert failed");
                    continue;
                }
            };
            for event in &group {
                if let Err(e) = self
                    .processor
                    .process(EnsureLink {
                        canonical_event_id: canonical_id,
                        event_id: event.id,
                        platform_id: event.platform_id,
                    })
                    .await
                {
                    tracing::warn!(
                        canonical_id,
                        event_id = event.id,
                        platform_id = event.platform_id,
                        error = %e,
                        "link upsert failed"
                    );
                }
            }
        }

        tracing::info!(
            events = events.len(),
            canonical = group_count,
            "aggregation pass complete"
        );
        Ok(())
    }
}

/// Normalized title + half-hour bucket, SHA-256, first 16 bytes hex.
pub fn canonical_key(title: &str, start_time: time::PrimitiveDateTime) -> String {
    let normalized = normalize_title(title);
    let ts = start_time.assume_utc().unix_timestamp();
    let bucket = ts - ts.rem_euclid(TIME_BUCKET_SECS);
    let digest = Sha256::digest(format!("{normalized}|{bucket}").as_bytes());
    alloy::hex::encode(&digest[..16])
}

/// Lowercase, non-alphanumeric spans collapsed into single spaces.
fn normalize_title(title: &str) -> String {
    let mapped: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive home/away from any member event whose options are exactly two
/// non-YES/NO labels, sorted lexicographically for a stable order.
fn extract_teams(
    odds_by_event: &HashMap<i64, Vec<&OddsRecord>>,
    group: &[&EventRecord],
) -> (Option<String>, Option<String>) {
    for event in group {
        let Some(odds) = odds_by_event.get(&event.id) else {
            continue;
        };
        if odds.len() != 2 {
            continue;
        }
        let (a, b) = (odds[0].option_name.trim(), odds[1].option_name.trim());
        let is_yes_no = |s: &str| s.eq_ignore_ascii_case("YES") || s.eq_ignore_ascii_case("NO");
        if is_yes_no(a) || is_yes_no(b) {
            continue;
        }
        let (home, away) = if a <= b { (a, b) } else { (b, a) };
        return (
            Some(truncate(home, MAX_TEAM_LEN)),
            Some(truncate(away, MAX_TEAM_LEN)),
        );
    }
    (None, None)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn key_ignores_case_punctuation_and_whitespace() {
        let t = datetime!(2026-04-01 18:00);
        assert_eq!(
            canonical_key("Lakers vs Celtics", t),
            canonical_key("lakers-vs-celtics!", t)
        );
        assert_eq!(
            canonical_key("Lakers   vs   Celtics", t),
            canonical_key("LAKERS VS CELTICS", t)
        );
    }

    #[test]
    fn key_buckets_start_times_to_half_hours() {
        // 18:00 and 18:20 share the bucket; 18:31 does not.
        assert_eq!(
            canonical_key("Lakers vs Celtics", datetime!(2026-04-01 18:00)),
            canonical_key("Lakers vs Celtics", datetime!(2026-04-01 18:20))
        );
        assert_ne!(
            canonical_key("Lakers vs Celtics", datetime!(2026-04-01 18:20)),
            canonical_key("Lakers vs Celtics", datetime!(2026-04-01 18:31))
        );
    }

    #[test]
    fn key_is_32_hex_chars() {
        let key = canonical_key("Lakers vs Celtics", datetime!(2026-04-01 18:00));
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_titles_get_different_keys() {
        let t = datetime!(2026-04-01 18:00);
        assert_ne!(
            canonical_key("Lakers vs Celtics", t),
            canonical_key("Heat vs Knicks", t)
        );
    }

    #[test]
    fn title_normalization() {
        assert_eq!(normalize_title("  Lakers -- vs.  CELTICS! "), "lakers vs celtics");
        assert_eq!(normalize_title("a|b|c"), "a b c");
    }
}
