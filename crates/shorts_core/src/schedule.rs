//! Topic selection: weekday rotation and trending feed.
//!
//! The rotation table maps each weekday onto a category slot; the topic
//! within a slot rotates with the date ordinal so the schedule is fully
//! deterministic for a given day. The trending source parses an RSS feed
//! and takes the leading item titles.

use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::config::{RotationSlot, ScheduleSettings};
use crate::models::{Topic, TopicSource};

/// Errors from topic selection.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The rotation table has no slots.
    #[error("rotation schedule is empty")]
    EmptyRotation,

    /// The trending feed could not be fetched.
    #[error("trending feed request failed: {0}")]
    FeedRequest(#[from] reqwest::Error),

    /// The trending feed could not be parsed.
    #[error("trending feed is not valid RSS: {0}")]
    FeedParse(#[from] roxmltree::Error),

    /// The trending feed had no items.
    #[error("trending feed has no items")]
    FeedEmpty,
}

/// Pick the scheduled topic for a date.
///
/// Slot index = weekday % slot count; topic index = day ordinal % topic
/// count. Both are stable for the whole day, so a retried trigger selects
/// the same topic.
pub fn scheduled_topic(slots: &[RotationSlot], date: NaiveDate) -> Result<Topic, ScheduleError> {
    if slots.is_empty() {
        return Err(ScheduleError::EmptyRotation);
    }

    let weekday = date.weekday().num_days_from_monday() as usize;
    let slot = &slots[weekday % slots.len()];

    if slot.topics.is_empty() {
        return Err(ScheduleError::EmptyRotation);
    }
    let topic_index = date.ordinal() as usize % slot.topics.len();

    Ok(Topic::new(
        slot.topics[topic_index].clone(),
        slot.category.clone(),
        TopicSource::Scheduled,
    ))
}

/// Fetch the leading trending topics from an RSS feed.
pub fn trending_topics(
    settings: &ScheduleSettings,
    timeout: Duration,
) -> Result<Vec<String>, ScheduleError> {
    let client = reqwest::blocking::Client::new();
    let body = client
        .get(&settings.trending_feed_url)
        .timeout(timeout)
        .send()?
        .error_for_status()?
        .text()?;

    let titles = parse_feed_titles(&body)?;
    if titles.is_empty() {
        return Err(ScheduleError::FeedEmpty);
    }

    Ok(titles
        .into_iter()
        .take(settings.trending_count)
        .collect())
}

/// Pick the leading trending topic as this run's topic.
pub fn trending_topic(
    settings: &ScheduleSettings,
    timeout: Duration,
) -> Result<Topic, ScheduleError> {
    let titles = trending_topics(settings, timeout)?;
    // trending_topics guarantees at least one title
    let text = titles.into_iter().next().unwrap_or_default();
    Ok(Topic::new(text, "Trending", TopicSource::Trending))
}

/// Extract `<item><title>` values from an RSS document.
fn parse_feed_titles(xml: &str) -> Result<Vec<String>, ScheduleError> {
    let doc = roxmltree::Document::parse(xml)?;

    let titles = doc
        .descendants()
        .filter(|node| node.has_tag_name("item"))
        .filter_map(|item| {
            item.children()
                .find(|child| child.has_tag_name("title"))
                .and_then(|title| title.text())
                .map(|text| text.trim().to_string())
        })
        .filter(|title| !title.is_empty())
        .collect();

    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleSettings;

    fn slots() -> Vec<RotationSlot> {
        ScheduleSettings::default().rotation
    }

    #[test]
    fn scheduled_topic_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(); // a Monday
        let a = scheduled_topic(&slots(), date).unwrap();
        let b = scheduled_topic(&slots(), date).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.source, TopicSource::Scheduled);
    }

    #[test]
    fn weekdays_map_to_different_slots() {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        let a = scheduled_topic(&slots(), monday).unwrap();
        let b = scheduled_topic(&slots(), tuesday).unwrap();
        assert_ne!(a.category, b.category);
    }

    #[test]
    fn weekend_wraps_around_the_table() {
        // Five slots: Saturday (weekday 5) wraps to slot 0.
        let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        let topic = scheduled_topic(&slots(), saturday).unwrap();
        assert_eq!(topic.category, slots()[0].category);
    }

    #[test]
    fn empty_rotation_is_an_error() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert!(matches!(
            scheduled_topic(&[], date),
            Err(ScheduleError::EmptyRotation)
        ));
    }

    #[test]
    fn parses_rss_item_titles() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
                <title>Daily Trends</title>
                <item><title>First topic</title></item>
                <item><title>  Second topic </title></item>
                <item><description>no title</description></item>
            </channel></rss>"#;

        let titles = parse_feed_titles(xml).unwrap();
        assert_eq!(titles, vec!["First topic", "Second topic"]);
    }

    #[test]
    fn feed_channel_title_is_not_an_item() {
        let xml = r#"<rss><channel><title>Feed name</title></channel></rss>"#;
        let titles = parse_feed_titles(xml).unwrap();
        assert!(titles.is_empty());
    }
}
