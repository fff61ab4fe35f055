use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::UserId;

pub const WINDOW_DAYS: u64 = 7;
pub const TOP_TAGS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_notes: i64,
    #[serde(rename = "notesLast7Days")]
    pub notes_per_day: Vec<DayCount>,
    pub top_tags: Vec<TagCount>,
}

/// The UTC calendar days ending on `today`, oldest first.
pub fn window(today: NaiveDate) -> Vec<NaiveDate> {
    (0..WINDOW_DAYS)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect()
}

/// Zero-filled per-day counts of `created` over the window ending on `today`.
/// Instants outside the window are ignored.
pub fn bucket_by_day(today: NaiveDate, created: &[DateTime<Utc>]) -> Vec<DayCount> {
    let mut days: Vec<DayCount> = window(today)
        .into_iter()
        .map(|date| DayCount { date, count: 0 })
        .collect();

    for instant in created {
        let date = instant.date_naive();
        if let Some(day) = days.iter_mut().find(|d| d.date == date) {
            day.count += 1;
        }
    }
    days
}

/// Summary of one owner's notes as of `now`.
///
/// All three reads share one transaction.
pub async fn summarize(pool: &DbPool, owner: UserId, now: DateTime<Utc>) -> Result<AnalyticsSnapshot> {
    let today = now.date_naive();
    let first_day = window(today)
        .first()
        .copied()
        .ok_or_else(|| AppError::Internal("analytics window out of range".to_string()))?;
    let since = first_day.and_hms_opt(0, 0, 0).map(|t| t.and_utc()).ok_or_else(|| {
        AppError::Internal("analytics window out of range".to_string())
    })?;

    let mut tx = pool.begin().await?;

    let (total_notes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes WHERE owner_id = ?1")
        .bind(owner.get())
        .fetch_one(&mut *tx)
        .await?;

    let recent: Vec<(DateTime<Utc>,)> =
        sqlx::query_as("SELECT created_at FROM notes WHERE owner_id = ?1 AND created_at >= ?2")
            .bind(owner.get())
            .bind(since)
            .fetch_all(&mut *tx)
            .await?;

    // Ties go to the tag seen on the lowest note id, then to tag text.
    let top_tags: Vec<TagCount> = sqlx::query_as(
        "SELECT jt.value AS tag, COUNT(*) AS count
         FROM notes n, json_each(n.tags) jt
         WHERE n.owner_id = ?1
         GROUP BY jt.value
         ORDER BY count DESC, MIN(n.id) ASC, jt.value ASC
         LIMIT ?2",
    )
    .bind(owner.get())
    .bind(TOP_TAGS)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let created: Vec<DateTime<Utc>> = recent.into_iter().map(|(at,)| at).collect();
    let snapshot = AnalyticsSnapshot {
        total_notes,
        notes_per_day: bucket_by_day(today, &created),
        top_tags,
    };
    tracing::debug!(%owner, total = snapshot.total_notes, "analytics summarized");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::db::tests::{memory_pool, seed_user};
    use crate::db::{create_note_db, insert_note_at};
    use crate::tags::TagInput;
    use crate::validation::NoteDraft;

    fn draft(tags: impl Into<TagInput>) -> NoteDraft {
        NoteDraft::new("title", "content", tags).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_is_seven_ascending_days() {
        let days = window(date(2024, 3, 2));
        assert_eq!(days.len(), 7);
        assert_eq!(days.first(), Some(&date(2024, 2, 25)));
        assert_eq!(days.last(), Some(&date(2024, 3, 2)));
        assert!(days.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn buckets_use_utc_calendar_days() {
        let today = date(2024, 10, 14);
        let created = [
            Utc.with_ymd_and_hms(2024, 10, 14, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 10, 13, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 10, 8, 12, 0, 0).unwrap(),
            // outside the window
            Utc.with_ymd_and_hms(2024, 10, 7, 23, 59, 59).unwrap(),
        ];

        let counts: Vec<i64> = bucket_by_day(today, &created).iter().map(|d| d.count).collect();
        assert_eq!(counts, [1, 0, 0, 0, 0, 1, 1]);
    }

    #[tokio::test]
    async fn empty_owner() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "a@example.com").await;

        let snapshot = summarize(&pool, owner, Utc::now()).await.unwrap();

        assert_eq!(snapshot.total_notes, 0);
        assert_eq!(snapshot.notes_per_day.len(), 7);
        assert!(snapshot.notes_per_day.iter().all(|d| d.count == 0));
        assert!(snapshot.top_tags.is_empty());
    }

    #[tokio::test]
    async fn counts_notes_per_day() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "a@example.com").await;
        let now = Utc.with_ymd_and_hms(2024, 10, 14, 15, 0, 0).unwrap();

        for age in [6, 6, 1, 30] {
            insert_note_at(&pool, owner, draft("t"), now - Duration::days(age))
                .await
                .unwrap();
        }

        let snapshot = summarize(&pool, owner, now).await.unwrap();
        let counts: Vec<i64> = snapshot.notes_per_day.iter().map(|d| d.count).collect();

        assert_eq!(snapshot.total_notes, 4);
        assert_eq!(counts, [2, 0, 0, 0, 0, 1, 0]);
        assert_eq!(snapshot.notes_per_day[0].date, date(2024, 10, 8));
    }

    #[tokio::test]
    async fn top_tags_by_count() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "a@example.com").await;

        for tags in ["a", "a,b", "c", "c", "c,d"] {
            create_note_db(&pool, owner, draft(tags)).await.unwrap();
        }

        let snapshot = summarize(&pool, owner, Utc::now()).await.unwrap();
        assert_eq!(
            snapshot.top_tags,
            [
                TagCount { tag: "c".into(), count: 3 },
                TagCount { tag: "a".into(), count: 2 },
                TagCount { tag: "b".into(), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn ties_go_to_the_earliest_note_then_text() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "a@example.com").await;

        for tags in ["zeta,alpha", "mid"] {
            create_note_db(&pool, owner, draft(tags)).await.unwrap();
        }

        let snapshot = summarize(&pool, owner, Utc::now()).await.unwrap();
        let names: Vec<&str> = snapshot.top_tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta", "mid"]);
    }

    #[tokio::test]
    async fn only_the_owners_notes_count() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice@example.com").await;
        let bob = seed_user(&pool, "bob@example.com").await;

        create_note_db(&pool, alice, draft("shared")).await.unwrap();

        let snapshot = summarize(&pool, bob, Utc::now()).await.unwrap();
        assert_eq!(snapshot.total_notes, 0);
        assert!(snapshot.top_tags.is_empty());
    }

    #[test]
    fn serializes_with_client_field_names() {
        let snapshot = AnalyticsSnapshot {
            total_notes: 1,
            notes_per_day: vec![DayCount { date: date(2024, 10, 14), count: 1 }],
            top_tags: vec![TagCount { tag: "x".into(), count: 1 }],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["totalNotes"], 1);
        assert_eq!(json["notesLast7Days"][0]["date"], "2024-10-14");
        assert_eq!(json["topTags"][0]["tag"], "x");
    }
}
