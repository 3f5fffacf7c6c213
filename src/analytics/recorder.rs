//! Fold canonical events into stored aggregates and the detail event log.
//!
//! Failures here never reach the caller whose primary operation already
//! succeeded: every write is independently logged and swallowed. The two
//! writes of a link event (aggregate update, detail append) carry no ordering
//! guarantee relative to each other and are never rolled back together.

use chrono::Utc;
use std::sync::Arc;

use crate::enrich::EnrichedEvent;
use crate::models::{ClickEvent, ShortLink, StoredFile};
use crate::storage::Storage;

/// Fold one tracked click into the link's aggregate and append the detail
/// event. The aggregate is rebuilt in memory and written back as one unit.
pub async fn record_link_event(
    storage: &Arc<dyn Storage>,
    mut link: ShortLink,
    fields: &EnrichedEvent,
) {
    let now = Utc::now();
    link.analytics.apply(fields, now);

    if let Err(err) = storage
        .update_link_analytics(&link.slug, link.clicks + 1, &link.analytics)
        .await
    {
        tracing::warn!(slug = %link.slug, error = %err, "failed to persist link aggregate");
    }

    let event = ClickEvent::from_enriched(&link.slug, fields, now);
    if let Err(err) = storage.append_click_event(&event).await {
        tracing::warn!(slug = %link.slug, error = %err, "failed to append click event");
    }
}

/// Fold one info fetch into the file's aggregate, incrementing `views` and
/// the per-date view bucket. Returns the new view count; a failed write is
/// logged and the optimistic count still reported.
pub async fn record_file_view(
    storage: &Arc<dyn Storage>,
    mut file: StoredFile,
    fields: &EnrichedEvent,
) -> i64 {
    let now = Utc::now();
    file.analytics.apply_view(fields, now);
    let views = file.views + 1;

    if let Err(err) = storage
        .update_file_analytics(&file.slug, views, file.downloads, &file.analytics)
        .await
    {
        tracing::warn!(slug = %file.slug, error = %err, "failed to persist file view");
    }

    views
}

/// Fire-and-forget download accounting, issued after the response has been
/// dispatched. Re-reads the aggregate so a slow download stream does not hold
/// a stale copy.
pub async fn record_file_download(storage: Arc<dyn Storage>, slug: String) {
    let file = match storage.get_file(&slug).await {
        Ok(Some(file)) => file,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(slug = %slug, error = %err, "failed to load file for download count");
            return;
        }
    };

    let mut analytics = file.analytics;
    analytics.apply_download(Utc::now());

    if let Err(err) = storage
        .update_file_analytics(&slug, file.views, file.downloads + 1, &analytics)
        .await
    {
        tracing::warn!(slug = %slug, error = %err, "failed to persist download count");
    }
}
