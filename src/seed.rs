//! Fixed sample feedback for demos and tests.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::metrics::FEEDBACK_INGESTED_TOTAL;
use crate::store::FeedbackStore;

pub const SAMPLE_FEEDBACK: [(&str, &str); 5] = [
    ("github", "Rate limiting docs are confusing. I keep getting blocked."),
    ("support", "The dashboard loads slowly when viewing analytics."),
    ("discord", "Love the product, but error messages could be clearer."),
    ("twitter", "Why does my worker randomly fail at night?"),
    ("forum", "Pricing tiers are hard to understand for small projects."),
];

/// Insert every sample with the same timestamp. Inserts are independent: a failure part way
/// through leaves the earlier rows in place.
pub async fn seed_samples(store: &dyn FeedbackStore, now: DateTime<Utc>) -> Result<usize> {
    for (source, content) in SAMPLE_FEEDBACK {
        store.insert(source, content, now).await?;
        counter!(FEEDBACK_INGESTED_TOTAL).increment(1);
    }
    Ok(SAMPLE_FEEDBACK.len())
}
