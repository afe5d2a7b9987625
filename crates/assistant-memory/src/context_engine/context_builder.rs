//! Builds the labelled context bundle prepended to every user turn

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::context_engine::{PersonalitySource, ProfileSource};
use crate::embedding::embed_checked;
use crate::error::Result;
use crate::memory_db::{ScopedStore, DEFAULT_SEARCH_CAP};
use crate::search::{timed_rank, SimilarityResult};

/// Everything retrieved for one turn. Sections render in field order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    pub preferences: Vec<(String, String)>,
    pub identity: Vec<(String, String)>,
    pub top_topics: Vec<(String, f64)>,
    pub similar_messages: Vec<SimilarityResult>,
    pub relevant_summaries: Vec<SimilarityResult>,
    pub latest_summary: Option<String>,
    pub personality: String,
    pub user_message: String,
}

fn write_section<T>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    items: &[T],
    line: impl Fn(&T) -> String,
) -> fmt::Result {
    writeln!(f, "{}:", label)?;
    if items.is_empty() {
        writeln!(f, "none")?;
    }
    for item in items {
        writeln!(f, "- {}", line(item))?;
    }
    writeln!(f)
}

impl ContextBundle {
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn is_empty_context(&self) -> bool {
        self.preferences.is_empty()
            && self.identity.is_empty()
            && self.top_topics.is_empty()
            && self.similar_messages.is_empty()
            && self.relevant_summaries.is_empty()
            && self.latest_summary.is_none()
    }
}

impl fmt::Display for ContextBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_section(f, "User Preferences", &self.preferences, |(k, v)| format!("{}: {}", k, v))?;
        if !self.identity.is_empty() {
            write_section(f, "User Profile", &self.identity, |(k, v)| format!("{}: {}", k, v))?;
        }
        write_section(f, "Top Topics", &self.top_topics, |(t, s)| format!("{} ({:.2})", t, s))?;
        write_section(f, "Similar Messages", &self.similar_messages, |r| {
            format!("{} ({:.2})", r.content, r.similarity_score)
        })?;
        write_section(f, "Relevant Summaries", &self.relevant_summaries, |r| {
            format!("{} ({:.2})", r.content, r.similarity_score)
        })?;
        writeln!(f, "Latest Summary:")?;
        writeln!(f, "{}", self.latest_summary.as_deref().unwrap_or("none"))?;
        writeln!(f)?;
        writeln!(f, "Personality:")?;
        let personality = if self.personality.trim().is_empty() { "none" } else { &self.personality };
        writeln!(f, "{}", personality)?;
        writeln!(f)?;
        write!(f, "User message: {}", self.user_message)
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    pub message_top_k: usize,
    pub summary_top_k: usize,
    pub top_topics: usize,
    pub corpus_cap: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            message_top_k: 5,
            summary_top_k: 3,
            top_topics: 5,
            corpus_cap: DEFAULT_SEARCH_CAP,
        }
    }
}

impl ContextAssembler {
    /// Gathers profile data, similar messages, relevant summaries, the
    /// latest summary and the personality directive, in that order.
    ///
    /// Reads only. The user message is embedded at most once and shared by
    /// both searches.
    pub async fn build_context(
        &self,
        user_message: &str,
        store: &mut ScopedStore,
        profile: &dyn ProfileSource,
        personality: &dyn PersonalitySource,
    ) -> Result<ContextBundle> {
        let preferences = profile.preferences();
        let identity = profile.identity();
        let top_topics = profile.get_top_topics(self.top_topics);

        let messages = store.all_messages_with_embeddings(self.corpus_cap)?;
        let summaries = store.all_summaries_with_embeddings()?;
        let (similar_messages, relevant_summaries) = if messages.is_empty() && summaries.is_empty() {
            debug!("Nothing stored yet, skipping similarity search");
            (Vec::new(), Vec::new())
        } else {
            let embedder = Arc::clone(store.embedder());
            let query = embed_checked(embedder.as_ref(), user_message).await?;
            (
                timed_rank(&query, &messages, self.message_top_k, "messages"),
                timed_rank(&query, &summaries, self.summary_top_k, "summaries"),
            )
        };

        let latest_summary = store.latest_summary()?;
        let personality = personality.get_personality_prompt();

        info!(
            "Context assembled: {} similar messages, {} summaries, latest summary {}",
            similar_messages.len(),
            relevant_summaries.len(),
            if latest_summary.is_some() { "present" } else { "absent" }
        );

        Ok(ContextBundle {
            preferences,
            identity,
            top_topics,
            similar_messages,
            relevant_summaries,
            latest_summary,
            personality,
            user_message: user_message.to_string(),
        })
    }

    /// Primer for a freshly (re)initialised model session, if any summary
    /// exists yet.
    pub fn session_primer(&self, store: &ScopedStore) -> Result<Option<String>> {
        Ok(store
            .latest_summary()?
            .map(|summary| format!("Latest conversation summary: {}", summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbeddingProvider, UnreachableEmbedder};
    use crate::memory_db::MemoryDatabase;
    use crate::personality::PersonalityTraits;
    use crate::profile::UserProfile;
    use chrono::{TimeZone, Utc};

    fn result(content: &str, score: f32) -> SimilarityResult {
        SimilarityResult {
            source_id: 1,
            content: content.to_string(),
            similarity_score: score,
        }
    }

    #[test]
    fn test_empty_bundle_renders_every_label() {
        let bundle = ContextBundle {
            user_message: "hi".to_string(),
            ..Default::default()
        };
        let rendered = bundle.render();
        assert_eq!(
            rendered,
            "User Preferences:\nnone\n\nTop Topics:\nnone\n\nSimilar Messages:\nnone\n\n\
             Relevant Summaries:\nnone\n\nLatest Summary:\nnone\n\nPersonality:\nnone\n\n\
             User message: hi"
        );
        assert!(bundle.is_empty_context());
    }

    #[test]
    fn test_sections_keep_fixed_order() {
        let bundle = ContextBundle {
            preferences: vec![("style".into(), "concise".into())],
            identity: vec![("Alias".into(), "Sam".into())],
            top_topics: vec![("rust".into(), 0.9)],
            similar_messages: vec![result("I work as an engineer", 0.8)],
            relevant_summaries: vec![result("talked about work", 0.5)],
            latest_summary: Some("talked about work".into()),
            personality: "Be casual.".into(),
            user_message: "What is your job?".into(),
        };
        let rendered = bundle.render();
        let labels = [
            "User Preferences:",
            "User Profile:",
            "Top Topics:",
            "Similar Messages:",
            "Relevant Summaries:",
            "Latest Summary:",
            "Personality:",
            "User message: What is your job?",
        ];
        let positions: Vec<usize> = labels.iter().map(|l| rendered.find(l).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", rendered);
        assert!(rendered.contains("- style: concise"));
        assert!(rendered.contains("- rust (0.90)"));
        assert!(rendered.contains("- I work as an engineer (0.80)"));
        assert!(rendered.ends_with("User message: What is your job?"));
    }

    #[tokio::test]
    async fn test_build_context_reads_without_writing() {
        let db = MemoryDatabase::new_in_memory(Arc::new(HashingEmbeddingProvider::new(64))).unwrap();
        db.messages.add_message("I like hiking").await.unwrap();
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        db.summaries.add_summary("user enjoys hiking", t, t).await.unwrap();

        let mut store = db.scoped().await.unwrap();
        let mut profile = UserProfile::default();
        profile.preferences.insert("style".into(), "concise".into());
        let bundle = ContextAssembler::default()
            .build_context("hiking plans", &mut store, &profile, &PersonalityTraits::default())
            .await
            .unwrap();

        assert_eq!(bundle.similar_messages.len(), 1);
        assert_eq!(bundle.relevant_summaries.len(), 1);
        assert_eq!(bundle.latest_summary.as_deref(), Some("user enjoys hiking"));
        assert_eq!(bundle.preferences, vec![("style".to_string(), "concise".to_string())]);
        assert!(bundle.personality.contains("moderately formal"));
        assert_eq!(store.recent_messages(10).unwrap().len(), 1);

        let primer = ContextAssembler::default().session_primer(&store).unwrap();
        assert_eq!(primer.as_deref(), Some("Latest conversation summary: user enjoys hiking"));
    }

    #[tokio::test]
    async fn test_empty_store_skips_embedding() {
        // the provider is down; with nothing stored it is never asked
        let db = MemoryDatabase::new_in_memory(Arc::new(UnreachableEmbedder(16))).unwrap();
        let mut store = db.scoped().await.unwrap();
        let bundle = ContextAssembler::default()
            .build_context("anything new?", &mut store, &UserProfile::default(), &PersonalityTraits::default())
            .await
            .unwrap();
        assert!(bundle.is_empty_context());
        assert!(ContextAssembler::default().session_primer(&store).unwrap().is_none());
    }
}
