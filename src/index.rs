//! Multi-key lookup from market identifiers to event display metadata

use crate::gamma::{event_metadata, parse_token_ids, GammaEvent};
use crate::types::EventMetadata;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Index from every identifier variant a trade might carry (condition id,
/// market id, asset id, CLOB token ids) to the owning event's metadata.
/// Rebuilt from scratch each ingestion cycle; the enrichment fallback may
/// insert additional entries mid-cycle to memoize network lookups.
#[derive(Debug, Default)]
pub struct EventIndex {
    by_id: HashMap<String, Arc<EventMetadata>>,
}

impl EventIndex {
    /// Build the index from a batch of event records. Markets lacking all
    /// identifier fields are skipped; they can never be joined.
    pub fn from_events(events: &[GammaEvent]) -> Self {
        let mut index = Self::default();

        for event in events {
            let Some(markets) = event.markets.as_ref() else {
                continue;
            };

            for market in markets {
                let Some(metadata) = event_metadata(event, Some(market)) else {
                    continue;
                };
                let metadata = Arc::new(metadata);

                let mut registered = false;
                for id in [&market.condition_id, &market.id, &market.asset_id] {
                    if let Some(id) = id.as_deref().filter(|s| !s.is_empty()) {
                        index.by_id.insert(id.to_string(), metadata.clone());
                        registered = true;
                    }
                }
                for token_id in parse_token_ids(&market.clob_token_ids) {
                    if !token_id.is_empty() {
                        index.by_id.insert(token_id, metadata.clone());
                        registered = true;
                    }
                }

                if !registered {
                    debug!("Skipping market with no identifiers");
                }
            }
        }

        debug!("Indexed {} identifiers from {} events", index.by_id.len(), events.len());
        index
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<EventMetadata>> {
        self.by_id.get(id).cloned()
    }

    /// Memoize a fallback lookup result for the remainder of the cycle
    pub fn insert(&mut self, id: String, metadata: EventMetadata) {
        self.by_id.insert(id, Arc::new(metadata));
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::GammaMarket;

    fn event(slug: &str, markets: Vec<GammaMarket>) -> GammaEvent {
        GammaEvent {
            title: Some(format!("Event {}", slug)),
            slug: Some(slug.to_string()),
            markets: Some(markets),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_identifier_variants_map_to_same_metadata() {
        let market = GammaMarket {
            id: Some("m1".to_string()),
            condition_id: Some("c1".to_string()),
            asset_id: Some("a1".to_string()),
            clob_token_ids: Some(r#"["t1", "t2"]"#.to_string()),
            ..Default::default()
        };
        let index = EventIndex::from_events(&[event("e1", vec![market])]);

        assert_eq!(index.len(), 5);
        let meta = index.lookup("c1").unwrap();
        for id in ["m1", "a1", "t1", "t2"] {
            let other = index.lookup(id).unwrap();
            assert!(Arc::ptr_eq(&meta, &other));
        }
        assert_eq!(meta.slug, "e1");
    }

    #[test]
    fn test_sibling_markets_share_event_metadata() {
        let m1 = GammaMarket {
            condition_id: Some("c1".to_string()),
            ..Default::default()
        };
        let m2 = GammaMarket {
            condition_id: Some("c2".to_string()),
            ..Default::default()
        };
        let index = EventIndex::from_events(&[event("parent", vec![m1, m2])]);

        let a = index.lookup("c1").unwrap();
        let b = index.lookup("c2").unwrap();
        assert_eq!(a.title, b.title);
        assert_eq!(a.slug, "parent");
    }

    #[test]
    fn test_market_without_identifiers_is_skipped() {
        let market = GammaMarket::default();
        let index = EventIndex::from_events(&[event("e1", vec![market])]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_event_without_slug_is_not_indexed() {
        let market = GammaMarket {
            condition_id: Some("c1".to_string()),
            ..Default::default()
        };
        let bad_event = GammaEvent {
            title: Some("No slug".to_string()),
            markets: Some(vec![market]),
            ..Default::default()
        };
        let index = EventIndex::from_events(&[bad_event]);
        assert!(index.lookup("c1").is_none());
    }

    #[test]
    fn test_insert_memoizes_fallback_result() {
        let mut index = EventIndex::default();
        assert!(index.lookup("c9").is_none());

        index.insert(
            "c9".to_string(),
            EventMetadata {
                title: "Late arrival".to_string(),
                slug: "late-arrival".to_string(),
                category: "Other".to_string(),
                icon: None,
            },
        );
        assert_eq!(index.lookup("c9").unwrap().slug, "late-arrival");
    }
}
