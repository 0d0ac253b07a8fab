use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::target::host_matches;
use crate::{ActorDescriptor, ActorInput, ResourceLimits, ScrapeTarget};

/// Actors dedicated to one domain (and its subdomains).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    pub domain: String,
    pub actors: Vec<ActorDescriptor>,
}

/// Static domain table plus the universal fallback actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTable {
    pub rules: Vec<DomainRule>,
    pub generic: ActorDescriptor,
}

impl CandidateTable {
    pub fn new(rules: Vec<DomainRule>, generic: ActorDescriptor) -> Self {
        Self { rules, generic }
    }

    /// Ordered candidates for `target`: matching domain actors by ascending
    /// priority (table order breaks ties), then exactly one generic actor.
    pub fn select(&self, target: &ScrapeTarget) -> Vec<ActorDescriptor> {
        let mut matched: Vec<&ActorDescriptor> = match target.host.as_deref() {
            Some(host) => self
                .rules
                .iter()
                .filter(|rule| host_matches(host, &rule.domain))
                .flat_map(|rule| rule.actors.iter())
                .collect(),
            None => Vec::new(),
        };
        matched.sort_by_key(|actor| actor.priority);

        let mut selected: Vec<ActorDescriptor> = Vec::with_capacity(matched.len() + 1);
        for actor in matched {
            let duplicate = actor.id == self.generic.id
                || selected.iter().any(|existing| existing.id == actor.id);
            if !duplicate {
                selected.push(actor.clone());
            }
        }
        selected.push(self.generic.clone());
        selected
    }
}

fn limits(memory_mbytes: u32, timeout_secs: u32, max_items: u32) -> ResourceLimits {
    ResourceLimits {
        memory_mbytes: Some(memory_mbytes),
        timeout_secs: Some(timeout_secs),
        max_items: Some(max_items),
    }
}

impl Default for CandidateTable {
    fn default() -> Self {
        let rules = vec![
            DomainRule {
                domain: "zillow.com".into(),
                actors: vec![
                    ActorDescriptor::new(
                        "maxcopell~zillow-detail-scraper",
                        ActorInput::start_urls(),
                    )
                    .with_limits(limits(1024, 120, 10))
                    .with_priority(1),
                    ActorDescriptor::new(
                        "petr_cermak~zillow-api-scraper",
                        ActorInput::url_list("zpidUrls"),
                    )
                    .with_limits(limits(1024, 120, 10))
                    .with_priority(2),
                ],
            },
            DomainRule {
                domain: "redfin.com".into(),
                actors: vec![ActorDescriptor::new(
                    "tri_angle~redfin-detail",
                    ActorInput::start_urls(),
                )
                .with_limits(limits(1024, 120, 10))
                .with_priority(1)],
            },
            DomainRule {
                domain: "realtor.com".into(),
                actors: vec![ActorDescriptor::new(
                    "epctex~realtor-scraper",
                    ActorInput::start_urls().with_extra("proxy", json!({ "useApifyProxy": true })),
                )
                .with_limits(limits(2048, 150, 10))
                .with_priority(1)],
            },
            DomainRule {
                domain: "facebook.com".into(),
                actors: vec![ActorDescriptor::new(
                    "apify~facebook-posts-scraper",
                    ActorInput::start_urls().with_extra("resultsLimit", json!(20)),
                )
                .with_limits(limits(2048, 180, 20))
                .with_priority(1)],
            },
            DomainRule {
                domain: "instagram.com".into(),
                actors: vec![ActorDescriptor::new(
                    "apify~instagram-scraper",
                    ActorInput::url_list("directUrls")
                        .with_extra("resultsType", json!("posts")),
                )
                .with_limits(limits(1024, 120, 20))
                .with_priority(1)],
            },
            DomainRule {
                domain: "reddit.com".into(),
                actors: vec![ActorDescriptor::new(
                    "trudax~reddit-scraper-lite",
                    ActorInput::start_urls().with_extra("maxComments", json!(10)),
                )
                .with_limits(limits(1024, 120, 20))
                .with_priority(1)],
            },
            DomainRule {
                domain: "nextdoor.com".into(),
                actors: vec![ActorDescriptor::new(
                    "curious_coder~nextdoor-scraper",
                    ActorInput::start_urls().with_location_field("location"),
                )
                .with_limits(limits(1024, 120, 20))
                .with_priority(1)],
            },
            DomainRule {
                domain: "craigslist.org".into(),
                actors: vec![ActorDescriptor::new(
                    "ivanvs~craigslist-scraper",
                    ActorInput::url_list("urls"),
                )
                .with_limits(limits(512, 90, 25))
                .with_priority(1)],
            },
        ];

        let generic = ActorDescriptor::new(
            "apify~website-content-crawler",
            ActorInput::start_urls()
                .with_extra("maxCrawlDepth", json!(0))
                .with_extra("crawlerType", json!("playwright:adaptive")),
        )
        .with_limits(limits(2048, 120, 5))
        .with_priority(u8::MAX);

        Self::new(rules, generic)
    }
}
