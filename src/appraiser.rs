use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use manifest_parser::Dependency;
use tokio::sync::{
    mpsc::{self, Sender},
    Semaphore,
};
use tracing::{debug, error, info};

use crate::{
    decoration::{version_decoration, DecorationPayload},
    document::Document,
    registry::{Registry, Versions},
};

/// A dependency together with its classification.
#[derive(Debug, Clone)]
pub struct Appraisal {
    pub manifest: PathBuf,
    pub dependency: Dependency,
    pub decoration: DecorationPayload,
}

pub enum AppraiserEvent {
    //result of one registry fetch, None when it failed
    Fetched {
        name: String,
        versions: Option<Versions>,
    },
}

//Appraiser owns the parsed documents for one run
//fetch tasks report back over a channel and the loop joins them with the records
#[derive(Debug, Clone)]
pub struct Appraiser {
    registry: Arc<Registry>,
    limit: Arc<Semaphore>,
    allow_prerelease: bool,
}

impl Appraiser {
    pub fn new(registry: Arc<Registry>, max_concurrent_fetches: usize, allow_prerelease: bool) -> Self {
        Self {
            registry,
            limit: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            allow_prerelease,
        }
    }

    /// Spawn a fetch for `name` unless one is already running.
    fn request(&self, name: &str, tx: Sender<AppraiserEvent>) -> bool {
        let Some(guard) = self.registry.begin_fetch(name) else {
            return false;
        };
        let registry = Arc::clone(&self.registry);
        let limit = Arc::clone(&self.limit);
        let name = name.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            let versions = match limit.acquire_owned().await {
                Ok(_permit) => registry.fetch_versions(&name).await,
                Err(e) => {
                    error!("fetch limiter closed: {}", e);
                    None
                }
            };
            if let Err(e) = tx.send(AppraiserEvent::Fetched { name, versions }).await {
                error!("appraiser fetched tx error: {}", e);
            }
        });
        true
    }

    pub async fn appraise(&self, documents: &[Document]) -> Vec<Appraisal> {
        let mut names: Vec<&str> = documents
            .iter()
            .flat_map(|doc| doc.registry_names())
            .collect();
        names.sort_unstable();
        names.dedup();

        let (tx, mut rx) = mpsc::channel::<AppraiserEvent>(64);
        let mut skipped = Vec::new();
        for name in &names {
            if !self.request(name, tx.clone()) {
                skipped.push(*name);
            }
        }
        drop(tx);

        let mut fetched: HashMap<String, Option<Versions>> = HashMap::new();
        while let Some(event) = rx.recv().await {
            match event {
                AppraiserEvent::Fetched { name, versions } => {
                    debug!(
                        "Appraiser Event: Fetched '{}' ({} versions)",
                        name,
                        versions.as_ref().map_or(0, |v| v.len())
                    );
                    fetched.insert(name, versions);
                }
            }
        }
        // another caller owned these fetches, take whatever it cached
        for name in skipped {
            fetched.insert(name.to_string(), self.registry.cached(name).await);
        }
        info!("appraised {} crates", fetched.len());

        documents
            .iter()
            .flat_map(|doc| {
                doc.dependencies.iter().map(|dep| {
                    let versions = fetched.get(&dep.name).and_then(|v| v.as_deref());
                    Appraisal {
                        manifest: doc.path.clone(),
                        dependency: dep.clone(),
                        decoration: version_decoration(
                            dep,
                            versions.map(Vec::as_slice),
                            self.allow_prerelease,
                        ),
                    }
                })
            })
            .collect()
    }
}
