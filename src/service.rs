//! Service wiring: construct the collaborators once, pass them down.
//!
//! There are no module-level singletons anywhere in this crate; everything
//! process-wide (cache, rate-limiter buckets, job state) lives inside the
//! objects built here. `init` is the single construction point and
//! `shutdown` the single teardown point for embedders.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::crawler::Crawler;
use crate::distill::{AdapterRegistry, Distiller, PolicyEngine};
use crate::error::SiftResult;
use crate::fetch::{ContentCache, Fetcher, PageRenderer, SharedCacheBackend};
use crate::jobs::JobQueue;
use crate::stream::StreamPipeline;

/// The assembled extraction service core.
pub struct Service {
    config: ServiceConfig,
    fetcher: Arc<Fetcher>,
    distiller: Arc<Distiller>,
    pipeline: StreamPipeline,
    crawler: Crawler,
    jobs: JobQueue,
}

/// Optional collaborators supplied by the embedder.
#[derive(Default)]
pub struct Collaborators {
    pub renderer: Option<Arc<dyn PageRenderer>>,
    pub shared_cache: Option<Arc<dyn SharedCacheBackend>>,
    pub policies: Option<PolicyEngine>,
    pub adapters: Option<AdapterRegistry>,
}

impl Service {
    /// Build the whole core from one config. The job queue worker does not
    /// run until `start_jobs` is called.
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be constructed.
    pub fn init(config: ServiceConfig, collaborators: Collaborators) -> SiftResult<Self> {
        let mut fetcher = Fetcher::new(&config)?;
        if let Some(backend) = collaborators.shared_cache {
            fetcher = fetcher.with_cache(ContentCache::new(&config).with_shared_backend(backend));
        }
        if let Some(renderer) = collaborators.renderer {
            fetcher = fetcher.with_renderer(renderer);
        }
        let fetcher = Arc::new(fetcher);

        let mut distiller = Distiller::new(&config);
        if let Some(policies) = collaborators.policies {
            distiller = distiller.with_policy_engine(policies);
        }
        if let Some(adapters) = collaborators.adapters {
            distiller = distiller.with_adapters(adapters);
        }
        let distiller = Arc::new(distiller);

        let pipeline = StreamPipeline::new(&config, Arc::clone(&fetcher), Arc::clone(&distiller));
        let crawler = Crawler::new(&config, Arc::clone(&fetcher), Arc::clone(&distiller));
        let jobs = JobQueue::new(&config);

        Ok(Self {
            config,
            fetcher,
            distiller,
            pipeline,
            crawler,
            jobs,
        })
    }

    /// Start the job queue worker tick.
    pub async fn start_jobs(&self) {
        self.jobs.start().await;
    }

    /// Stop background work. Running jobs finish; nothing new dispatches.
    pub async fn shutdown(&self) {
        self.jobs.shutdown().await;
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    #[must_use]
    pub fn distiller(&self) -> &Arc<Distiller> {
        &self.distiller
    }

    #[must_use]
    pub fn pipeline(&self) -> &StreamPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    #[must_use]
    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }
}
