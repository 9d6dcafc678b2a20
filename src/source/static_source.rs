//! Static source runners
//!
//! A static source pulls a stream from somewhere (a remote URL, a camera)
//! and reports readiness back to its path through a [`SourceParent`]. The
//! pulling itself is protocol work and lives outside this crate.

use std::sync::Arc;

use crate::conf::PathConf;
use crate::path::SourceParent;

use super::SourceDescriptor;

/// Everything a static source needs when it is created
pub struct StaticSourceParams {
    /// Path name
    pub name: String,
    pub conf: Arc<PathConf>,
    /// Pattern captures of the path name
    pub matches: Vec<String>,
    /// Channel back to the owning path
    pub parent: SourceParent,
}

/// A running static source
///
/// Methods are called from the path actor and must not block.
pub trait StaticSource: Send + 'static {
    /// Begin pulling. `query` is the query of the request that triggered an
    /// on-demand start.
    fn start(&mut self, on_demand: bool, query: &str);

    /// Stop pulling; the source may be started again later
    fn stop(&mut self, reason: &str);

    /// Apply a hot-reloaded configuration
    fn reload_conf(&mut self, conf: Arc<PathConf>);

    /// Release the source for good
    fn close(&mut self, reason: &str);

    fn describe(&self) -> SourceDescriptor;
}

/// Creates static sources for paths that need one
pub trait StaticSourceFactory: Send + Sync + 'static {
    fn create(&self, params: StaticSourceParams) -> Box<dyn StaticSource>;
}

/// Factory for sources that never become ready
///
/// Used when no factory is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleSourceFactory;

struct IdleSource {
    name: String,
    url: String,
}

impl StaticSource for IdleSource {
    fn start(&mut self, on_demand: bool, _query: &str) {
        tracing::warn!(
            path = %self.name,
            on_demand = on_demand,
            "No static source runner configured, source will never become ready"
        );
    }

    fn stop(&mut self, _reason: &str) {}

    fn reload_conf(&mut self, conf: Arc<PathConf>) {
        self.url = conf.source.to_string();
    }

    fn close(&mut self, _reason: &str) {}

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("idleSource", self.url.clone())
    }
}

impl StaticSourceFactory for IdleSourceFactory {
    fn create(&self, params: StaticSourceParams) -> Box<dyn StaticSource> {
        Box::new(IdleSource {
            name: params.name,
            url: params.conf.source.to_string(),
        })
    }
}
