//! Authored dialogue content
//!
//! One JSON graph per locale, embedded at build time. A content directory
//! can override individual locales without a rebuild.

use crate::graph::{ConversationGraph, GraphLoadError};
use crate::locale::{CatalogError, GraphCatalog, Locale};
use rust_embed::Embed;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Embed)]
#[folder = "content/dialogue"]
struct Dialogues;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{locale} dialogue ({source_name}): {error}")]
    Invalid {
        locale: Locale,
        source_name: String,
        #[source]
        error: GraphLoadError,
    },
    #[error("cannot read {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("{source_name} is not valid UTF-8: {error}")]
    Encoding {
        source_name: String,
        #[source]
        error: std::str::Utf8Error,
    },
    #[error("no dialogue authored for the default locale '{0}'")]
    MissingDefault(Locale),
}

/// Catalog of validated graphs, loaded once at startup
#[derive(Debug)]
pub struct EmbeddedCatalog {
    graphs: HashMap<Locale, Arc<ConversationGraph>>,
}

impl EmbeddedCatalog {
    /// Load every locale, preferring files in `override_dir` over embedded ones.
    ///
    /// Any authoring defect is fatal: the assistant must not go live with a
    /// broken graph.
    pub fn load(override_dir: Option<&Path>, default_locale: Locale) -> Result<Self, ContentError> {
        let mut graphs = HashMap::new();

        for locale in Locale::ALL {
            let Some((source_name, json)) = read_source(override_dir, locale)? else {
                tracing::warn!(%locale, "No dialogue authored for locale");
                continue;
            };
            let graph = ConversationGraph::from_json(&json).map_err(|error| ContentError::Invalid {
                locale,
                source_name: source_name.clone(),
                error,
            })?;
            tracing::info!(
                %locale,
                source = %source_name,
                nodes = graph.node_count(),
                "Loaded dialogue"
            );
            graphs.insert(locale, Arc::new(graph));
        }

        if !graphs.contains_key(&default_locale) {
            return Err(ContentError::MissingDefault(default_locale));
        }
        Ok(Self { graphs })
    }
}

fn file_name(locale: Locale) -> String {
    format!("{}.json", locale.tag())
}

/// Find the JSON for a locale: override directory first, then embedded
fn read_source(
    override_dir: Option<&Path>,
    locale: Locale,
) -> Result<Option<(String, String)>, ContentError> {
    let name = file_name(locale);

    if let Some(dir) = override_dir {
        let path = dir.join(&name);
        if path.exists() {
            let bytes = std::fs::read(&path)
                .map_err(|error| ContentError::Io { path: path.clone(), error })?;
            let source_name = path.display().to_string();
            let json = decode(&source_name, &bytes)?;
            return Ok(Some((source_name, json)));
        }
    }

    let Some(file) = Dialogues::get(&name) else {
        return Ok(None);
    };
    let source_name = format!("embedded:{name}");
    let json = decode(&source_name, &file.data)?;
    Ok(Some((source_name, json)))
}

fn decode(source_name: &str, bytes: &[u8]) -> Result<String, ContentError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|error| ContentError::Encoding {
            source_name: source_name.to_string(),
            error,
        })
}

impl GraphCatalog for EmbeddedCatalog {
    fn graph(&self, locale: Locale) -> Result<Arc<ConversationGraph>, CatalogError> {
        self.graphs
            .get(&locale)
            .cloned()
            .ok_or(CatalogError::MissingLocale(locale))
    }

    fn locales(&self) -> Vec<Locale> {
        Locale::ALL
            .into_iter()
            .filter(|l| self.graphs.contains_key(l))
            .collect()
    }
}
