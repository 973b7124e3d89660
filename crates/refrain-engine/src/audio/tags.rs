use lofty::file::TaggedFileExt;
use lofty::tag::Accessor;
use std::path::Path;

/// Descriptive tags read from a source. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
}

/// Reads descriptive tags from a source.
///
/// Tag reading never fails a source: unreadable tags come back empty.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Tags;
}

/// Tag reader backed by lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    pub fn new() -> Self {
        Self
    }

    fn extract(path: &Path) -> Result<Tags, lofty::error::LoftyError> {
        let tagged_file = lofty::read_from_path(path)?;
        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(Tags::default());
        };

        Ok(Tags {
            title: non_empty(tag.title().map(|s| s.to_string())),
            artist: non_empty(tag.artist().map(|s| s.to_string())),
            genre: non_empty(tag.genre().map(|s| s.to_string())),
        })
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Tags {
        match Self::extract(path) {
            Ok(tags) => tags,
            Err(e) => {
                log::warn!("Failed to read tags from {}: {}", path.display(), e);
                Tags::default()
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
