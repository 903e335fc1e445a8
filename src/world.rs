//! A World decides which templates a render is allowed to reference, and where they
//! come from.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use crate::{runtime::Vars, Error};

/// Somewhere templates can be loaded from by name.
pub trait TemplateSource {
    /// `Ok(None)` means the template does not exist here
    fn load(&self, name: &str) -> io::Result<Option<String>>;

    /// Where this source looks, for error messages
    fn describe(&self) -> String {
        "template source".to_string()
    }
}

/// An ordered list of directories. The first one holding `dir/name` wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath(Vec<PathBuf>);

impl SearchPath {
    pub fn new<P: Into<PathBuf>>(dirs: impl IntoIterator<Item = P>) -> Self {
        Self(dirs.into_iter().map(Into::into).collect())
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new(["."])
    }
}

impl TemplateSource for SearchPath {
    fn load(&self, name: &str) -> io::Result<Option<String>> {
        for dir in &self.0 {
            let path = dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    debug!(path = %path.display(), "found template");
                    return Ok(Some(contents));
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "not here");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        let dirs = self
            .0
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>();
        format!("({})", dirs.join(" "))
    }
}

/// In-memory templates, keyed by name
impl TemplateSource for HashMap<String, String> {
    fn load(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self.get(name).cloned())
    }

    fn describe(&self) -> String {
        format!("in-memory templates ({} loaded)", self.len())
    }
}

/// Renders templates loaded from a [`TemplateSource`].
///
/// Every render starts from scratch, nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct Iwakura<S = SearchPath> {
    source: S,
}

impl<S: TemplateSource> Iwakura<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Loads the text of the template called `name`
    pub fn load(&self, name: &str) -> Result<String, Error> {
        match self.source.load(name) {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(Error::TemplateNotFound {
                name: Box::from(name),
                searched: self.source.describe(),
            }),
            Err(source) => Err(Error::Io {
                name: Box::from(name),
                source,
            }),
        }
    }

    #[tracing::instrument(skip(self, vars), fields(vars = vars.len()))]
    pub fn render(&self, name: &str, vars: &Vars) -> Result<String, Error> {
        let text = self.load(name)?;
        crate::render_text_with(&text, vars)
    }

    /// Renders `text` as if it had been loaded from this engine's source
    pub fn render_string(&self, text: &str, vars: &Vars) -> Result<String, Error> {
        crate::render_text_with(text, vars)
    }
}
