//! collection of configuration files
//!
//! [HclFiles] maps [ProjectPath]s to parsed [RawFile]s. Files only have to be valid HCL to be accepted, a file that
//! fails to parse is kept as its syntax error so it can be reported together with every other problem.
//!
//! Files come either from disk ([HclFiles::on_disk], loaded lazily below a host directory) or from memory
//! ([HclFiles::in_memory], see [hcl_files!]).
use crate::ast::RawFile;
use crate::errors::Error;
use crate::project::{PathError, ProjectPath};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// File name suffixes of configuration files
pub const CONFIG_SUFFIXES: [&str; 2] = [".tm", ".tm.hcl"];

pub type LoadedFile = Result<RawFile, Error>;

#[derive(Debug, Default)]
pub struct HclFiles {
    /// host directory backing `/`, none for in-memory collections
    host_root: Option<PathBuf>,
    files: IndexMap<ProjectPath, LoadedFile>,
}

impl HclFiles {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn on_disk(host_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: Some(host_root.into()),
            files: Default::default(),
        }
    }

    pub fn host_root(&self) -> Option<&Path> {
        self.host_root.as_deref()
    }

    /// Parses and stores a file, replacing any previous content
    pub fn insert(&mut self, path: ProjectPath, text: &str) {
        let loaded = RawFile::parse(path.clone(), text);
        if let Err(error) = &loaded {
            tracing::debug!(%path, %error, "file does not parse");
        }
        self.files.insert(path, loaded);
    }

    /// Stores a file somebody else parsed already
    pub fn insert_raw(&mut self, file: RawFile) {
        self.files.insert(file.path.clone(), Ok(file));
    }

    pub fn get(&self, path: &ProjectPath) -> Option<&LoadedFile> {
        self.files.get(path)
    }

    /// Returns a file, reading it from disk on first access
    ///
    /// `Ok(None)` means that there is no such file.
    pub fn get_or_load(&mut self, path: &ProjectPath) -> Result<Option<&LoadedFile>, LoadError> {
        if !self.files.contains_key(path) {
            let Some(host_root) = &self.host_root else {
                return Ok(None);
            };

            let host_path = path.to_host(host_root);
            if !host_path.is_file() {
                return Ok(None);
            }

            self.load_file(path, &host_path)?;
        }

        Ok(self.files.get(path))
    }

    /// Configuration files directly inside `dir` in file name order
    ///
    /// Loads them from disk first when backed by a directory. Subdirectories are not visited.
    pub fn load_directory(&mut self, dir: &ProjectPath) -> Result<Vec<ProjectPath>, LoadError> {
        if let Some(host_root) = self.host_root.clone() {
            let host_dir = dir.to_host(&host_root);
            if !host_dir.is_dir() {
                return Err(LoadError::NotADirectory(host_dir));
            }

            let mut names = vec![];
            let read_dir = std::fs::read_dir(&host_dir).map_err(|source| LoadError::io(&host_dir, source))?;
            for dir_entry in read_dir {
                let dir_entry = dir_entry.map_err(|source| LoadError::io(&host_dir, source))?;
                let file_type = dir_entry
                    .file_type()
                    .map_err(|source| LoadError::io(dir_entry.path(), source))?;
                if !file_type.is_file() {
                    continue;
                }

                let name = dir_entry.file_name().to_string_lossy().into_owned();
                if is_config_file(&name) {
                    names.push(name);
                }
            }

            names.sort();
            for name in names {
                let path = dir.join(&name)?;
                if !self.files.contains_key(&path) {
                    self.load_file(&path, &host_dir.join(&name))?;
                }
            }
        }

        let mut paths: Vec<ProjectPath> = self
            .files
            .keys()
            .filter(|path| &path.dir() == dir && is_config_file(path.as_str()))
            .cloned()
            .collect();
        paths.sort();

        Ok(paths)
    }

    /// Configuration files directly inside `dir` whose file name matches `pattern`, in file name order
    pub fn glob(&mut self, dir: &ProjectPath, pattern: &glob::Pattern) -> Result<Vec<ProjectPath>, LoadError> {
        let matches: Vec<ProjectPath> = self
            .load_directory(dir)?
            .into_iter()
            .filter(|path| pattern.matches(path.file_name()))
            .collect();

        tracing::debug!(%dir, %pattern, matches = matches.len(), "expanded pattern");
        Ok(matches)
    }

    fn load_file(&mut self, path: &ProjectPath, host_path: &Path) -> Result<(), LoadError> {
        tracing::info!(path=%host_path.display(), "loading file");

        let text = std::fs::read_to_string(host_path).map_err(|source| LoadError::io(host_path, source))?;
        self.insert(path.clone(), &text);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_config_file(name: &str) -> bool {
    CONFIG_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("IO error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Path(#[from] PathError),
}

impl LoadError {
    fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_owned(),
            source,
        }
    }
}

/// Utility macro to create in-memory [HclFiles]
///
/// Create from a single file, stored as `/cfg.tm`
/// ```
/// # use terramate_hcl::hcl_files;
/// hcl_files!("stack {}");
/// ```
///
/// Create from multiple files (project paths required)
/// ```
/// # use terramate_hcl::hcl_files;
/// hcl_files! {
///   "/cfg.tm" => "terramate {}",
///   "/stack/stack.tm" => "stack {}"
/// };
/// ```
///
/// # Panic
/// Panics on paths escaping the root. Invalid HCL is kept as syntax error.
///
/// ```should_panic
/// # use terramate_hcl::hcl_files;
/// hcl_files!("/../outside.tm" => "stack {}");
/// ```
#[macro_export]
macro_rules! hcl_files {
    // single file at the root
    { $expr:expr } => {
        $crate::hcl_files! { "/cfg.tm" => $expr }
    };
    // multiple files with paths
    { $($path:expr => $expr:expr),+ $(,)? } => {{
        let mut files = $crate::hcl_files::HclFiles::in_memory();
        $(
            files.insert($crate::project::ProjectPath::new($path).expect("valid project path"), $expr);
        )+

        files
    }};
}
