//! Mesh loading: sources, parsing and reference-counted CPU geometry.
//!
//! The registry knows every mesh by name. CPU arrays are parsed on first use
//! and shared between consumers; each consumer gets its own GPU buffer.
pub mod geometry;
pub mod mesh;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::backend::RenderBackend;

use self::{
    geometry::GeometryBuffer,
    mesh::{MeshData, parse_obj},
};

/// Meshes shipped in `assets/meshes`, embedded for targets without a file system.
pub const BUILTIN_MESHES: [(&str, &str); 3] = [
    ("asteroid", include_str!("../../assets/meshes/asteroid.obj")),
    ("link", include_str!("../../assets/meshes/link.obj")),
    ("ring", include_str!("../../assets/meshes/ring.obj")),
];

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("no mesh named '{0}' is registered")]
    NotFound(String),
    #[error("mesh '{mesh}' is malformed: {reason}")]
    Parse { mesh: String, reason: String },
    #[error("mesh '{mesh}' could not be read")]
    Io {
        mesh: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub enum MeshSource {
    File(PathBuf),
    Text(String),
}

#[derive(Debug)]
struct MeshEntry {
    source: MeshSource,
    data: Option<Arc<MeshData>>,
    usage: usize,
}

#[derive(Debug, Default)]
pub struct MeshRegistry {
    entries: HashMap<String, MeshEntry>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `*.obj` file in `dir` under its file stem.
    ///
    /// Returns how many new meshes were registered.
    pub fn discover(&mut self, dir: impl AsRef<Path>) -> Result<usize, MeshError> {
        let dir = dir.as_ref();
        let io_error = |source: std::io::Error| MeshError::Io {
            mesh: dir.display().to_string(),
            source,
        };
        let mut found = 0;
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("obj") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let name = name.to_string();
            if self.register(name, MeshSource::File(path)) {
                found += 1;
            }
        }
        log::info!("discovered {} meshes in {}", found, dir.display());
        Ok(found)
    }

    /// Register an in-memory OBJ source. Returns `false` if the name is taken.
    pub fn register_source(&mut self, name: impl Into<String>, text: impl Into<String>) -> bool {
        self.register(name.into(), MeshSource::Text(text.into()))
    }

    /// Register the embedded [`BUILTIN_MESHES`]. Names already taken keep their source.
    pub fn register_builtin(&mut self) -> usize {
        BUILTIN_MESHES
            .iter()
            .filter(|(name, text)| self.register_source(*name, *text))
            .count()
    }

    pub fn register_file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> bool {
        self.register(name.into(), MeshSource::File(path.into()))
    }

    fn register(&mut self, name: String, source: MeshSource) -> bool {
        if self.entries.contains_key(&name) {
            log::info!("mesh '{}' is already registered, keeping the first source", name);
            return false;
        }
        self.entries.insert(
            name,
            MeshEntry {
                source,
                data: None,
                usage: 0,
            },
        );
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of live consumers of `name`'s CPU data.
    pub fn usage(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, |entry| entry.usage)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|entry| entry.data.is_some())
    }

    /// Parse `name` if needed and upload a fresh GPU copy of it.
    ///
    /// A failed parse leaves the mesh unloaded; a later call tries again.
    pub fn get_mesh(
        &mut self,
        name: &str,
        gpu: &mut impl RenderBackend,
    ) -> Result<GeometryBuffer, MeshError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| MeshError::NotFound(name.to_string()))?;

        let data = match &entry.data {
            Some(data) => Arc::clone(data),
            None => {
                let data = Arc::new(load(name, &entry.source)?);
                log::debug!(
                    "parsed mesh '{}': {} vertices, {} indices",
                    name,
                    data.vertex_count(),
                    data.index_count()
                );
                entry.data = Some(Arc::clone(&data));
                data
            }
        };
        entry.usage += 1;
        Ok(GeometryBuffer::upload(gpu, data))
    }

    /// Give up one use of `name`. The CPU arrays are dropped at zero.
    pub fn release(&mut self, name: &str) {
        let Some(entry) = self.entries.get_mut(name) else {
            log::warn!("released unknown mesh '{}'", name);
            return;
        };
        if entry.usage == 0 {
            log::warn!("mesh '{}' released more often than loaded", name);
            return;
        }
        entry.usage -= 1;
        if entry.usage == 0 {
            entry.data = None;
        }
    }
}

fn load(name: &str, source: &MeshSource) -> Result<MeshData, MeshError> {
    match source {
        MeshSource::Text(text) => parse_obj(name, text),
        MeshSource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| MeshError::Io {
                mesh: name.to_string(),
                source,
            })?;
            parse_obj(name, &text)
        }
    }
}
