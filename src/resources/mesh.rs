//! CPU-side mesh data and the OBJ files it is loaded from.
//!
//! `tobj` does the parsing with a single index per distinct
//! vertex/texel/normal combination. On top of that only triangular faces
//! with a normal on every corner are accepted, and normals are rescaled to
//! unit length.

use std::io::{BufReader, Cursor};

use cgmath::{InnerSpace, Vector3};

use super::MeshError;

/// Parsed, immutable geometry of one mesh.
///
/// All per-vertex arrays have the same length; `indices` refers into them.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texels: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

pub fn parse_obj(name: &str, source: &str) -> Result<MeshData, MeshError> {
    let mut reader = BufReader::new(Cursor::new(with_origin_texel(source)));
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: false,
            ..Default::default()
        },
        // backdrop meshes are untextured
        |_| Err(tobj::LoadError::OpenFileFailed),
    )
    .map_err(|e| parse_error(name, e))?;

    let mut mesh = MeshData {
        name: name.to_string(),
        vertices: Vec::new(),
        normals: Vec::new(),
        texels: Vec::new(),
        indices: Vec::new(),
    };
    for model in &models {
        append_model(&mut mesh, &model.mesh).map_err(|reason| {
            parse_error(name, format!("{} in object '{}'", reason, model.name))
        })?;
    }
    if mesh.indices.is_empty() {
        return Err(parse_error(name, "mesh has no faces"));
    }
    Ok(mesh)
}

fn parse_error(mesh: &str, reason: impl std::fmt::Display) -> MeshError {
    MeshError::Parse {
        mesh: mesh.to_string(),
        reason: reason.to_string(),
    }
}

/// Sources without `vt` records get one texel at the origin, so corners
/// written as `v/1/n` still resolve.
fn with_origin_texel(source: &str) -> String {
    let has_texels = source
        .lines()
        .any(|line| line.split_whitespace().next() == Some("vt"));
    if has_texels {
        source.to_string()
    } else {
        format!("{}\nvt 0 0\n", source)
    }
}

/// Append one `tobj` object, shifting its indices past what is already there.
fn append_model(mesh: &mut MeshData, obj: &tobj::Mesh) -> Result<(), String> {
    if obj.indices.is_empty() {
        return Ok(());
    }
    if let Some(arity) = obj.face_arities.iter().find(|&&arity| arity != 3) {
        return Err(format!("face has {} corners, expected 3", arity));
    }
    if obj.indices.len() % 3 != 0 {
        return Err(format!("{} corners do not form triangles", obj.indices.len()));
    }

    let count = obj.positions.len() / 3;
    if obj.normals.len() != count * 3 {
        return Err("every corner needs a normal".to_string());
    }
    let has_texels = match obj.texcoords.len() {
        0 => false,
        len if len == count * 2 => true,
        _ => return Err("only some corners have a texel".to_string()),
    };

    let offset = mesh.vertices.len() as u32;
    for (i, (position, normal)) in obj
        .positions
        .chunks_exact(3)
        .zip(obj.normals.chunks_exact(3))
        .enumerate()
    {
        let normal = Vector3::new(normal[0], normal[1], normal[2]);
        if normal.magnitude2() <= f32::EPSILON {
            return Err("normal has zero length".to_string());
        }
        mesh.vertices.push([position[0], position[1], position[2]]);
        mesh.normals.push(normal.normalize().into());
        mesh.texels.push(if has_texels {
            [obj.texcoords[i * 2], obj.texcoords[i * 2 + 1]]
        } else {
            [0.0, 0.0]
        });
    }
    mesh.indices.extend(obj.indices.iter().map(|index| index + offset));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_obj, with_origin_texel};

    #[test]
    fn origin_texel_is_added_only_when_missing() {
        let untextured = "v 0 0 0\nvn 0 0 1";
        assert!(with_origin_texel(untextured).ends_with("vt 0 0\n"));

        let textured = "v 0 0 0\nvt 0.5 0.5\nvn 0 0 1";
        assert_eq!(with_origin_texel(textured), textured);
    }

    #[test]
    fn texel_index_without_texels_samples_the_origin() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1";
        let mesh = parse_obj("flat", source).unwrap();
        assert_eq!(mesh.texels, vec![[0.0, 0.0]; 3]);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf -3//-1 -2//-1 -1//-1";
        let mesh = parse_obj("relative", source).unwrap();
        assert_eq!(mesh.vertices, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn objects_are_merged_into_one_index_space() {
        let source = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 4//1 5//1 6//1";
        let mesh = parse_obj("pair", source).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.vertices[3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn partially_textured_faces_are_rejected() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 1 1\nvn 0 0 1\nf 1/1/1 2//1 3//1";
        assert!(parse_obj("patchy", source).is_err());
    }
}
