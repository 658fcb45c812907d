//! Point cloud loading and mesh saving.
//!
//! Points load from PLY (any numeric `x`/`y`/`z` vertex properties, ASCII or
//! binary) or XYZ text. Meshes save as ASCII PLY or OBJ.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use tracing::{debug, info, warn};

use crate::error::{ReconstructError, ReconstructResult};
use crate::mesh::Mesh;
use crate::tracing_ext::log_io_operation;
use crate::types::OrientedPoint;

/// Supported point cloud formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFormat {
    Ply,
    /// Whitespace-separated `x y z` per line.
    Xyz,
}

impl PointFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match extension(path)?.as_str() {
            "ply" => Some(PointFormat::Ply),
            "xyz" | "txt" => Some(PointFormat::Xyz),
            _ => None,
        }
    }
}

/// Supported mesh output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Ply,
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match extension(path)?.as_str() {
            "ply" => Some(MeshFormat::Ply),
            "obj" => Some(MeshFormat::Obj),
            _ => None,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn unsupported(path: &Path) -> ReconstructError {
    ReconstructError::unsupported_format(
        path.extension()
            .and_then(|e| e.to_str())
            .map(String::from),
    )
}

/// Load points from file, auto-detecting format from extension.
pub fn load_points(path: &Path) -> ReconstructResult<Vec<Point3<f64>>> {
    let format = PointFormat::from_path(path).ok_or_else(|| unsupported(path))?;
    info!("Loading points from {:?} (format: {:?})", path, format);

    let result = match format {
        PointFormat::Ply => load_ply_points(path),
        PointFormat::Xyz => load_xyz_points(path),
    };
    log_io_operation("load_points", path, Some(format_name(format)), result.is_ok());
    let points = result?;

    if let Some((min, max)) = crate::mesh::bounds_of(&points) {
        debug!(
            "Bounding box: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }
    info!("Loaded {} points", points.len());
    Ok(points)
}

fn format_name(format: PointFormat) -> &'static str {
    match format {
        PointFormat::Ply => "ply",
        PointFormat::Xyz => "xyz",
    }
}

/// Load the `vertex` element of a PLY file as points.
fn load_ply_points(path: &Path) -> ReconstructResult<Vec<Point3<f64>>> {
    use ply_rs::parser::Parser;

    let file = File::open(path).map_err(|e| ReconstructError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| ReconstructError::parse_error(path, format!("PLY parse error: {:?}", e)))?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| ReconstructError::parse_error(path, "PLY file has no vertex element"))?;

    let mut points = Vec::with_capacity(vertices.len());
    for element in vertices {
        let x = get_ply_float(element.get("x"), "x", path)?;
        let y = get_ply_float(element.get("y"), "y", path)?;
        let z = get_ply_float(element.get("z"), "z", path)?;
        points.push(Point3::new(x, y, z));
    }

    debug!("PLY loaded: {} vertices", points.len());
    Ok(points)
}

/// Helper to extract a float value from a PLY property.
fn get_ply_float(prop: Option<&Property>, name: &str, path: &Path) -> ReconstructResult<f64> {
    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(ReconstructError::parse_error(
            path,
            format!("Missing or invalid PLY property: {}", name),
        )),
    }
}

/// Load whitespace-separated `x y z` lines. Blank lines and `#` comments are
/// ignored; lines that do not start with three numbers are skipped with a
/// warning. Extra columns are ignored.
fn load_xyz_points(path: &Path) -> ReconstructResult<Vec<Point3<f64>>> {
    let file = File::open(path).map_err(|e| ReconstructError::io_read(path, e))?;
    let reader = BufReader::new(file);

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ReconstructError::io_read(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let coords: Vec<f64> = trimmed
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .take(3)
            .map_while(|s| s.parse::<f64>().ok())
            .collect();
        match coords.as_slice() {
            [x, y, z] => points.push(Point3::new(*x, *y, *z)),
            _ => {
                skipped += 1;
                debug!(line = line_no + 1, "Skipping malformed XYZ line");
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed lines in {:?}", skipped, path);
    }
    if points.is_empty() && skipped > 0 {
        return Err(ReconstructError::parse_error(
            path,
            "no line contained three numeric coordinates",
        ));
    }
    Ok(points)
}

/// Save mesh to file, auto-detecting format from extension.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    let format = MeshFormat::from_path(path).ok_or_else(|| unsupported(path))?;
    let result = match format {
        MeshFormat::Ply => save_ply(mesh, path),
        MeshFormat::Obj => save_obj(mesh, path),
    };
    log_io_operation(
        "save_mesh",
        path,
        Some(match format {
            MeshFormat::Ply => "ply",
            MeshFormat::Obj => "obj",
        }),
        result.is_ok(),
    );
    result
}

/// Save mesh as ASCII PLY with double-precision positions, vertex normals
/// when any vertex has one, and triangle faces.
pub fn save_ply(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    info!("Saving mesh to {:?} (PLY ASCII format)", path);

    let has_normals = mesh.vertices().iter().any(|v| v.normal.is_some());
    let mut ply = vertex_ply(mesh.vertex_count(), has_normals);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.face_count();
    ply.header.elements.add(face_def);

    let vertices = mesh
        .vertices()
        .iter()
        .map(|v| {
            vertex_element(
                &v.position,
                has_normals.then(|| v.normal.unwrap_or_else(Vector3::zeros)),
            )
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces = mesh
        .faces()
        .iter()
        .map(|face| {
            let mut element = DefaultElement::new();
            element.insert(
                "vertex_indices".to_string(),
                Property::ListInt(face.iter().map(|&i| i as i32).collect()),
            );
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    write_ply(&mut ply, path)?;
    info!(
        "Saved {} vertices and {} faces to {:?} (PLY ASCII)",
        mesh.vertex_count(),
        mesh.face_count(),
        path
    );
    Ok(())
}

/// Save oriented points as an ASCII PLY vertex cloud with `nx ny nz`.
/// Degenerate normals are written as zero vectors.
pub fn save_oriented_points(points: &[OrientedPoint], path: &Path) -> ReconstructResult<()> {
    if MeshFormat::from_path(path) != Some(MeshFormat::Ply) {
        return Err(unsupported(path));
    }
    info!("Saving {} oriented points to {:?}", points.len(), path);

    let mut ply = vertex_ply(points.len(), true);
    let vertices = points
        .iter()
        .map(|p| {
            vertex_element(
                &p.position,
                Some(p.normal.vector().unwrap_or_else(Vector3::zeros)),
            )
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let result = write_ply(&mut ply, path);
    log_io_operation("save_oriented_points", path, Some("ply"), result.is_ok());
    result
}

fn vertex_ply(count: usize, with_normals: bool) -> Ply<DefaultElement> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    if with_normals {
        for name in ["nx", "ny", "nz"] {
            vertex_def.properties.add(PropertyDef::new(
                name.to_string(),
                PropertyType::Scalar(ScalarType::Float),
            ));
        }
    }
    vertex_def.count = count;
    ply.header.elements.add(vertex_def);
    ply
}

fn vertex_element(position: &Point3<f64>, normal: Option<Vector3<f64>>) -> DefaultElement {
    let mut element = DefaultElement::new();
    element.insert("x".to_string(), Property::Double(position.x));
    element.insert("y".to_string(), Property::Double(position.y));
    element.insert("z".to_string(), Property::Double(position.z));
    if let Some(n) = normal {
        element.insert("nx".to_string(), Property::Float(n.x as f32));
        element.insert("ny".to_string(), Property::Float(n.y as f32));
        element.insert("nz".to_string(), Property::Float(n.z as f32));
    }
    element
}

fn write_ply(ply: &mut Ply<DefaultElement>, path: &Path) -> ReconstructResult<()> {
    use ply_rs::writer::Writer;

    // Header counts must match the payload before ply-rs will write it.
    ply.make_consistent().map_err(|e| {
        ReconstructError::io_write(
            path,
            std::io::Error::other(format!("PLY consistency error: {:?}", e)),
        )
    })?;

    let file = File::create(path).map_err(|e| ReconstructError::io_write(path, e))?;
    let mut writer = BufWriter::new(file);

    Writer::new().write_ply(&mut writer, ply).map_err(|e| {
        ReconstructError::io_write(path, std::io::Error::other(format!("PLY write error: {:?}", e)))
    })?;
    writer
        .flush()
        .map_err(|e| ReconstructError::io_write(path, e))
}

/// Save mesh as Wavefront OBJ with vertex normals when present.
pub fn save_obj(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    info!("Saving mesh to {:?} (OBJ format)", path);

    let file = File::create(path).map_err(|e| ReconstructError::io_write(path, e))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(|e| ReconstructError::io_write(path, e))?;

    info!(
        "Saved {} vertices and {} faces to {:?} (OBJ)",
        mesh.vertex_count(),
        mesh.face_count(),
        path
    );
    Ok(())
}

fn write_obj(mesh: &Mesh, w: &mut impl Write) -> std::io::Result<()> {
    writeln!(w, "# OBJ file exported by pointmesh")?;
    writeln!(w, "# Vertices: {}", mesh.vertex_count())?;
    writeln!(w, "# Faces: {}", mesh.face_count())?;
    writeln!(w)?;

    // OBJ normals are indexed per vertex, so either all vertices get one or
    // none do.
    let has_normals = mesh.vertices().iter().all(|v| v.normal.is_some()) && mesh.vertex_count() > 0;

    for v in mesh.vertices() {
        writeln!(w, "v {} {} {}", v.position.x, v.position.y, v.position.z)?;
    }
    if has_normals {
        for n in mesh.vertices().iter().filter_map(|v| v.normal) {
            writeln!(w, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
        }
    }

    writeln!(w)?;
    for [a, b, c] in mesh.faces() {
        // OBJ indices are 1-based.
        let (a, b, c) = (a + 1, b + 1, c + 1);
        if has_normals {
            writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")?;
        } else {
            writeln!(w, "f {a} {b} {c}")?;
        }
    }
    w.flush()
}
