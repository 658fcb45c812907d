pub mod info;
pub mod normals;
pub mod reconstruct;
