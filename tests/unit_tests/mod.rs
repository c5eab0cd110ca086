mod candidates;
mod construction;
mod handle;
mod io;
mod mesh;
mod recovery;
mod transform;
