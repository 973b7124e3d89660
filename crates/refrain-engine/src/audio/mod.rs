pub mod decoder;
pub mod files;
pub mod tags;

pub use decoder::{hash_file, DecodedAudio, Decoder, SymphoniaDecoder};
pub use files::find_files;
pub use tags::{LoftyTagReader, TagReader, Tags};
