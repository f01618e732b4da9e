//! Batch persistence
//!
//! One pretty-printed JSON file per run, named after the batch timestamp.

mod json_saver;

pub use json_saver::{
    BATCH_FILE_PREFIX, batch_file_name, latest_batch_file, load_batch, load_latest_batch,
    save_batch,
};
