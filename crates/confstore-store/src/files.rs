//! Construction of the store files for a station.

use std::path::Path;

use confstore_file::StoreFile;
use confstore_types::CipherFactory;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::StoreResult;

fn cipher_source<'a>(
    config: &StoreConfig,
    ciphers: Option<&'a dyn CipherFactory>,
) -> Option<&'a dyn CipherFactory> {
    if !config.encrypt_credentials {
        return None;
    }
    if ciphers.is_none() {
        warn!("credential encryption enabled but no cipher factory given");
    }
    ciphers
}

/// Create the shared store file of the configured station under
/// `<base_dir>/<store_directory_name>`.
pub fn create_shared_file(
    base_dir: &Path,
    config: &StoreConfig,
    ciphers: Option<&dyn CipherFactory>,
) -> StoreResult<StoreFile> {
    let file_id = config.sta_id.shared_file();
    Ok(StoreFile::create(
        base_dir,
        &config.store_directory_name,
        file_id,
        &config.file_table,
        cipher_source(config, ciphers),
    )?)
}

/// Create the user store files of the configured station under
/// `<user_dir>/<store_directory_name>`.
///
/// User file ids missing from the file table are not used by the deployment
/// and are skipped.
pub fn create_user_files(
    user_dir: &Path,
    config: &StoreConfig,
    ciphers: Option<&dyn CipherFactory>,
) -> StoreResult<Vec<StoreFile>> {
    let ciphers = cipher_source(config, ciphers);
    let mut files = Vec::new();
    for &file_id in config.sta_id.user_files() {
        if !config.file_table.contains(file_id) {
            debug!(file = %file_id, "user file not in file table, skipping");
            continue;
        }
        files.push(StoreFile::create(
            user_dir,
            &config.store_directory_name,
            file_id,
            &config.file_table,
            ciphers,
        )?);
    }
    Ok(files)
}
