//! Test configuration helpers

use chestxray_dl::Config;
use std::path::Path;
use wiremock::MockServer;

use super::fixtures::DATASET_PREFIX;

/// Config pointing at the mock host with the documents directory in `documents_dir`
pub fn mock_config(server: &MockServer, documents_dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.base_url = format!("{}{DATASET_PREFIX}/", server.uri());
    config.storage.documents_dir = Some(documents_dir.to_path_buf());
    config
}
