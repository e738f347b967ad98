use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Federation aggregates run to tens of megabytes.
const MAX_DOCUMENT_BYTES: u64 = 512 * 1024 * 1024;

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads the metadata document from a URL or a local file.
pub fn load(source: &str) -> Result<Vec<u8>> {
    if is_url(source) {
        info!(url = source, "fetching metadata");
        let mut response = ureq::get(source)
            .call()
            .with_context(|| format!("Failed to fetch metadata from {}", source))?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_DOCUMENT_BYTES)
            .read_to_vec()
            .with_context(|| format!("Failed to read metadata from {}", source))
    } else {
        info!(path = source, "reading metadata");
        std::fs::read(Path::new(source))
            .with_context(|| format!("Failed to read metadata file {}", source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_urls() {
        assert!(is_url("https://metadata.example.org/aggregate.xml"));
        assert!(is_url("http://localhost/md.xml"));
        assert!(!is_url("/var/lib/metadata/aggregate.xml"));
        assert!(!is_url("file:///var/lib/metadata.xml"));
    }

    #[test]
    fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<EntityDescriptor/>").unwrap();
        let bytes = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bytes, b"<EntityDescriptor/>");
    }

    #[test]
    fn missing_file_names_the_source() {
        let err = load("/nonexistent/metadata.xml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/metadata.xml"));
    }
}
