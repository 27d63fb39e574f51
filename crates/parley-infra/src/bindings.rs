//! Loading remote endpoint bindings from JSON files.
//!
//! A binding file looks like:
//!
//! ```json
//! {
//!   "url": "http://localhost:9000/api",
//!   "api_info": [{"name": "search_get", "description": "...", "parameters": {...}}]
//! }
//! ```
//!
//! `url_md5` may be omitted; it is then derived from the URL. Descriptor
//! names that do not yet end in `_{fingerprint}` get it appended, so the
//! model sees the composite `{operation}_{method}_{fingerprint}` names.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use md5::{Digest, Md5};

use parley_types::function::{BoundEndpoint, FunctionDescriptor};

#[derive(Debug, Deserialize)]
struct BindingFile {
    url: String,
    #[serde(default)]
    url_md5: Option<String>,
    #[serde(default)]
    api_info: Vec<FunctionDescriptor>,
}

/// Fingerprint of an endpoint URL: the lowercase hex MD5 of the URL bytes,
/// as written by other tools producing binding files. Contains no `_`, so it
/// survives composite-name decomposition.
pub fn url_fingerprint(url: &str) -> String {
    Md5::digest(url.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Read and normalize one binding file.
pub async fn load_endpoint_binding(path: &Path) -> anyhow::Result<BoundEndpoint> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read binding file {}", path.display()))?;
    let file: BindingFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse binding file {}", path.display()))?;
    normalize_binding(file)
}

fn normalize_binding(file: BindingFile) -> anyhow::Result<BoundEndpoint> {
    let fingerprint = match file.url_md5 {
        Some(fp) if !fp.is_empty() => fp,
        _ => url_fingerprint(&file.url),
    };
    anyhow::ensure!(
        !fingerprint.contains('_'),
        "endpoint fingerprint '{fingerprint}' must not contain '_'"
    );

    let suffix = format!("_{fingerprint}");
    let api_info = file
        .api_info
        .into_iter()
        .map(|mut descriptor| {
            if !descriptor.name.ends_with(&suffix) {
                descriptor.name.push_str(&suffix);
            }
            descriptor
        })
        .collect();

    Ok(BoundEndpoint {
        url: file.url,
        url_md5: fingerprint,
        api_info,
    })
}
