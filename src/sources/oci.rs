//! OCI fetcher - packages published as OCI artifacts.
//!
//! Talks the registry HTTP API directly: resolve the manifest for a tag,
//! download the package layer, verify its digest and unpack it. Anonymous
//! bearer tokens are obtained from the registry's `WWW-Authenticate`
//! challenge when the registry asks for one.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::Deserialize;
use tar::Archive;

use crate::core::SourceId;
use crate::sources::Fetcher;
use crate::util::hash::sha256_bytes;
use crate::util::Shell;

const MANIFEST_MEDIA_TYPES: &str =
    "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Image manifest, reduced to what a package pull needs.
#[derive(Debug, Deserialize)]
struct ImageManifest {
    layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    digest: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Pulls OCI artifacts over HTTPS.
pub struct OciFetcher {
    shell: Arc<Shell>,
    client: Client,
}

impl OciFetcher {
    pub fn new(shell: Arc<Shell>) -> Self {
        OciFetcher {
            shell,
            client: Client::new(),
        }
    }

    fn get(&self, url: &str, accept: Option<&str>, token: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        request
            .send()
            .with_context(|| format!("failed to send request to {}", url))
    }

    /// GET with a single retry after answering a bearer challenge.
    fn get_authorized(
        &self,
        url: &str,
        accept: Option<&str>,
        token: &mut Option<String>,
    ) -> Result<Response> {
        let response = self.get(url, accept, token.as_deref())?;
        if response.status() != StatusCode::UNAUTHORIZED || token.is_some() {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .with_context(|| format!("{} requires authentication", url))?;

        *token = Some(self.request_token(&challenge)?);
        self.get(url, accept, token.as_deref())
    }

    fn request_token(&self, challenge: &str) -> Result<String> {
        let params = parse_challenge(challenge);
        let realm = params
            .get("realm")
            .with_context(|| format!("unsupported authentication challenge: {}", challenge))?;

        let mut query = Vec::new();
        for key in ["service", "scope"] {
            if let Some(value) = params.get(key) {
                query.push((key, value.as_str()));
            }
        }

        tracing::debug!("requesting anonymous token from {}", realm);
        let response = self
            .client
            .get(realm)
            .query(&query)
            .send()
            .with_context(|| format!("failed to request token from {}", realm))?;
        if !response.status().is_success() {
            bail!("token request to {} failed: HTTP {}", realm, response.status());
        }

        let body: TokenResponse = response.json().context("invalid token response")?;
        body.token
            .or(body.access_token)
            .context("token response carries no token")
    }

    fn pull(&self, registry: &str, repository: &str, tag: &str, dest: &Path) -> Result<()> {
        let base = format!("https://{}/v2/{}", registry, repository);
        let mut token = None;

        let url = format!("{}/manifests/{}", base, tag);
        let response = self.get_authorized(&url, Some(MANIFEST_MEDIA_TYPES), &mut token)?;
        if !response.status().is_success() {
            bail!(
                "failed to resolve {}/{}:{}: HTTP {}",
                registry,
                repository,
                tag,
                response.status()
            );
        }
        let manifest: ImageManifest = response
            .json()
            .with_context(|| format!("invalid manifest for {}/{}:{}", registry, repository, tag))?;

        let layer = manifest
            .layers
            .first()
            .with_context(|| format!("{}/{}:{} has no layers", registry, repository, tag))?;
        tracing::debug!("downloading layer {} ({} bytes)", layer.digest, layer.size);

        let url = format!("{}/blobs/{}", base, layer.digest);
        let response = self.get_authorized(&url, None, &mut token)?;
        if !response.status().is_success() {
            bail!("failed to download {}: HTTP {}", layer.digest, response.status());
        }
        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read layer {}", layer.digest))?;

        verify_digest(&layer.digest, &bytes)?;
        extract_layer(&bytes, dest)
            .with_context(|| format!("failed to extract layer {}", layer.digest))
    }
}

impl Fetcher for OciFetcher {
    fn fetch(&self, source: &SourceId, dest: &Path) -> Result<()> {
        let SourceId::Oci {
            registry,
            repository,
            tag,
        } = source
        else {
            bail!("not an OCI source: {}", source);
        };

        self.shell.line(format!(
            "downloading '{}:{}' from '{}/{}:{}'",
            repository, tag, registry, repository, tag
        ));

        self.pull(registry, repository, tag, dest)
    }
}

/// Parse `Bearer realm="...",service="...",scope="..."`.
fn parse_challenge(challenge: &str) -> HashMap<String, String> {
    static PARAM: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = PARAM
        .get_or_init(|| Regex::new(r#"(\w+)="([^"]*)""#).ok())
        .as_ref()
    else {
        return HashMap::new();
    };

    re.captures_iter(challenge)
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
        .collect()
}

fn verify_digest(digest: &str, data: &[u8]) -> Result<()> {
    let Some(expected) = digest.strip_prefix("sha256:") else {
        tracing::debug!("skipping verification of non-sha256 digest {}", digest);
        return Ok(());
    };

    let actual = sha256_bytes(data);
    if actual != expected {
        bail!(
            "layer digest mismatch:\n  expected: {}\n  actual:   sha256:{}",
            digest,
            actual
        );
    }
    Ok(())
}

/// Unpack a (possibly gzip-compressed) tar layer into `dest`.
fn extract_layer(data: &[u8], dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create directory: {}", dest.display()))?;

    let reader: Box<dyn Read> = if data.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(Cursor::new(data)))
    } else {
        Box::new(Cursor::new(data))
    };

    let mut archive = Archive::new(reader);
    for entry in archive.entries().context("failed to read layer entries")? {
        let mut entry = entry.context("failed to read layer entry")?;
        // `unpack_in` refuses entries that would escape `dest`.
        if !entry.unpack_in(dest)? {
            let path = entry.path()?.display().to_string();
            bail!("layer entry escapes destination directory: {}", path);
        }
    }

    Ok(())
}
