//! OIDC discovery document and JWKS fetching.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AuthConfig;

/// Endpoints and key material published by the identity provider.
///
/// Immutable once published: a re-fetch replaces the whole value through
/// [`super::ProviderHandle`], readers never observe a partial update.
#[derive(Clone)]
pub struct ProviderConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Logout redirect target. Absence disables logout redirection.
    pub end_session_url: Option<String>,
    pub jwks_uri: Option<String>,
    /// Verification key, present when signature checking is enabled.
    pub public_key: Option<DecodingKey>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("end_session_url", &self.end_session_url)
            .field("jwks_uri", &self.jwks_uri)
            .field("public_key", &self.public_key.as_ref().map(|_| "<key>"))
            .finish()
    }
}

/// OIDC discovery document, reduced to the fields this crate consumes.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    userinfo_endpoint: Option<String>,
    end_session_endpoint: Option<String>,
    jwks_uri: Option<String>,
}

/// JWKS response from the endpoint.
#[derive(Debug, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JSON Web Key.
#[derive(Debug, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC)
    pub kty: String,
    /// Key ID
    pub kid: Option<String>,
    /// Algorithm
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use")]
    pub key_use: Option<String>,

    // RSA parameters
    /// RSA modulus (base64url)
    pub n: Option<String>,
    /// RSA exponent (base64url)
    pub e: Option<String>,

    // EC parameters
    /// EC curve
    pub crv: Option<String>,
    /// EC x coordinate (base64url)
    pub x: Option<String>,
    /// EC y coordinate (base64url)
    pub y: Option<String>,
}

/// Fetch the discovery document and, when signature checking is enabled,
/// the JWKS verification key.
pub async fn fetch_provider_config(
    client: &reqwest::Client,
    config: &AuthConfig,
) -> Result<ProviderConfig> {
    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        config.issuer.trim_end_matches('/')
    );

    debug!(url = %discovery_url, "Fetching OIDC discovery document");

    let response = client
        .get(&discovery_url)
        .send()
        .await
        .context("Failed to fetch discovery document")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Discovery endpoint returned status {}",
            response.status()
        ));
    }

    let doc: DiscoveryDocument = response
        .json()
        .await
        .context("Failed to parse discovery document")?;

    let authorize_url = doc
        .authorization_endpoint
        .ok_or_else(|| anyhow!("Discovery document missing 'authorization_endpoint'"))?;
    let token_url = doc
        .token_endpoint
        .ok_or_else(|| anyhow!("Discovery document missing 'token_endpoint'"))?;
    let userinfo_url = doc
        .userinfo_endpoint
        .ok_or_else(|| anyhow!("Discovery document missing 'userinfo_endpoint'"))?;

    let public_key = if config.check_signature {
        let jwks_uri = doc
            .jwks_uri
            .as_ref()
            .ok_or_else(|| anyhow!("Discovery document missing 'jwks_uri'"))?;
        Some(fetch_verification_key(client, jwks_uri).await?)
    } else {
        None
    };

    Ok(ProviderConfig {
        authorize_url,
        token_url,
        userinfo_url,
        end_session_url: doc.end_session_endpoint,
        jwks_uri: doc.jwks_uri,
        public_key,
    })
}

/// Fetch the JWKS document and build a verification key from the first
/// usable signing entry.
async fn fetch_verification_key(
    client: &reqwest::Client,
    jwks_uri: &str,
) -> Result<DecodingKey> {
    debug!(url = %jwks_uri, "Fetching JWKS");

    let response = client
        .get(jwks_uri)
        .send()
        .await
        .context("Failed to fetch JWKS")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "JWKS endpoint returned status {}",
            response.status()
        ));
    }

    let jwks: Jwks = response.json().await.context("Failed to parse JWKS")?;

    for jwk in &jwks.keys {
        // Skip encryption keys
        if jwk.key_use.as_deref() == Some("enc") {
            continue;
        }

        match jwk_to_decoding_key(jwk) {
            Ok(key) => {
                debug!(kid = ?jwk.kid, kty = %jwk.kty, "Loaded JWK");
                return Ok(key);
            }
            Err(e) => {
                warn!(
                    kid = ?jwk.kid,
                    kty = %jwk.kty,
                    error = %e,
                    "Failed to parse JWK, skipping"
                );
            }
        }
    }

    Err(anyhow!("No valid signing keys found in JWKS"))
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref().ok_or_else(|| anyhow!("RSA key missing 'n'"))?;
            let e = jwk.e.as_ref().ok_or_else(|| anyhow!("RSA key missing 'e'"))?;

            DecodingKey::from_rsa_components(n, e).context("Failed to create RSA DecodingKey")
        }
        "EC" => {
            let x = jwk.x.as_ref().ok_or_else(|| anyhow!("EC key missing 'x'"))?;
            let y = jwk.y.as_ref().ok_or_else(|| anyhow!("EC key missing 'y'"))?;
            let crv = jwk
                .crv
                .as_ref()
                .ok_or_else(|| anyhow!("EC key missing 'crv'"))?;

            // Decode x and y from base64url
            let x_bytes = URL_SAFE_NO_PAD
                .decode(x)
                .context("Failed to decode EC x coordinate")?;
            let y_bytes = URL_SAFE_NO_PAD
                .decode(y)
                .context("Failed to decode EC y coordinate")?;

            // Build uncompressed EC point (0x04 || x || y)
            let mut point = vec![0x04];
            point.extend_from_slice(&x_bytes);
            point.extend_from_slice(&y_bytes);

            match crv.as_str() {
                "P-256" | "P-384" => {
                    let der = wrap_ec_public_key(&point, crv)?;
                    Ok(DecodingKey::from_ec_der(&der))
                }
                _ => Err(anyhow!("Unsupported EC curve: {}", crv)),
            }
        }
        kty => Err(anyhow!("Unsupported key type: {}", kty)),
    }
}

/// Wrap EC public key point in DER format.
fn wrap_ec_public_key(point: &[u8], curve: &str) -> Result<Vec<u8>> {
    // OID for EC public key
    let ec_public_key_oid = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01];

    // Curve OID
    let curve_oid: &[u8] = match curve {
        "P-256" => &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
        "P-384" => &[0x2B, 0x81, 0x04, 0x00, 0x22],
        _ => return Err(anyhow!("Unsupported curve for DER encoding: {}", curve)),
    };

    // Build AlgorithmIdentifier sequence
    let mut alg_id = vec![0x30]; // SEQUENCE
    let alg_id_content_len = 2 + ec_public_key_oid.len() + 2 + curve_oid.len();
    alg_id.push(alg_id_content_len as u8);
    alg_id.push(0x06); // OID tag
    alg_id.push(ec_public_key_oid.len() as u8);
    alg_id.extend_from_slice(ec_public_key_oid);
    alg_id.push(0x06); // OID tag
    alg_id.push(curve_oid.len() as u8);
    alg_id.extend_from_slice(curve_oid);

    // Build BIT STRING for public key
    let mut bit_string = vec![0x03]; // BIT STRING tag
    let bit_string_len = point.len() + 1; // +1 for unused bits byte
    if bit_string_len < 128 {
        bit_string.push(bit_string_len as u8);
    } else {
        bit_string.push(0x81);
        bit_string.push(bit_string_len as u8);
    }
    bit_string.push(0x00); // unused bits
    bit_string.extend_from_slice(point);

    // Build outer SEQUENCE
    let mut der = vec![0x30]; // SEQUENCE
    let total_len = alg_id.len() + bit_string.len();
    if total_len < 128 {
        der.push(total_len as u8);
    } else {
        der.push(0x81);
        der.push(total_len as u8);
    }
    der.extend_from_slice(&alg_id);
    der.extend_from_slice(&bit_string);

    Ok(der)
}
