use std::sync::{Mutex, RwLock};
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::cache::TtlCache;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    AUTHENTICATION_PATH, AuthResponse, DEFAULT_BASE_URL, authentication_data, const_temp_data,
    menu_path, menu_value_data, menu_value_path, module_path, modules_path, registered_zones,
    zone_state_data, zones_path,
};
use crate::types::*;
use crate::{Error, Result};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TechClientBuilder {
    base_url: String,
    http: Option<reqwest::Client>,
    credentials: Option<Credentials>,
    cache_ttl: Duration,
    request_timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl Default for TechClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TechClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http: None,
            credentials: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Reuse a connection pool owned by the host.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Start already authenticated, e.g. from persisted config.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// How long zone and menu reads are memoized. Zero disables memoization.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<TechClient> {
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().build()?,
        };

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        let mut base_url = self.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(TechClient {
            http,
            base_url,
            request_timeout: self.request_timeout,
            session: RwLock::new(self.credentials),
            zones_cache: TtlCache::new(self.cache_ttl),
            menu_cache: TtlCache::new(self.cache_ttl),
            logger,
        })
    }
}

/// Authenticated client for the emodul REST API.
///
/// All operations take `&self`; share one instance between coordinators
/// with `Arc`.
pub struct TechClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    session: RwLock<Option<Credentials>>,
    zones_cache: TtlCache<String, Zones>,
    menu_cache: TtlCache<(String, String), ModuleMenu>,
    logger: Option<Mutex<MessageLogger>>,
}

impl TechClient {
    pub fn builder() -> TechClientBuilder {
        TechClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.session.read().expect("session lock poisoned").clone()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.session.write().expect("session lock poisoned") = Some(credentials);
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().expect("session lock poisoned").is_some()
    }

    /// Log in and keep the returned session for all later calls.
    ///
    /// Returns `false` when the service rejects the credentials; the client
    /// then stays unauthenticated.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        debug!(username, "authenticating");
        let body = authentication_data(username, password);
        let (status, text) = self
            .send(Method::POST, AUTHENTICATION_PATH, Some(&body), None)
            .await?;
        let resp: AuthResponse = self.decode(AUTHENTICATION_PATH, status, &text)?;

        if !resp.authenticated {
            debug!(username, "authentication rejected");
            return Ok(false);
        }

        let (Some(user_id), Some(token)) = (resp.user_id, resp.token) else {
            return Err(Error::Remote {
                status,
                body: "authenticated response without user_id or token".to_string(),
            });
        };
        self.set_credentials(Credentials::new(user_id.into_string(), token));
        Ok(true)
    }

    pub async fn list_modules(&self) -> Result<Vec<Module>> {
        let session = self.session()?;
        self.get(&modules_path(&session.user_id), &session).await
    }

    /// Full module payload, bypassing the cache.
    pub async fn get_module_data(&self, udid: &str) -> Result<ModuleData> {
        let session = self.session()?;
        debug!(udid, user_id = %session.user_id, "getting module data");
        self.get(&module_path(&session.user_id, udid), &session).await
    }

    /// Registered zones of a module keyed by zone id, memoized per udid.
    pub async fn get_module_zones(&self, udid: &str) -> Result<Zones> {
        self.zones_cache
            .get_or_try_fetch(&udid.to_string(), || async {
                let data = self.get_module_data(udid).await?;
                Ok::<_, Error>(registered_zones(data))
            })
            .await
    }

    pub async fn get_zone(&self, udid: &str, zone_id: u32) -> Result<ZoneElement> {
        self.get_module_zones(udid)
            .await?
            .remove(&zone_id)
            .ok_or(Error::InvalidZone(zone_id))
    }

    /// A named module menu ("mu", "mi", "ms", "mp"), memoized per (udid, menu).
    pub async fn get_module_menu(&self, udid: &str, menu_type: &str) -> Result<ModuleMenu> {
        let key = (udid.to_string(), menu_type.to_string());
        self.menu_cache
            .get_or_try_fetch(&key, || async {
                let session = self.session()?;
                debug!(udid, menu_type, "getting module menu");
                self.get(&menu_path(&session.user_id, udid, menu_type), &session)
                    .await
            })
            .await
    }

    // -- Command methods --

    /// Hold a zone at a constant temperature.
    pub async fn set_const_temp(&self, udid: &str, zone_id: u32, target: Temperature) -> Result<()> {
        if !target.celsius().is_finite() {
            return Err(Error::InvalidTemperature(target.celsius()));
        }
        let session = self.session()?;
        let mode_id = self.get_zone(udid, zone_id).await?.mode.id;
        debug!(udid, zone_id, %target, "setting zone constant temperature");

        let data = const_temp_data(mode_id, zone_id, target);
        let result = self
            .post_command("set_const_temp", udid, &zones_path(&session.user_id, udid), &data, &session)
            .await;
        self.zones_cache.invalidate(&udid.to_string());
        result
    }

    pub async fn set_zone_on(&self, udid: &str, zone_id: u32, on: bool) -> Result<()> {
        let session = self.session()?;
        debug!(udid, zone_id, on, "turning zone on/off");

        let data = zone_state_data(zone_id, on);
        let result = self
            .post_command("set_zone_on", udid, &zones_path(&session.user_id, udid), &data, &session)
            .await;
        self.zones_cache.invalidate(&udid.to_string());
        result
    }

    pub async fn set_menu_value(
        &self,
        udid: &str,
        menu_type: &str,
        menu_id: u32,
        value: i64,
    ) -> Result<()> {
        let session = self.session()?;
        debug!(udid, menu_type, menu_id, value, "setting menu value");

        let data = menu_value_data(value);
        let path = menu_value_path(&session.user_id, udid, menu_type, menu_id);
        let result = self
            .post_command("set_menu_value", udid, &path, &data, &session)
            .await;
        self.menu_cache
            .invalidate(&(udid.to_string(), menu_type.to_string()));
        result
    }

    // -- Helpers --

    fn session(&self) -> Result<Credentials> {
        self.credentials().ok_or(Error::Unauthorized)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, session: &Credentials) -> Result<T> {
        let (status, text) = self.send(Method::GET, path, None, Some(session)).await?;
        self.decode(path, status, &text)
    }

    async fn post_command(
        &self,
        action: &str,
        udid: &str,
        path: &str,
        data: &Value,
        session: &Credentials,
    ) -> Result<()> {
        self.log(|l| l.log_command(action, udid, data));
        let (status, text) = self.send(Method::POST, path, Some(data), Some(session)).await?;
        if let Ok(body) = serde_json::from_str::<Value>(&text) {
            trace!(path, status, %body, "command response");
            self.log(|l| l.log_response(path, status, &body));
        }
        Ok(())
    }

    /// Issue one request and return the status and body of a 2xx response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        session: Option<&Credentials>,
    ) -> Result<(u16, String)> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "sending request");
        self.log(|l| l.log_request(method.as_str(), path));

        let mut request = self
            .http
            .request(method, &url)
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout);
        if let Some(session) = session {
            request = request.bearer_auth(&session.token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), path, "invalid response from Tech API");
            if status == StatusCode::UNAUTHORIZED {
                return Err(Error::Unauthorized);
            }
            return Err(Error::Remote {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok((status.as_u16(), text))
    }

    fn decode<T: DeserializeOwned>(&self, path: &str, status: u16, text: &str) -> Result<T> {
        let decode_err = |source| Error::Decode {
            path: path.to_string(),
            source,
        };
        let value: Value = serde_json::from_str(text).map_err(decode_err)?;
        if path != AUTHENTICATION_PATH {
            trace!(path, status, body = %value, "response");
            self.log(|l| l.log_response(path, status, &value));
        }
        serde_json::from_value(value).map_err(decode_err)
    }

    fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            f(&mut logger);
        }
    }
}
