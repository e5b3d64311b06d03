//! reqwest implementation of [`ConsoleApi`]

use adminkit_core::{
    config_error, ApiConfig, ApiError, ApiResult, ConsoleApi, ConsoleResult, Credentials,
    Identity, IdentityDraft, IdentityId, IdentityRoleAssignment, LoginGrant, Module, ModuleId,
    Role, RoleId,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{backend_error, create_http_client, decode_envelope, endpoints, CREDENTIAL_SCHEME};

/// HTTP client for the admin console backend
pub struct HttpConsoleApi {
    client: reqwest::Client,
    base_url: url::Url,
}

#[derive(Serialize)]
struct LogoutBody<'a> {
    token: &'a str,
}

impl HttpConsoleApi {
    /// Create a new client from the `[api]` configuration section
    pub fn new(config: &ApiConfig) -> ConsoleResult<Self> {
        let client = create_http_client(config)?;

        // A trailing slash makes `Url::join` append instead of replacing the last segment
        let normalized = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = url::Url::parse(&normalized).map_err(|e| {
            config_error!(
                format!("Invalid api.base_url '{}': {}", config.base_url, e),
                "create_client",
                e
            )
        })?;

        info!("Created console API client for {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &url::Url {
        &self.base_url
    }

    pub(crate) fn endpoint_url(&self, path: &str) -> ApiResult<url::Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Decode(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Attach the session credential; a missing or unencodable token sends none
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        credential: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let Some(token) = credential else {
            return request;
        };

        match reqwest::header::HeaderValue::from_str(&format!("{} {}", CREDENTIAL_SCHEME, token)) {
            Ok(value) => request.header(reqwest::header::AUTHORIZATION, value),
            Err(e) => {
                warn!("Session token is not a valid header value, sending no credential: {}", e);
                request
            }
        }
    }

    /// Send a request and return the raw body of a successful response
    async fn execute(&self, request: reqwest::RequestBuilder) -> ApiResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            debug!("Backend answered {} for {}", status.as_u16(), url);
            return Err(backend_error(status.as_u16(), &body));
        }

        Ok(body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, credential: Option<&str>) -> ApiResult<T> {
        let url = self.endpoint_url(path)?;
        debug!("GET {}", url);

        let request = self.authorize(self.client.get(url), credential);
        let body = self.execute(request).await?;
        decode_envelope(&body)
    }

    /// GET whose envelope payload is a list that the backend may send as `null`
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: Option<&str>,
    ) -> ApiResult<Vec<T>> {
        let data: Option<Vec<T>> = self.get(path, credential).await?;
        Ok(data.unwrap_or_default())
    }

    /// GET for commands whose payload is irrelevant
    async fn trigger(&self, path: &str, credential: Option<&str>) -> ApiResult<()> {
        let url = self.endpoint_url(path)?;
        debug!("GET {}", url);

        let request = self.authorize(self.client.get(url), credential);
        self.execute(request).await.map(|_| ())
    }

    /// Send a JSON body with `method` and unwrap the envelope of the answer
    async fn send_json<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        credential: Option<&str>,
        body: &B,
    ) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint_url(path)?;
        debug!("{} {}", method, url);

        let request = self.authorize(self.client.request(method, url), credential);
        let body = self.execute(request.json(body)).await?;
        decode_envelope(&body)
    }

    async fn delete(&self, path: &str, credential: Option<&str>) -> ApiResult<()> {
        let url = self.endpoint_url(path)?;
        debug!("DELETE {}", url);

        let request = self.authorize(self.client.delete(url), credential);
        self.execute(request).await.map(|_| ())
    }
}

#[async_trait]
impl ConsoleApi for HttpConsoleApi {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginGrant> {
        let url = self.endpoint_url(endpoints::LOGIN)?;
        debug!("POST {} for {}", url, credentials.username);

        let body = self
            .execute(self.client.post(url).json(credentials))
            .await?;
        decode_envelope(&body)
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        let url = self.endpoint_url(endpoints::LOGOUT)?;
        debug!("POST {}", url);

        let request = self.authorize(self.client.post(url), Some(token));
        self.execute(request.json(&LogoutBody { token }))
            .await
            .map(|_| ())
    }

    async fn get_role(&self, credential: Option<&str>, id: RoleId) -> ApiResult<Role> {
        self.get(&endpoints::role(id), credential).await
    }

    async fn get_all_roles(&self, credential: Option<&str>) -> ApiResult<Vec<Role>> {
        self.get_list(endpoints::ALL_ROLES, credential).await
    }

    async fn get_identity_roles(
        &self,
        credential: Option<&str>,
        identity_id: IdentityId,
    ) -> ApiResult<Vec<IdentityRoleAssignment>> {
        self.get_list(&endpoints::identity_roles(identity_id), credential)
            .await
    }

    async fn get_all_identity_roles(
        &self,
        credential: Option<&str>,
    ) -> ApiResult<Vec<IdentityRoleAssignment>> {
        self.get_list(endpoints::ALL_IDENTITY_ROLES, credential).await
    }

    async fn get_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<Module> {
        self.get(&endpoints::module(id), credential).await
    }

    async fn get_active_modules(&self) -> ApiResult<Vec<Module>> {
        self.get_list(endpoints::ACTIVE_MODULES, None).await
    }

    async fn get_all_modules(&self, credential: Option<&str>) -> ApiResult<Vec<Module>> {
        self.get_list(endpoints::ALL_MODULES, credential).await
    }

    async fn install_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()> {
        self.trigger(&endpoints::install_module(id), credential).await
    }

    async fn uninstall_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()> {
        self.trigger(&endpoints::uninstall_module(id), credential)
            .await
    }

    async fn upgrade_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()> {
        self.trigger(&endpoints::upgrade_module(id), credential).await
    }

    async fn create_identity(
        &self,
        credential: Option<&str>,
        draft: &IdentityDraft,
    ) -> ApiResult<Identity> {
        self.send_json(
            reqwest::Method::POST,
            endpoints::CREATE_IDENTITY,
            credential,
            draft,
        )
        .await
    }

    async fn get_identity(&self, credential: Option<&str>, id: IdentityId) -> ApiResult<Identity> {
        self.get(&endpoints::identity(id), credential).await
    }

    async fn get_all_identities(&self, credential: Option<&str>) -> ApiResult<Vec<Identity>> {
        self.get_list(endpoints::ALL_IDENTITIES, credential).await
    }

    async fn update_identity(
        &self,
        credential: Option<&str>,
        id: IdentityId,
        draft: &IdentityDraft,
    ) -> ApiResult<Identity> {
        self.send_json(
            reqwest::Method::PUT,
            &endpoints::update_identity(id),
            credential,
            draft,
        )
        .await
    }

    async fn delete_identity(&self, credential: Option<&str>, id: IdentityId) -> ApiResult<()> {
        self.delete(&endpoints::delete_identity(id), credential).await
    }

    async fn delete_all_identities(&self, credential: Option<&str>) -> ApiResult<()> {
        self.delete(endpoints::DELETE_ALL_IDENTITIES, credential)
            .await
    }
}
