//! Image endpoints
//!
//! Listing, building, pushing, tagging, importing, exporting and removing
//! images.

use bytes::Bytes;
use futures_util::Stream;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::io;
use tracing::debug;

use crate::api::models::{Filters, ImageDeleted, ImageSummary, Platform};
use crate::client::auth::{
    encode_anonymous, RegistryAuth, RegistryConfig, RegistryCredential, REGISTRY_AUTH_HEADER,
    REGISTRY_CONFIG_HEADER,
};
use crate::client::socket::DockerSocket;
use crate::connection::request::{ApiRequest, ByteStream, Query, QueryValue, RequestBody};
use crate::connection::stream::LiveStream;
use crate::error::Result;

/// Options for `GET /images/json`
#[derive(Debug, Clone, Default)]
pub struct ListImagesOptions {
    /// Include intermediate images
    pub all: bool,
    pub filters: Filters,
    pub shared_size: bool,
    pub digests: bool,
    pub manifests: bool,
}

/// Builder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuilderVersion {
    /// Classic builder
    #[default]
    V1,
    /// BuildKit
    V2,
}

impl BuilderVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            BuilderVersion::V1 => "1",
            BuilderVersion::V2 => "2",
        }
    }
}

/// Options for `POST /build`
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Path of the Dockerfile inside the context
    pub dockerfile: String,
    /// `name:tag` references applied to the result
    pub tags: Vec<String>,
    pub extra_hosts: Option<String>,
    pub remote: Option<String>,
    pub quiet: bool,
    pub no_cache: bool,
    pub cache_from: Vec<String>,
    pub pull: Option<String>,
    /// Remove intermediate containers after a successful build
    pub rm: bool,
    pub force_rm: bool,
    pub memory: Option<u64>,
    pub memswap: Option<i64>,
    pub cpu_shares: Option<u64>,
    pub cpuset_cpus: Option<String>,
    pub cpu_period: Option<u64>,
    pub cpu_quota: Option<u64>,
    pub build_args: BTreeMap<String, String>,
    pub shm_size: Option<u64>,
    pub squash: Option<bool>,
    pub labels: BTreeMap<String, String>,
    pub network_mode: Option<String>,
    pub platform: Option<String>,
    pub target: Option<String>,
    pub outputs: Option<String>,
    pub version: BuilderVersion,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dockerfile: "Dockerfile".to_string(),
            tags: Vec::new(),
            extra_hosts: None,
            remote: None,
            quiet: false,
            no_cache: false,
            cache_from: Vec::new(),
            pull: None,
            rm: true,
            force_rm: false,
            memory: None,
            memswap: None,
            cpu_shares: None,
            cpuset_cpus: None,
            cpu_period: None,
            cpu_quota: None,
            build_args: BTreeMap::new(),
            shm_size: None,
            squash: None,
            labels: BTreeMap::new(),
            network_mode: None,
            platform: None,
            target: None,
            outputs: None,
            version: BuilderVersion::V1,
        }
    }
}

impl BuildOptions {
    pub fn query(&self) -> Result<Query> {
        let query = Query::new()
            .set("dockerfile", self.dockerfile.as_str())
            .list("t", self.tags.iter().cloned())
            .opt("extrahosts", self.extra_hosts.as_deref())
            .opt("remote", self.remote.as_deref())
            .flag("q", self.quiet)
            .flag("nocache", self.no_cache)
            .opt_json("cachefrom", non_empty(&self.cache_from))?
            .opt("pull", self.pull.as_deref())
            .flag("rm", self.rm)
            .flag("forcerm", self.force_rm)
            .opt("memory", self.memory)
            .opt("memswap", self.memswap)
            .opt("cpushares", self.cpu_shares)
            .opt("cpusetcpus", self.cpuset_cpus.as_deref())
            .opt("cpuperiod", self.cpu_period)
            .opt("cpuquota", self.cpu_quota)
            .opt_json("buildargs", non_empty_map(&self.build_args))?
            .opt("shmsize", self.shm_size)
            .opt("squash", self.squash)
            .opt_json("labels", non_empty_map(&self.labels))?
            .opt("networkmode", self.network_mode.as_deref())
            .opt("platform", self.platform.as_deref())
            .opt("target", self.target.as_deref())
            .opt("outputs", self.outputs.as_deref())
            .set("version", self.version.as_str());
        Ok(query)
    }
}

fn non_empty<T>(values: &Vec<T>) -> Option<&Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn non_empty_map(map: &BTreeMap<String, String>) -> Option<&BTreeMap<String, String>> {
    (!map.is_empty()).then_some(map)
}

/// Options for `DELETE /images/{name}`
#[derive(Debug, Clone, Default)]
pub struct RemoveImageOptions {
    pub force: bool,
    pub no_prune: bool,
    pub platforms: Vec<Platform>,
}

/// Options for `POST /images/{name}/push`
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub tag: String,
    pub platform: Option<Platform>,
    pub auth: Option<RegistryAuth>,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            tag: "latest".to_string(),
            platform: None,
            auth: None,
        }
    }
}

/// Options for `POST /images/create`
#[derive(Debug, Clone, Default)]
pub struct CreateImageOptions {
    /// Image to pull
    pub from_image: Option<String>,
    /// Source to import; `-` reads the request body
    pub from_src: Option<String>,
    pub repo: Option<String>,
    pub tag: Option<String>,
    /// Commit message of an imported image
    pub message: Option<String>,
    /// Dockerfile instructions applied on import, e.g. `ENV DEBUG=true`
    pub changes: Vec<String>,
    pub platform: Option<String>,
    pub auth: Option<RegistryAuth>,
}

impl CreateImageOptions {
    /// Pull `image:tag`
    pub fn pull(image: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            from_image: Some(image.into()),
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn query(&self) -> Query {
        Query::new()
            .set("fromImage", self.from_image.clone())
            .set("fromSrc", self.from_src.clone())
            .set("repo", self.repo.clone())
            .set("tag", self.tag.clone())
            .set("message", self.message.clone())
            .set(
                "changes",
                if self.changes.is_empty() {
                    QueryValue::Absent
                } else {
                    QueryValue::List(self.changes.clone())
                },
            )
            .set("platform", self.platform.clone())
    }
}

/// Request body of an image import
pub enum ImageSource {
    /// URL the daemon fetches the image from
    Url(String),
    /// Image archive piped from the caller
    Stream(ByteStream),
}

impl ImageSource {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        ImageSource::Stream(Box::pin(stream))
    }

    fn content_type(&self) -> &'static str {
        match self {
            ImageSource::Url(_) => "text/plain",
            ImageSource::Stream(_) => "application/octet-stream",
        }
    }

    fn into_body(self) -> RequestBody {
        match self {
            ImageSource::Url(url) => RequestBody::from(url),
            ImageSource::Stream(stream) => RequestBody::Stream(stream),
        }
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Url(url) => write!(f, "Url({url})"),
            ImageSource::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Image endpoints bound to a client
#[derive(Debug, Clone, Copy)]
pub struct ImagesApi<'a> {
    socket: &'a DockerSocket,
}

impl<'a> ImagesApi<'a> {
    pub fn new(socket: &'a DockerSocket) -> Self {
        Self { socket }
    }

    pub async fn list(&self, options: &ListImagesOptions) -> Result<Vec<ImageSummary>> {
        let query = Query::new()
            .flag("all", options.all)
            .json("filters", &options.filters)?
            .flag("shared-size", options.shared_size)
            .flag("digests", options.digests)
            .flag("manifests", options.manifests);

        self.socket
            .api_call(ApiRequest::get("/images/json").query(query))
            .await
    }

    /// Build an image from a tar context.
    ///
    /// The context is streamed as it is read. Progress records arrive on the
    /// returned stream; decode it with [`LiveStream::json_lines`].
    pub async fn build<S>(
        &self,
        context: S,
        credentials: &[RegistryCredential],
        options: &BuildOptions,
    ) -> Result<LiveStream>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let mut request = ApiRequest::post("/build")
            .query(options.query()?)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/x-tar"))
            .body(RequestBody::stream(context));

        if !credentials.is_empty() {
            let config: RegistryConfig = credentials.iter().cloned().collect();
            debug!(registries = config.len(), "Attaching registry config to build");
            request = request.try_header(REGISTRY_CONFIG_HEADER, &config.encode()?)?;
        }

        self.socket.stream(request).await
    }

    pub async fn remove(
        &self,
        name: &str,
        options: &RemoveImageOptions,
    ) -> Result<Vec<ImageDeleted>> {
        let query = Query::new()
            .flag("force", options.force)
            .flag("noprune", options.no_prune)
            .opt_json("platforms", non_empty(&options.platforms))?;

        self.socket
            .api_call(ApiRequest::delete(format!("/images/{name}")).query(query))
            .await
    }

    /// Push an image to its registry, returning the progress output
    pub async fn push(&self, name: &str, options: &PushOptions) -> Result<String> {
        let query = Query::new()
            .set("tag", options.tag.as_str())
            .opt_json("platform", options.platform.as_ref())?;
        let auth = match &options.auth {
            Some(auth) => auth.encode()?,
            None => encode_anonymous(),
        };

        let request = ApiRequest::post(format!("/images/{name}/push"))
            .query(query)
            .try_header(REGISTRY_AUTH_HEADER, &auth)?;
        self.socket.api_text(request).await
    }

    /// Export an image and its history as a tarball.
    ///
    /// The archive is handed back as raw chunks while the daemon writes it.
    pub async fn export(&self, name: &str) -> Result<LiveStream> {
        debug!(image = %name, "Exporting image");
        self.socket
            .stream(ApiRequest::get(format!("/images/{name}/get")))
            .await
    }

    /// Add a `repo:tag` reference to an image; the tag defaults to `latest`
    pub async fn tag(&self, name: &str, repo: &str, tag: Option<&str>) -> Result<()> {
        let query = Query::new()
            .set("repo", repo)
            .set("tag", tag.unwrap_or("latest"));
        self.socket
            .api_unit(ApiRequest::post(format!("/images/{name}/tag")).query(query))
            .await
    }

    /// Pull or import an image, returning the progress output
    pub async fn create(
        &self,
        options: &CreateImageOptions,
        source: Option<ImageSource>,
    ) -> Result<String> {
        let mut request = ApiRequest::post("/images/create").query(options.query());

        if let Some(auth) = &options.auth {
            request = request.try_header(REGISTRY_AUTH_HEADER, &auth.encode()?)?;
        }
        if let Some(source) = source {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static(source.content_type()))
                .body(source.into_body());
        }

        self.socket.api_text(request).await
    }
}
