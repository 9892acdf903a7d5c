// crates/netconf-wbem/src/client.rs
// ============================================================================
// Module: WBEM Client
// Description: CIM-XML over HTTP(S) or a local Unix socket.
// Purpose: Run intrinsic and extrinsic CIM operations against a CIMOM.
// Dependencies: reqwest, hyper, hyper-util, http-body-util, base64, url
// ============================================================================

//! ## Overview
//! [`WbemConnection`] speaks DSP0200 CIM operations over HTTP. Remote targets
//! (`http://`, `https://`) go through reqwest; the special targets
//! `local://pegasus` and `local://sfcbd` post HTTP/1.1 over the broker's Unix
//! socket with hyper.
//!
//! Security posture: CIMOM responses are untrusted; bodies are size limited
//! and credentials never appear in `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::Full;
use http_body_util::Limited;
use hyper_util::rt::TokioIo;
use reqwest::Client;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use tokio::net::UnixStream;
use url::Url;

use crate::codec::IParam;
use crate::codec::decode_class_names;
use crate::codec::decode_imethod_response;
use crate::codec::decode_instance;
use crate::codec::decode_instance_name;
use crate::codec::decode_instance_names;
use crate::codec::decode_method_response;
use crate::codec::decode_objects;
use crate::codec::imethod_request;
use crate::codec::method_request;
use crate::error::WbemError;
use crate::model::CimInstance;
use crate::model::CimInstanceName;
use crate::model::CimValue;
use crate::model::MethodResult;
use crate::xml::XmlElement;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Namespace used when an operation does not name one.
pub const DEFAULT_NAMESPACE: &str = "root/cimv2";
/// Unix socket of a local OpenPegasus broker.
pub const PEGASUS_SOCKET: &str = "/var/run/tog-pegasus/cimxml.socket";
/// Unix socket of a local sfcb broker.
pub const SFCB_SOCKET: &str = "/tmp/sfcbHttpSocket";
/// Request path used for CIM operations.
const CIMOM_PATH: &str = "/cimom";
/// Maximum response body accepted from a CIMOM.
const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Content type of CIM-XML requests.
const CONTENT_TYPE_XML: &str = "application/xml; charset=\"utf-8\"";

// ============================================================================
// SECTION: Targets
// ============================================================================

/// Where CIM operations are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// HTTP or HTTPS endpoint including the `/cimom` path.
    Http(String),
    /// HTTP over a local Unix socket.
    Unix(PathBuf),
}

impl Target {
    /// Parses a CIMOM URL.
    ///
    /// Ports default to 5988 for `http` and 5989 for `https`.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Target`] for unknown schemes or local targets.
    pub fn parse(raw: &str) -> Result<Self, WbemError> {
        if let Some(local) = raw.strip_prefix("local://") {
            return match local {
                "pegasus" => Ok(Self::Unix(PathBuf::from(PEGASUS_SOCKET))),
                "sfcbd" | "sfcb" => Ok(Self::Unix(PathBuf::from(SFCB_SOCKET))),
                path if path.starts_with('/') => Ok(Self::Unix(PathBuf::from(path))),
                other => Err(WbemError::Target(format!("unknown local broker '{other}'"))),
            };
        }
        let url = Url::parse(raw).map_err(|err| WbemError::Target(format!("{raw}: {err}")))?;
        let default_port = match url.scheme() {
            "http" => 5988,
            "https" => 5989,
            other => return Err(WbemError::Target(format!("unsupported scheme '{other}'"))),
        };
        let host = url.host_str().ok_or_else(|| WbemError::Target(format!("{raw}: no host")))?;
        let port = url.port().unwrap_or(default_port);
        Ok(Self::Http(format!("{}://{host}:{port}{CIMOM_PATH}", url.scheme())))
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Connection settings.
#[derive(Clone)]
pub struct ConnectionOptions {
    /// CIMOM URL or `local://` target.
    pub url: String,
    /// User name; empty disables authentication.
    pub username: String,
    /// Password.
    pub password: String,
    /// Default namespace for operations.
    pub namespace: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept self-signed CIMOM certificates.
    pub accept_invalid_certs: bool,
}

impl ConnectionOptions {
    /// Creates options with the default namespace and timeout.
    #[must_use]
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: true,
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Filters of association traversal operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssocFilter {
    /// Association class to traverse.
    pub assoc_class: Option<String>,
    /// Class of the returned objects.
    pub result_class: Option<String>,
    /// Role of the source object in the association.
    pub role: Option<String>,
    /// Role of the returned objects in the association.
    pub result_role: Option<String>,
}

impl AssocFilter {
    /// Filter on an association class.
    #[must_use]
    pub fn assoc(assoc_class: &str) -> Self {
        Self {
            assoc_class: Some(assoc_class.to_string()),
            ..Self::default()
        }
    }

    /// Filter on a result class.
    #[must_use]
    pub fn result(result_class: &str) -> Self {
        Self {
            result_class: Some(result_class.to_string()),
            ..Self::default()
        }
    }

    /// Adds a result class.
    #[must_use]
    pub fn result_class(mut self, result_class: &str) -> Self {
        self.result_class = Some(result_class.to_string());
        self
    }

    /// Adds a source role.
    #[must_use]
    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Adds a result role.
    #[must_use]
    pub fn result_role(mut self, result_role: &str) -> Self {
        self.result_role = Some(result_role.to_string());
        self
    }

    /// Appends the filter parameters for associator style operations.
    fn push_params(&self, params: &mut Vec<(&'static str, IParam)>, with_assoc: bool) {
        if with_assoc && let Some(assoc) = &self.assoc_class {
            params.push(("AssocClass", IParam::ClassName(assoc.clone())));
        }
        if let Some(result) = &self.result_class {
            params.push(("ResultClass", IParam::ClassName(result.clone())));
        }
        if let Some(role) = &self.role {
            params.push(("Role", IParam::Value(role.clone())));
        }
        if with_assoc && let Some(result_role) = &self.result_role {
            params.push(("ResultRole", IParam::Value(result_role.clone())));
        }
    }
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Transport behind a connection.
enum Transport {
    /// reqwest client posting to an HTTP(S) endpoint.
    Http {
        /// Shared client.
        client: Client,
        /// Endpoint URL.
        endpoint: String,
    },
    /// hyper HTTP/1.1 over a Unix socket.
    Unix {
        /// Socket path.
        socket: PathBuf,
        /// Request timeout.
        timeout: Duration,
    },
}

/// A CIM-XML connection to one CIMOM.
pub struct WbemConnection {
    /// Request transport.
    transport: Transport,
    /// Precomputed `Authorization` header value.
    authorization: Option<String>,
    /// Default namespace.
    namespace: String,
    /// Next `MESSAGE ID`.
    next_id: AtomicU64,
}

impl fmt::Debug for WbemConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.transport {
            Transport::Http {
                endpoint, ..
            } => endpoint.clone(),
            Transport::Unix {
                socket, ..
            } => socket.display().to_string(),
        };
        f.debug_struct("WbemConnection")
            .field("target", &target)
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl WbemConnection {
    /// Creates a connection. No request is sent until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] when the target is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(options: &ConnectionOptions) -> Result<Self, WbemError> {
        let transport = match Target::parse(&options.url)? {
            Target::Http(endpoint) => {
                let client = Client::builder()
                    .timeout(options.timeout)
                    .redirect(Policy::none())
                    .danger_accept_invalid_certs(options.accept_invalid_certs)
                    .build()
                    .map_err(|err| WbemError::Transport(err.to_string()))?;
                Transport::Http {
                    client,
                    endpoint,
                }
            }
            Target::Unix(socket) => Transport::Unix {
                socket,
                timeout: options.timeout,
            },
        };
        let authorization = (!options.username.is_empty()).then(|| {
            let token = STANDARD.encode(format!("{}:{}", options.username, options.password));
            format!("Basic {token}")
        });
        Ok(Self {
            transport,
            authorization,
            namespace: options.namespace.clone(),
            next_id: AtomicU64::new(1001),
        })
    }

    /// Returns the default namespace.
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.namespace
    }

    // ------------------------------------------------------------------------
    // Intrinsic operations
    // ------------------------------------------------------------------------

    /// Enumerates instances of a class and its subclasses.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn enumerate_instances(
        &self,
        classname: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let namespace = namespace.unwrap_or(&self.namespace);
        let params = vec![
            ("ClassName", IParam::ClassName(classname.to_string())),
            ("LocalOnly", IParam::Bool(false)),
        ];
        let result = self.imethod("EnumerateInstances", namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_objects(&value, namespace))
    }

    /// Enumerates instance names of a class and its subclasses.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn enumerate_instance_names(
        &self,
        classname: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CimInstanceName>, WbemError> {
        let namespace = namespace.unwrap_or(&self.namespace);
        let params = vec![("ClassName", IParam::ClassName(classname.to_string()))];
        let result = self.imethod("EnumerateInstanceNames", namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_instance_names(&value, namespace))
    }

    /// Fetches one instance; the returned instance carries `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn get_instance(&self, path: &CimInstanceName) -> Result<CimInstance, WbemError> {
        let namespace = self.namespace_of(path);
        let params = vec![
            ("InstanceName", IParam::InstanceName(path.clone())),
            ("LocalOnly", IParam::Bool(false)),
        ];
        let result = self.imethod("GetInstance", &namespace, &params).await?;
        let value = result.ok_or_else(|| missing("GetInstance"))?;
        let mut instance = decode_instance(value.require("INSTANCE")?)?;
        let mut path = path.clone();
        path.namespace = Some(namespace);
        instance.path = Some(path);
        Ok(instance)
    }

    /// Replaces the properties of an existing instance.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] when the instance has no path or the operation fails.
    pub async fn modify_instance(&self, instance: &CimInstance) -> Result<(), WbemError> {
        let namespace = self.namespace_of(instance.require_path()?);
        let params = vec![("ModifiedInstance", IParam::NamedInstance(instance.clone()))];
        self.imethod("ModifyInstance", &namespace, &params).await?;
        Ok(())
    }

    /// Creates an instance and returns its path.
    ///
    /// The namespace is taken from `namespace`, then the instance path, then
    /// the connection default.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn create_instance(
        &self,
        instance: &CimInstance,
        namespace: Option<&str>,
    ) -> Result<CimInstanceName, WbemError> {
        let namespace = namespace.map_or_else(
            || instance.path.as_ref().map_or_else(|| self.namespace.clone(), |p| self.namespace_of(p)),
            str::to_string,
        );
        let params = vec![("NewInstance", IParam::Instance(instance.clone()))];
        let result = self.imethod("CreateInstance", &namespace, &params).await?;
        let value = result.ok_or_else(|| missing("CreateInstance"))?;
        let mut path = decode_instance_name(value.require("INSTANCENAME")?)?;
        path.namespace = Some(namespace);
        Ok(path)
    }

    /// Deletes an instance.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn delete_instance(&self, path: &CimInstanceName) -> Result<(), WbemError> {
        let namespace = self.namespace_of(path);
        let params = vec![("InstanceName", IParam::InstanceName(path.clone()))];
        self.imethod("DeleteInstance", &namespace, &params).await?;
        Ok(())
    }

    /// Returns instances associated with `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn associators(
        &self,
        path: &CimInstanceName,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let namespace = self.namespace_of(path);
        let mut params = vec![("ObjectName", IParam::InstanceName(path.clone()))];
        filter.push_params(&mut params, true);
        let result = self.imethod("Associators", &namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_objects(&value, &namespace))
    }

    /// Returns paths of instances associated with `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn associator_names(
        &self,
        path: &CimInstanceName,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstanceName>, WbemError> {
        let namespace = self.namespace_of(path);
        let mut params = vec![("ObjectName", IParam::InstanceName(path.clone()))];
        filter.push_params(&mut params, true);
        let result = self.imethod("AssociatorNames", &namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_instance_names(&value, &namespace))
    }

    /// Returns association instances referring to `path`.
    ///
    /// Only `result_class` and `role` of the filter apply.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn references(
        &self,
        path: &CimInstanceName,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let namespace = self.namespace_of(path);
        let mut params = vec![("ObjectName", IParam::InstanceName(path.clone()))];
        filter.push_params(&mut params, false);
        let result = self.imethod("References", &namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_objects(&value, &namespace))
    }

    /// Runs a query (for example `WQL`).
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn exec_query(
        &self,
        query_language: &str,
        query: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let namespace = namespace.unwrap_or(&self.namespace);
        let params = vec![
            ("QueryLanguage", IParam::Value(query_language.to_string())),
            ("Query", IParam::Value(query.to_string())),
        ];
        let result = self.imethod("ExecQuery", namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_objects(&value, namespace))
    }

    /// Lists class names, optionally below `classname`.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn enumerate_class_names(
        &self,
        classname: Option<&str>,
        deep: bool,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, WbemError> {
        let namespace = namespace.unwrap_or(&self.namespace);
        let mut params = Vec::new();
        if let Some(classname) = classname {
            params.push(("ClassName", IParam::ClassName(classname.to_string())));
        }
        params.push(("DeepInheritance", IParam::Bool(deep)));
        let result = self.imethod("EnumerateClassNames", namespace, &params).await?;
        result.map_or_else(|| Ok(Vec::new()), |value| decode_class_names(&value))
    }

    // ------------------------------------------------------------------------
    // Extrinsic operations
    // ------------------------------------------------------------------------

    /// Invokes an extrinsic method on an instance.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError`] on transport, protocol, or CIM failures.
    pub async fn invoke_method(
        &self,
        method: &str,
        path: &CimInstanceName,
        params: &[(&str, CimValue)],
    ) -> Result<MethodResult, WbemError> {
        let mut target = path.clone();
        target.namespace = Some(self.namespace_of(path));
        target.host = None;
        let id = self.message_id();
        let body = method_request(id, method, &target, &self.namespace, params)?;
        let response = self.post(method, &target.to_string(), body).await?;
        decode_method_response(&response)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Runs an intrinsic method and returns `IRETURNVALUE`.
    async fn imethod(
        &self,
        method: &str,
        namespace: &str,
        params: &[(&str, IParam)],
    ) -> Result<Option<XmlElement>, WbemError> {
        let body = imethod_request(self.message_id(), method, namespace, params)?;
        let response = self.post(method, namespace, body).await?;
        decode_imethod_response(&response)
    }

    /// Returns the namespace of a path or the default.
    fn namespace_of(&self, path: &CimInstanceName) -> String {
        path.namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or(&self.namespace)
            .to_string()
    }

    /// Allocates the next `MESSAGE ID`.
    fn message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Posts a request and returns the response body.
    async fn post(&self, method: &str, object: &str, body: String) -> Result<String, WbemError> {
        let headers = self.headers(method, object)?;
        let (status, cim_error, bytes) = match &self.transport {
            Transport::Http {
                client,
                endpoint,
            } => post_http(client, endpoint, headers, body).await?,
            Transport::Unix {
                socket,
                timeout,
            } => tokio::time::timeout(*timeout, post_unix(socket, headers, body))
                .await
                .map_err(|_| WbemError::Timeout(format!("{method} timed out")))??,
        };
        if let Some(cim_error) = cim_error {
            return Err(WbemError::Http(format!("status {status}, CIMError: {cim_error}")));
        }
        if status != 200 {
            return Err(WbemError::Http(format!("status {status} for {method}")));
        }
        String::from_utf8(bytes).map_err(|_| WbemError::Protocol("response is not utf-8".to_string()))
    }

    /// Builds CIM operation headers.
    fn headers(&self, method: &str, object: &str) -> Result<HeaderMap, WbemError> {
        let mut headers = HeaderMap::new();
        let pairs = [
            ("content-type", CONTENT_TYPE_XML.to_string()),
            ("cimoperation", "MethodCall".to_string()),
            ("cimmethod", percent_encode(method)),
            ("cimobject", percent_encode(object)),
        ];
        for (name, value) in pairs {
            let value = HeaderValue::from_str(&value)
                .map_err(|_| WbemError::Protocol(format!("invalid {name} header")))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        if let Some(authorization) = &self.authorization {
            let value = HeaderValue::from_str(authorization)
                .map_err(|_| WbemError::Protocol("invalid credentials header".to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

// ============================================================================
// SECTION: Transports
// ============================================================================

/// Response status, `CIMError` header, and body.
type RawResponse = (u16, Option<String>, Vec<u8>);

/// Posts over reqwest.
async fn post_http(
    client: &Client,
    endpoint: &str,
    headers: HeaderMap,
    body: String,
) -> Result<RawResponse, WbemError> {
    let mut response = client
        .post(endpoint)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| WbemError::Transport(err.to_string()))?;
    let status = response.status().as_u16();
    let cim_error = cim_error_header(response.headers());
    let mut bytes = Vec::new();
    while let Some(chunk) =
        response.chunk().await.map_err(|err| WbemError::Transport(err.to_string()))?
    {
        if bytes.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(WbemError::Transport("response exceeds size limit".to_string()));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok((status, cim_error, bytes))
}

/// Posts HTTP/1.1 over a Unix socket.
async fn post_unix(
    socket: &Path,
    headers: HeaderMap,
    body: String,
) -> Result<RawResponse, WbemError> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|err| WbemError::Transport(format!("{}: {err}", socket.display())))?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|err| WbemError::Transport(err.to_string()))?;
    let driver = tokio::spawn(connection);

    let mut builder = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(CIMOM_PATH)
        .header(hyper::header::HOST, "localhost");
    for (name, value) in &headers {
        builder = builder.header(name, value);
    }
    let request = builder
        .body(Full::new(Bytes::from(body)))
        .map_err(|err| WbemError::Transport(err.to_string()))?;
    let response =
        sender.send_request(request).await.map_err(|err| WbemError::Transport(err.to_string()))?;
    let status = response.status().as_u16();
    let cim_error = cim_error_header(response.headers());
    let collected = Limited::new(response.into_body(), MAX_RESPONSE_BYTES)
        .collect()
        .await
        .map_err(|err| WbemError::Transport(err.to_string()))?;
    driver.abort();
    Ok((status, cim_error, collected.to_bytes().to_vec()))
}

/// Reads the `CIMError` response header.
fn cim_error_header(headers: &HeaderMap) -> Option<String> {
    headers.get("cimerror").and_then(|value| value.to_str().ok()).map(str::to_string)
}

/// Builds the error for an operation that returned nothing.
fn missing(method: &str) -> WbemError {
    WbemError::Protocol(format!("{method} returned no IRETURNVALUE"))
}

/// Percent-encodes a header value, keeping unreserved characters and `/`.
pub(crate) fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
