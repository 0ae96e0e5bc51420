//! Retrieval of raw response bytes from the cost service.
//!
//! Two strategies sit behind [`CostTransport`]: the API server's service proxy
//! and a short-lived port-forward to a backing pod. [`Transport`] picks one
//! from [`Config`] so command code never branches on the strategy.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};

use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use log::{debug, warn};
use reqwest::Url;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::lib::config::{Config, TransportMode};
use crate::lib::error::{Result, TransportError};
use crate::lib::kubernetes::KubernetesLoader;

/// Query string pairs, sent in order
pub type QueryParams = Vec<(&'static str, String)>;

/// Fetches the body of `GET <path>?<params>` from the cost service
pub trait CostTransport {
    fn fetch(
        &self,
        path: &str,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// The configured retrieval strategy
pub enum Transport {
    Proxy(ProxyTransport),
    PortForward(PortForwardTransport),
}

impl Transport {
    pub fn from_config(loader: KubernetesLoader, config: &Config) -> Result<Self> {
        Ok(match config.transport {
            TransportMode::Proxy => Transport::Proxy(ProxyTransport::new(loader.client(), config)),
            TransportMode::PortForward => {
                Transport::PortForward(PortForwardTransport::new(loader, config)?)
            }
        })
    }
}

impl CostTransport for Transport {
    async fn fetch(
        &self,
        path: &str,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        match self {
            Transport::Proxy(t) => t.fetch(path, params, cancel).await,
            Transport::PortForward(t) => t.fetch(path, params, cancel).await,
        }
    }
}

/// Encodes `params` as a URL query string
pub fn encode_query(params: &QueryParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// API server path of the service proxy sub-resource for `path`
pub fn proxy_uri(namespace: &str, service: &str, port: u16, path: &str, params: &QueryParams) -> String {
    let mut uri = format!(
        "/api/v1/namespaces/{}/services/{}:{}/proxy/{}",
        namespace,
        service,
        port,
        path.trim_start_matches('/')
    );
    if !params.is_empty() {
        uri.push('?');
        uri.push_str(&encode_query(params));
    }
    uri
}

/// Reaches the service through `/api/v1/namespaces/{ns}/services/{name}:{port}/proxy`
pub struct ProxyTransport {
    client: Client,
    namespace: String,
    service_name: String,
    service_port: u16,
}

impl ProxyTransport {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            namespace: config.kubecost_namespace.clone(),
            service_name: config.service_name.clone(),
            service_port: config.service_port,
        }
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        let request = http::Request::get(uri)
            .body(Vec::new())
            .map_err(|e| TransportError::Proxy(e.to_string()))?;

        let response = self
            .client
            .send(request.map(kube::client::Body::from))
            .await
            .map_err(|e| TransportError::Proxy(e.to_string()))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect_bytes()
            .await
            .map_err(|e| TransportError::Proxy(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }

        Ok(body.to_vec())
    }
}

impl CostTransport for ProxyTransport {
    async fn fetch(
        &self,
        path: &str,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let uri = proxy_uri(
            &self.namespace,
            &self.service_name,
            self.service_port,
            path,
            params,
        );
        debug!("Proxying GET {}", uri);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled.into()),
            result = self.get(&uri) => result,
        }
    }
}

/// Forwards a local port to a backing pod for the duration of one request
pub struct PortForwardTransport {
    loader: KubernetesLoader,
    namespace: String,
    http: reqwest::Client,
}

impl PortForwardTransport {
    pub fn new(loader: KubernetesLoader, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            loader,
            namespace: config.kubecost_namespace.clone(),
            http,
        })
    }

    async fn fetch_through_tunnel(&self, path: &str, params: &QueryParams) -> Result<Vec<u8>> {
        let backend = self.loader.find_backend_pod().await?;
        let pods: Api<Pod> = Api::namespaced(self.loader.client(), &self.namespace);
        let tunnel = Tunnel::open(pods, backend.name, backend.port).await?;

        let base = Url::parse(&format!("http://{}/", tunnel.local_addr()))
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let result = get_bytes(&self.http, &base, path, params).await;

        tunnel.close().await;
        result
    }
}

impl CostTransport for PortForwardTransport {
    async fn fetch(
        &self,
        path: &str,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        // Dropping the losing branch drops the tunnel, which aborts it.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled.into()),
            result = self.fetch_through_tunnel(path, params) => result,
        }
    }
}

/// Plain HTTP GET of `base/path?params`, returning the body of a 2xx response
pub async fn get_bytes(
    client: &reqwest::Client,
    base: &Url,
    path: &str,
    params: &QueryParams,
) -> Result<Vec<u8>> {
    let mut url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    if !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }
    debug!("GET {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }
        .into());
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    Ok(body.to_vec())
}

/// Local listener whose connections are forwarded to a pod port.
///
/// The accept loop and every forwarded connection live in one task; aborting
/// it (on [`Tunnel::close`] or drop) tears all of them down.
struct Tunnel {
    local_addr: SocketAddr,
    task: Option<JoinHandle<()>>,
}

impl Tunnel {
    async fn open(pods: Api<Pod>, pod_name: String, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| TransportError::PortForward(format!("failed to bind local port: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::PortForward(e.to_string()))?;
        debug!("Forwarding {} to pod {} port {}", local_addr, pod_name, port);

        let task = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                match listener.accept().await {
                    Ok((conn, _)) => {
                        let pods = pods.clone();
                        let pod_name = pod_name.clone();
                        connections.spawn(async move {
                            if let Err(e) = forward_connection(&pods, &pod_name, port, conn).await {
                                warn!("Port forward connection failed: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept local connection: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            task: Some(task),
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        debug!("Closed port forward on {}", self.local_addr);
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn forward_connection(
    pods: &Api<Pod>,
    pod_name: &str,
    port: u16,
    mut conn: TcpStream,
) -> std::result::Result<(), TransportError> {
    let mut forwarder = pods
        .portforward(pod_name, &[port])
        .await
        .map_err(|e| TransportError::PortForward(e.to_string()))?;
    let mut upstream = forwarder
        .take_stream(port)
        .ok_or_else(|| TransportError::PortForward(format!("port {port} not found in forwarder")))?;

    tokio::io::copy_bidirectional(&mut conn, &mut upstream)
        .await
        .map_err(|e| TransportError::PortForward(e.to_string()))?;

    drop(upstream);
    forwarder
        .join()
        .await
        .map_err(|e| TransportError::PortForward(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CostError;
    use mockito::Matcher;

    fn params() -> QueryParams {
        vec![
            ("window", "7d".to_string()),
            ("accumulate", "true".to_string()),
        ]
    }

    #[test]
    fn proxy_uri_targets_service_proxy_subresource() {
        assert_eq!(
            proxy_uri("kubecost", "kubecost-cost-analyzer", 9090, "/model/allocation", &params()),
            "/api/v1/namespaces/kubecost/services/kubecost-cost-analyzer:9090/proxy/model/allocation?window=7d&accumulate=true"
        );
        assert_eq!(
            proxy_uri("kc", "svc", 80, "model/allocation", &Vec::new()),
            "/api/v1/namespaces/kc/services/svc:80/proxy/model/allocation"
        );
    }

    #[test]
    fn query_values_are_encoded() {
        let params: QueryParams = vec![("window", "2024-03-01T00:00:00Z,2024-03-02T00:00:00Z".to_string())];
        assert_eq!(
            encode_query(&params),
            "window=2024-03-01T00%3A00%3A00Z%2C2024-03-02T00%3A00%3A00Z"
        );
    }

    #[tokio::test]
    async fn get_bytes_returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/model/allocation")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("window".into(), "7d".into()),
                Matcher::UrlEncoded("accumulate".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"code":200,"data":[]}"#)
            .create_async()
            .await;

        let base = Url::parse(&format!("{}/", server.url())).unwrap();
        let body = get_bytes(&reqwest::Client::new(), &base, "/model/allocation", &params())
            .await
            .unwrap();

        assert_eq!(body, br#"{"code":200,"data":[]}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_bytes_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/model/allocation")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let base = Url::parse(&format!("{}/", server.url())).unwrap();
        let err = get_bytes(&reqwest::Client::new(), &base, "model/allocation", &params())
            .await
            .unwrap_err();

        match err {
            CostError::Transport(TransportError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_bytes_reports_connection_failures() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        let err = get_bytes(&reqwest::Client::new(), &base, "model/allocation", &params())
            .await
            .unwrap_err();

        assert!(matches!(err, CostError::Transport(TransportError::Connection(_))));
    }

    fn proxy_transport(server_url: &str) -> ProxyTransport {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let uri: http::Uri = server_url.parse().unwrap();
        let client = Client::try_from(kube::Config::new(uri)).unwrap();
        ProxyTransport::new(client, &Config::default())
    }

    #[tokio::test]
    async fn proxy_fetch_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/api/v1/namespaces/kubecost/services/kubecost-cost-analyzer:9090/proxy/model/allocation",
            )
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let transport = proxy_transport(&server.url());
        let err = transport
            .fetch("/model/allocation", &params(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            CostError::Transport(TransportError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn proxy_fetch_aborts_when_cancelled_in_flight() {
        // bound but never accepted, so the request hangs until cancelled
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let transport = proxy_transport(&format!("http://{addr}"));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = transport
            .fetch("/model/allocation", &params(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CostError::Transport(TransportError::Cancelled)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        drop(listener);
    }
}
