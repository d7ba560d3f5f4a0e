//! Redirect and intercept against live upstream servers.

use hyper::{StatusCode, Uri};
use url::Url;

use stubserve::config::{build_router, parse_config};
use stubserve::http::middleware::redirect;
use stubserve::http::{Request, Response};
use stubserve::routing::Router;
use stubserve::MockServer;

mod common;

fn to_upstream(upstream: &MockServer) -> impl Fn(&Request) -> stubserve::Result<Request> + Send + Sync + 'static {
    let base = Url::parse(&upstream.url("/").unwrap()).unwrap();
    move |req: &Request| {
        req.clone()
            .redirected_to(&base)?
            .with_header("custom-request-header", "custom-request-header-value")
    }
}

#[tokio::test]
async fn intercept_rewrites_upstream_response() {
    let upstream = common::start_echo_upstream();
    let proxy = common::start_server(redirect(to_upstream(&upstream)).intercept(
        |res: &mut Response| {
            let original: serde_json::Value = res
                .body()
                .and_then(|body| serde_json::from_slice(body).ok())
                .unwrap_or_default();
            res.set_status(StatusCode::CREATED);
            let _ = res.set_header("custom-response-header", "custom-response-header-value");
            res.set_body(serde_json::json!({ "response": original }).to_string());
        },
    ));

    let res = common::client()
        .post(proxy.url("/post?query=value").unwrap())
        .header("content-type", "text/html; charset=utf-8")
        .body("Hello world!")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get("content-encoding").is_none());
    assert_eq!(
        res.headers()["custom-response-header"],
        "custom-response-header-value"
    );

    let json: serde_json::Value = res.json().await.unwrap();
    let echoed = &json["response"];
    let upstream_addr = upstream.local_addr().unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(
        echoed["url"],
        format!("http://{upstream_addr}/post?query=value")
    );
    assert_eq!(echoed["data"], "Hello world!");
    assert_eq!(echoed["headers"]["host"], upstream_addr.to_string());
    assert_eq!(
        echoed["headers"]["custom-request-header"],
        "custom-request-header-value"
    );
    assert_eq!(
        echoed["headers"]["content-type"],
        "text/html; charset=utf-8"
    );
}

#[tokio::test]
async fn rewritten_body_reaches_upstream_whole() {
    let upstream = common::start_echo_upstream();
    let base = Url::parse(&upstream.url("/").unwrap()).unwrap();
    let proxy = common::start_server(redirect(move |req: &Request| {
        Ok(req
            .clone()
            .redirected_to(&base)?
            .with_body("a much longer replacement body"))
    }));

    let json: serde_json::Value = common::client()
        .post(proxy.url("/post").unwrap())
        .body("hi")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["data"], "a much longer replacement body");
    assert_eq!(json["headers"]["content-length"], "30");
}

#[tokio::test]
async fn plain_redirect_copies_status_and_body() {
    let backend = common::start_fixed_backend("from backend").await;
    let base = Url::parse(&format!("http://{backend}")).unwrap();
    let proxy = common::start_server(redirect(move |req: &Request| req.clone().redirected_to(&base)));

    let res = common::client()
        .get(proxy.url("/whatever").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "from backend");
}

#[tokio::test]
async fn unreachable_upstream_falls_through_to_not_found() {
    let dead = common::unused_addr();
    let proxy = common::start_server(Router::new().route(redirect(move |req: &Request| {
        let uri: Uri = format!("http://{dead}{}", req.uri()).parse()?;
        Ok(req.clone().with_uri(uri))
    })));

    let res = common::client()
        .get(proxy.url("/missing").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Not Found");
}

#[tokio::test]
async fn configured_redirect_runs_after_stubs() {
    let upstream = common::start_echo_upstream();
    let config = parse_config(&format!(
        r#"
        [[stubs]]
        name = "health"
        path = "/health"
        body = "stubbed"

        [[redirects]]
        name = "api"
        path = "/api"
        upstream = "{}"
        headers = {{ x-forwarded-by = "stubserve" }}
        "#,
        upstream.url("/v2").unwrap()
    ))
    .unwrap();
    let proxy = common::start_server(build_router(&config).unwrap());
    let client = common::client();

    let res = client.get(proxy.url("/health").unwrap()).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "stubbed");

    let json: serde_json::Value = client
        .get(proxy.url("/api/users?id=1").unwrap())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        json["url"],
        format!("http://{}/v2/api/users?id=1", upstream.local_addr().unwrap())
    );
    assert_eq!(json["headers"]["x-forwarded-by"], "stubserve");

    let res = client.get(proxy.url("/elsewhere").unwrap()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
