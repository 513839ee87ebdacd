use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bastion::{
    BoxedHandler, CORS_ALLOW_METHODS, Config, ContentType, Endpoint, Envelope, IntoResponse,
    Rejection, Request, Response, ResponseFormat, SecureRouter, SecurityDescriptor, boxed,
};
use bytes::Bytes;
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{Method, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};

const SECRET: &str = "integration_secret_of_enough_length";

// ── Helpers ───────────────────────────────────────────────────────────────────

fn token(claims: Value) -> String {
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
        .unwrap()
}

fn request(method: Method, uri: &str, authorization: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Bytes::new()).unwrap().into()
}

fn envelope(res: &Response) -> Envelope {
    serde_json::from_slice(res.body()).unwrap()
}

/// Answers with the claims it received, or `null` when there were none.
async fn claims_echo(req: Request) -> Response {
    let claims = req.claims().map(|c| Value::Object(c.as_map().clone())).unwrap_or(Value::Null);
    Response::json(json!({ "claims": claims }).to_string())
}

async fn plain(_req: Request) -> Response {
    Response::status(StatusCode::OK)
}

async fn page(_req: Request) -> String {
    "<p>hi</p>".to_owned()
}

fn config() -> Config {
    Config::default().with_jwt_secret(SECRET)
}

fn router() -> SecureRouter {
    SecureRouter::builder(config())
        .on(Method::GET, "/open", claims_echo)
        .on_secured(Method::GET, "/data", claims_echo, SecurityDescriptor::protocol("jwt"))
        .on_secured(Method::GET, "/maybe", claims_echo, SecurityDescriptor::optional("jwt"))
        .any_secured("/any", claims_echo, SecurityDescriptor::protocol("jwt"))
        .on_secured(Method::GET, "/ghost", claims_echo, SecurityDescriptor::protocol("saml"))
        .on_secured(
            Method::GET,
            "/page",
            page,
            SecurityDescriptor::default().with_format(ResponseFormat::Html),
        )
        .on(Method::GET, "/users/{id}", |req: Request| async move {
            Response::text(req.param("id").unwrap_or_default().to_owned())
        })
        .build()
}

fn claims_of(res: &Response) -> Value {
    serde_json::from_slice::<Value>(res.body()).unwrap()["claims"].clone()
}

// ── Unsecured routes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn route_without_protocol_calls_handler_directly() {
    let res = router().serve(request(Method::GET, "/open", Some("Bearer garbage"))).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(claims_of(&res), Value::Null);
}

#[tokio::test]
async fn path_params_reach_the_handler() {
    let res = router().serve(request(Method::GET, "/users/42", None)).await;
    assert_eq!(res.body().as_ref(), b"42");
}

// ── Required authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn required_without_header_is_empty_token() {
    let res = router().serve(request(Method::GET, "/data", None)).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(&res), Envelope::new(StatusCode::UNAUTHORIZED, "Empty token"));
}

#[tokio::test]
async fn required_with_bad_signature_is_invalid_token() {
    let forged = encode(
        &Header::new(Algorithm::HS256),
        &json!({"user": "alice"}),
        &EncodingKey::from_secret(b"some_other_secret_entirely_here"),
    )
    .unwrap();
    let res = router().serve(request(Method::GET, "/data", Some(&format!("Bearer {forged}")))).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(&res), Envelope::new(StatusCode::BAD_REQUEST, "Invalid token"));
}

#[tokio::test]
async fn required_with_valid_token_forwards_claims() {
    let bearer = format!("Bearer {}", token(json!({"user": "alice"})));
    let res = router().serve(request(Method::GET, "/data", Some(&bearer))).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(claims_of(&res), json!({"user": "alice"}));
}

#[tokio::test]
async fn token_without_bearer_prefix_is_accepted() {
    let raw = token(json!({"user": "bob"}));
    let res = router().serve(request(Method::GET, "/data", Some(&raw))).await;

    assert_eq!(claims_of(&res), json!({"user": "bob"}));
}

#[tokio::test]
async fn alg_none_is_rejected() {
    let unsigned = format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(r#"{"user":"alice"}"#),
    );
    let res = router().serve(request(Method::GET, "/data", Some(&format!("Bearer {unsigned}")))).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(&res).message, "Invalid token");
}

// ── Optional authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn optional_without_header_forwards_without_claims() {
    let res = router().serve(request(Method::GET, "/maybe", None)).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(claims_of(&res), Value::Null);
}

#[tokio::test]
async fn optional_with_invalid_header_is_still_rejected() {
    let res = router().serve(request(Method::GET, "/maybe", Some("Bearer not.a.token"))).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(&res).message, "Invalid token");
}

#[tokio::test]
async fn optional_with_valid_header_forwards_claims() {
    let bearer = format!("Bearer {}", token(json!({"user": "carol", "admin": false})));
    let res = router().serve(request(Method::GET, "/maybe", Some(&bearer))).await;

    assert_eq!(claims_of(&res), json!({"user": "carol", "admin": false}));
}

// ── CORS preflight ────────────────────────────────────────────────────────────

#[tokio::test]
async fn options_on_secured_path_gets_cors_headers() {
    let res = router().serve(request(Method::OPTIONS, "/data", None)).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(res.headers()["access-control-allow-methods"], CORS_ALLOW_METHODS);
    assert_eq!(res.headers()["access-control-allow-headers"], "*");
}

#[tokio::test]
async fn options_on_any_method_route_skips_credentials() {
    let res = router().serve(request(Method::OPTIONS, "/any", None)).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(claims_of(&res), Value::Null);
}

// ── Routing failures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_path_is_404() {
    let res = router().serve(request(Method::GET, "/nowhere", None)).await;

    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(envelope(&res), Envelope::new(StatusCode::NOT_FOUND, "Page not found"));
    assert_eq!(res.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
    assert_eq!(res.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let res = router().serve(request(Method::DELETE, "/data", None)).await;

    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(envelope(&res), Envelope::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
}

#[tokio::test]
async fn unregistered_protocol_fails_closed() {
    let bearer = format!("Bearer {}", token(json!({"user": "alice"})));
    let res = router().serve(request(Method::GET, "/ghost", Some(&bearer))).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(&res), Envelope::new(StatusCode::UNAUTHORIZED, "Unauthorized"));
}

#[tokio::test]
async fn jwt_route_without_configured_secret_fails_closed() {
    let router = SecureRouter::builder(Config::default())
        .on_secured(Method::GET, "/data", claims_echo, SecurityDescriptor::optional("jwt"))
        .build();
    let res = router.serve(request(Method::GET, "/data", None)).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

// ── Content type policy ───────────────────────────────────────────────────────

#[tokio::test]
async fn descriptor_format_sets_content_type() {
    let res = router().serve(request(Method::GET, "/page", None)).await;

    assert_eq!(res.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(res.body(), "<p>hi</p>");
}

#[tokio::test]
async fn html_route_with_untyped_body_is_html() {
    let router = SecureRouter::builder(Config::default())
        .on_secured(
            Method::GET,
            "/fragment",
            |_req: Request| async { Response::new("<li>one</li>") },
            SecurityDescriptor::default().with_format(ResponseFormat::Html),
        )
        .on(Method::GET, "/raw", |_req: Request| async { "{\"ok\":true}" })
        .build();

    let html = router.serve(request(Method::GET, "/fragment", None)).await;
    assert_eq!(html.headers()[CONTENT_TYPE], "text/html; charset=utf-8");

    let json = router.serve(request(Method::GET, "/raw", None)).await;
    assert_eq!(json.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
}

#[tokio::test]
async fn json_is_the_default_format() {
    let router = SecureRouter::builder(Config::default()).on(Method::GET, "/bare", plain).build();
    let res = router.serve(request(Method::GET, "/bare", None)).await;

    assert_eq!(res.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
}

#[tokio::test]
async fn handler_content_type_wins() {
    let router = SecureRouter::builder(Config::default())
        .on_secured(
            Method::GET,
            "/csv",
            |_req: Request| async { Response::builder().bytes(ContentType::OctetStream, "a,b") },
            SecurityDescriptor::default().with_format(ResponseFormat::Html),
        )
        .build();
    let res = router.serve(request(Method::GET, "/csv", None)).await;

    assert_eq!(res.headers()[CONTENT_TYPE], "application/octet-stream");
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn builtin_routes_are_registered() {
    let router = SecureRouter::builder(config().with_probe_path("/healthz")).build();

    let robots = router.serve(request(Method::GET, "/robots.txt", None)).await;
    assert_eq!(robots.status_code(), StatusCode::OK);

    let favicon = router.serve(request(Method::GET, "/favicon.ico", None)).await;
    assert_eq!(favicon.headers()[CONTENT_TYPE], "image/x-icon");

    let probe = router.serve(request(Method::GET, "/healthz", None)).await;
    assert_eq!(probe.body().as_ref(), br#"{"ping":"pong"}"#);
}

// ── Pluggable protocols ───────────────────────────────────────────────────────

fn api_key(next: BoxedHandler, require_auth: bool) -> BoxedHandler {
    boxed(move |req: Request| {
        let next = next.clone();
        async move {
            let key = req.header("x-api-key").map(str::to_owned);
            match key.as_deref() {
                Some("open-sesame") => next.call(req).await,
                Some(_) => Rejection::InvalidCredential("unknown api key".into()).into_response(),
                None if require_auth => Rejection::MissingCredential.into_response(),
                None => next.call(req).await,
            }
        }
    })
}

#[tokio::test]
async fn custom_protocol_plugs_in_by_name() {
    let router = SecureRouter::builder(Config::default())
        .protocol("api-key", api_key)
        .on_secured(Method::GET, "/report", plain, SecurityDescriptor::protocol("api-key"))
        .build();

    let denied = router.serve(request(Method::GET, "/report", None)).await;
    assert_eq!(denied.status_code(), StatusCode::UNAUTHORIZED);

    let mut req = request(Method::GET, "/report", None);
    req.headers_mut().insert("x-api-key", "open-sesame".parse().unwrap());
    let allowed = router.serve(req).await;
    assert_eq!(allowed.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn protocol_may_be_registered_after_its_routes() {
    let router = SecureRouter::builder(Config::default())
        .on_secured(Method::GET, "/report", plain, SecurityDescriptor::optional("api-key"))
        .protocol("api-key", api_key)
        .build();

    let res = router.serve(request(Method::GET, "/report", None)).await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

// ── Serve callback ────────────────────────────────────────────────────────────

#[tokio::test]
async fn serve_callback_sees_every_request() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    let router = {
        let seen = Arc::clone(&seen);
        let calls = Arc::clone(&calls);
        SecureRouter::builder(config())
            .on_secured(Method::GET, "/data", claims_echo, SecurityDescriptor::protocol("jwt"))
            .on_serve(move |head, capture, _started| {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push((head.path().to_owned(), capture.status));
            })
            .build()
    };

    router.serve(request(Method::GET, "/data", None)).await;
    router.serve(request(Method::GET, "/missing", None)).await;
    let bearer = format!("Bearer {}", token(json!({"user": "alice"})));
    router.serve(request(Method::GET, "/data", Some(&bearer))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *seen.lock().unwrap(),
        [
            ("/data".to_owned(), StatusCode::UNAUTHORIZED),
            ("/missing".to_owned(), StatusCode::NOT_FOUND),
            ("/data".to_owned(), StatusCode::OK),
        ]
    );
}

#[tokio::test]
async fn serve_callback_capture_holds_the_body() {
    let bodies = Arc::new(Mutex::new(Vec::new()));

    let router = {
        let bodies = Arc::clone(&bodies);
        SecureRouter::builder(Config::default())
            .on(Method::GET, "/hello", |_req: Request| async { "hello world" })
            .on_serve(move |_head, capture, _started| {
                bodies.lock().unwrap().push(capture.content.clone());
            })
            .build()
    };

    router.serve(request(Method::GET, "/hello", None)).await;

    assert_eq!(*bodies.lock().unwrap(), [Bytes::from_static(b"hello world")]);
}

#[tokio::test]
async fn handler_runs_before_serve_callback() {
    let events = Arc::new(Mutex::new(Vec::new()));

    let router = {
        let in_handler = Arc::clone(&events);
        let in_callback = Arc::clone(&events);
        SecureRouter::builder(Config::default())
            .on(Method::GET, "/work", move |_req: Request| {
                let events = Arc::clone(&in_handler);
                async move {
                    events.lock().unwrap().push("handler");
                    StatusCode::NO_CONTENT
                }
            })
            .on_serve(move |_head, _capture, _started| {
                in_callback.lock().unwrap().push("callback");
            })
            .build()
    };

    router.serve(request(Method::GET, "/work", None)).await;

    assert_eq!(*events.lock().unwrap(), ["handler", "callback"]);
}
