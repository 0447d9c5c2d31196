//! Cookie-driven web front.
//!
//! Every request except `/healthz` becomes one [`InboundEvent`] for the
//! session named by the session cookie. A first-time visitor gets a fresh
//! key, but the cookie is only set once a login is actually started, so
//! casual visits leave nothing behind.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use stellvia_core::SessionKey;
use stellvia_platform_access::{Command, InboundEvent, LogoutScope, UserOutcome};
use stellvia_relay::Provider;
use stellvia_scheduler::Notice;
use time::Duration as TimeDuration;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::error::ServerError;
use crate::events::EventSender;
use crate::outbox::Outbox;

/// Shared state for the web front.
#[derive(Debug, Clone)]
pub struct WebState {
    events: EventSender,
    outbox: Arc<Outbox>,
    config: Arc<WebConfig>,
    cookie_max_age: Option<TimeDuration>,
}

impl WebState {
    /// Creates the state. `session_ttl_seconds` bounds the cookie lifetime.
    #[must_use]
    pub fn new(
        events: EventSender,
        outbox: Arc<Outbox>,
        config: WebConfig,
        session_ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            events,
            outbox,
            config: Arc::new(config),
            cookie_max_age: session_ttl_seconds
                .map(|s| TimeDuration::seconds(i64::try_from(s).unwrap_or(i64::MAX))),
        }
    }

    fn session_cookie(&self, key: &SessionKey) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.config.cookie_name.clone(), key.as_str().to_string()))
            .path("/")
            .http_only(true)
            .secure(self.config.secure_cookies)
            .same_site(SameSite::Lax);
        if let Some(max_age) = self.cookie_max_age {
            cookie = cookie.max_age(max_age);
        }
        cookie.build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .secure(self.config.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::ZERO)
            .build()
    }
}

/// Builds the router.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    #[serde(rename = "type")]
    provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogoutQuery {
    all: Option<bool>,
}

/// Translates a request into the event it stands for.
fn to_event(method: &Method, uri: &Uri, body: &[u8]) -> InboundEvent {
    if method == Method::GET {
        match uri.path() {
            "/" => return InboundEvent::Start,
            "/login" => {
                let provider = Query::<LoginQuery>::try_from_uri(uri)
                    .ok()
                    .and_then(|Query(q)| q.provider)
                    .and_then(|p| p.parse::<Provider>().ok());
                return match provider {
                    Some(provider) => InboundEvent::Login { provider },
                    None => InboundEvent::Start,
                };
            }
            "/logout" => {
                let global = Query::<LogoutQuery>::try_from_uri(uri)
                    .ok()
                    .and_then(|Query(q)| q.all)
                    .unwrap_or(false);
                let scope = if global {
                    LogoutScope::Global
                } else {
                    LogoutScope::Local
                };
                return InboundEvent::Logout { scope };
            }
            "/cancel" => return InboundEvent::Cancel,
            _ => {}
        }
    }

    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut command = Command::new(method.clone(), path);
    if !body.is_empty() {
        let payload = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        command = command.with_body(payload);
    }
    InboundEvent::Command(command)
}

async fn handle(
    State(state): State<WebState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ServerError> {
    let existing = jar
        .get(&state.config.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|v| !v.is_empty())
        .map(SessionKey::new);
    let key = existing.clone().unwrap_or_else(SessionKey::generate);

    let event = to_event(&method, &uri, &body);
    let wants_notices = existing.is_some() && event == InboundEvent::Start;
    let outcome = state.events.send(key.clone(), event).await?;

    let notices = if wants_notices {
        state.outbox.take(&key).await
    } else {
        Vec::new()
    };
    if outcome.ends_session() {
        state.outbox.discard(&key).await;
    }

    let jar = match &outcome {
        UserOutcome::RedirectToProvider { .. } if existing.is_none() => {
            jar.add(state.session_cookie(&key))
        }
        o if o.ends_session() => jar.add(state.removal_cookie()),
        _ => jar,
    };

    Ok((jar, render(outcome, &notices)).into_response())
}

fn notice_text(notice: &Notice) -> String {
    match notice {
        Notice::LoginCompleted {
            display_name: Some(name),
            ..
        } => format!("Signed in as {name}"),
        Notice::LoginCompleted { .. } => "Signed in".to_string(),
        Notice::LoginFailed => "Sign-in failed".to_string(),
        Notice::Message { text } => text.clone(),
    }
}

fn render(outcome: UserOutcome, notices: &[Notice]) -> Response {
    let notices: Vec<String> = notices.iter().map(notice_text).collect();
    match outcome {
        UserOutcome::LoginChoices { providers } => {
            let providers: Vec<Value> = providers
                .iter()
                .map(|p| json!({"provider": p.as_str(), "url": format!("/login?type={p}")}))
                .collect();
            Json(json!({"outcome": "login_choices", "providers": providers, "notices": notices}))
                .into_response()
        }
        UserOutcome::RedirectToProvider { url } => Redirect::to(&url).into_response(),
        UserOutcome::PendingLogin => (
            StatusCode::ACCEPTED,
            Json(json!({"outcome": "pending_login", "notices": notices})),
        )
            .into_response(),
        UserOutcome::Welcome { display_name, role } => Json(json!({
            "outcome": "welcome",
            "display_name": display_name,
            "role": role,
            "notices": notices,
        }))
        .into_response(),
        UserOutcome::AlreadySignedIn | UserOutcome::SignedOut => Redirect::to("/").into_response(),
        UserOutcome::LoginFailed => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"outcome": "login_failed", "message": "Sign-in was denied or failed"})),
        )
            .into_response(),
        UserOutcome::ReauthRequired => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"outcome": "reauth_required", "message": "Please sign in again"})),
        )
            .into_response(),
        UserOutcome::RetryLater => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"outcome": "retry_later", "message": "Please try again later"})),
        )
            .into_response(),
        UserOutcome::Forbidden => (
            StatusCode::FORBIDDEN,
            Json(json!({"outcome": "forbidden", "message": "Not allowed"})),
        )
            .into_response(),
        UserOutcome::Failed { message } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"outcome": "failed", "message": message})),
        )
            .into_response(),
        UserOutcome::CommandResult { body } => {
            let content_type = if serde_json::from_str::<Value>(&body).is_ok() {
                "application/json"
            } else {
                "text/plain; charset=utf-8"
            };
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::testing::{REDIRECT_URL, machine};
    use axum::body::Body;
    use axum::http::Request;
    use stellvia_scheduler::Notifier;
    use stellvia_session::{Credentials, InMemorySessionStore, SessionRecord, SessionStore};
    use tower::ServiceExt;

    struct Harness {
        store: Arc<InMemorySessionStore>,
        outbox: Arc<Outbox>,
        router: Router,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemorySessionStore::new());
        let (sender, event_loop) =
            events::channel(machine(store.clone()), &crate::config::EventLoopConfig::default());
        tokio::spawn(event_loop.run());
        let outbox = Arc::new(Outbox::new());
        let state = WebState::new(sender, outbox.clone(), WebConfig::default(), Some(3600));
        Harness {
            store,
            outbox,
            router: router(state),
        }
    }

    impl Harness {
        async fn sign_in(&self, key: &str) {
            let credentials = Credentials::new("a1", "r1").expect("credentials");
            self.store
                .put(&SessionKey::from(key), &SessionRecord::authorized(credentials))
                .await
                .expect("put");
        }

        async fn call(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.expect("response")
        }
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = cookie {
            builder = builder.header(header::COOKIE, format!("session_id={key}"));
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).expect("json")
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let h = harness();
        let response = h.call(get("/healthz", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn first_visit_offers_providers_without_a_cookie() {
        let h = harness();
        let response = h.call(get("/", None)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookie(&response), None);
        let body = body_json(response).await;
        assert_eq!(body["outcome"], "login_choices");
        assert_eq!(body["providers"][0]["url"], "/login?type=github");
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn login_redirects_and_sets_the_cookie() {
        let h = harness();
        let response = h.call(get("/login?type=GitHub", None)).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some(REDIRECT_URL)
        );
        let cookie = set_cookie(&response).expect("cookie set");
        assert!(cookie.starts_with("session_id="));
        assert!(cookie.contains("HttpOnly"));
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn pending_login_is_accepted() {
        let h = harness();
        let response = h.call(get("/login?type=code", Some("web-1"))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(set_cookie(&response), None);

        let response = h.call(get("/", Some("web-1"))).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["outcome"], "pending_login");
    }

    #[tokio::test]
    async fn commands_are_forwarded_with_method_path_and_body() {
        let h = harness();
        h.sign_in("web-1").await;

        let response = h.call(get("/courses?page=2", Some("web-1"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "GET /courses?page=2 ");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/courses")
            .header(header::COOKIE, "session_id=web-1")
            .body(Body::from(r#"{"title":"Rust"}"#))
            .expect("request");
        let response = h.call(request).await;
        assert_eq!(body_text(response).await, r#"POST /courses {"title":"Rust"}"#);
    }

    #[tokio::test]
    async fn start_shows_waiting_notices_once() {
        let h = harness();
        h.sign_in("web-1").await;
        h.outbox
            .notify(
                &SessionKey::from("web-1"),
                Notice::Message {
                    text: "New grade posted".to_string(),
                },
            )
            .await
            .expect("notify");

        let body = body_json(h.call(get("/", Some("web-1"))).await).await;
        assert_eq!(body["outcome"], "welcome");
        assert_eq!(body["notices"], json!(["New grade posted"]));

        let body = body_json(h.call(get("/", Some("web-1"))).await).await;
        assert_eq!(body["notices"], json!([]));
    }

    #[tokio::test]
    async fn logout_clears_session_and_cookie() {
        let h = harness();
        h.sign_in("web-1").await;

        let response = h.call(get("/logout?all=true", Some("web-1"))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = set_cookie(&response).expect("cookie cleared");
        assert!(cookie.starts_with("session_id=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn logout_drops_waiting_notices() {
        let h = harness();
        h.sign_in("web-1").await;
        h.outbox
            .notify(
                &SessionKey::from("web-1"),
                Notice::Message {
                    text: "unread".to_string(),
                },
            )
            .await
            .expect("notify");

        h.call(get("/logout", Some("web-1"))).await;

        assert_eq!(h.outbox.tracked_sessions().await, 0);
    }

    #[test]
    fn requests_map_to_events() {
        let event = |m: Method, uri: &str| to_event(&m, &uri.parse().expect("uri"), b"");

        assert_eq!(event(Method::GET, "/"), InboundEvent::Start);
        assert_eq!(event(Method::GET, "/login"), InboundEvent::Start);
        assert_eq!(event(Method::GET, "/login?type=%20"), InboundEvent::Start);
        assert_eq!(
            event(Method::GET, "/login?type=Yandex"),
            InboundEvent::Login {
                provider: "yandex".parse().expect("provider")
            }
        );
        assert_eq!(
            event(Method::GET, "/logout"),
            InboundEvent::Logout {
                scope: LogoutScope::Local
            }
        );
        assert_eq!(
            event(Method::GET, "/logout?all=true"),
            InboundEvent::Logout {
                scope: LogoutScope::Global
            }
        );
        assert_eq!(event(Method::GET, "/cancel"), InboundEvent::Cancel);
        assert!(matches!(event(Method::POST, "/"), InboundEvent::Command(_)));
    }

    #[test]
    fn non_json_bodies_are_forwarded_as_text() {
        let event = to_event(&Method::POST, &"/notes".parse().expect("uri"), b"hello");
        let InboundEvent::Command(command) = event else {
            panic!("expected a command");
        };
        assert_eq!(command.body(), Some(&Value::String("hello".to_string())));
    }
}
