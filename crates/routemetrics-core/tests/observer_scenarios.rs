//! End-to-end request scenarios against a shared registry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use routemetrics_core::{
    MetricRegistry, ObserverOptions, RequestMeta, RequestObserver, RouteTemplate, StatusSource,
};

#[derive(Debug, PartialEq)]
struct HandlerError {
    status: u16,
    msg: &'static str,
}

impl StatusSource for HandlerError {
    fn status_code(&self) -> u16 {
        self.status
    }
}

fn observer() -> RequestObserver {
    RequestObserver::new(Arc::new(MetricRegistry::default()), ObserverOptions::default())
}

fn user_routes() -> Vec<RouteTemplate> {
    vec![RouteTemplate::parse("/users/{id}").unwrap()]
}

fn get<'a>(path: &'a str, url: &'a str) -> RequestMeta<'a> {
    RequestMeta { method: "GET", path, url }
}

#[tokio::test]
async fn success_is_counted_under_template_label() {
    let obs = observer();
    let routes = user_routes();

    let res: Result<u16, HandlerError> = obs
        .observe(&get("/users/42", "http://localhost/users/42"), &routes, async { Ok(200) })
        .await;
    assert_eq!(res, Ok(200));

    let s = obs.registry().get("GET /users/{id}").expect("series");
    assert_eq!(s.success_count(), 1);
    assert_eq!(s.error_total(), 0);
    assert_eq!(s.in_progress(), 0);
    assert_eq!(obs.registry().len(), 1);
}

#[tokio::test]
async fn non_200_status_is_an_error_keyed_by_code() {
    let obs = observer();
    let routes = user_routes();

    let _: Result<u16, HandlerError> = obs
        .observe(&get("/users/42", "http://localhost/users/42"), &routes, async { Ok(404) })
        .await;

    let s = obs.registry().get("GET /users/{id}").unwrap();
    assert_eq!(s.error_count(404), 1);
    assert_eq!(s.success_count(), 0);
    assert_eq!(s.in_progress(), 0);
}

#[tokio::test]
async fn excluded_request_creates_no_series() {
    let obs = observer();
    let routes = vec![RouteTemplate::parse("/health").unwrap()];

    let res: Result<u16, HandlerError> = obs
        .observe(&get("/health", "http://localhost/health"), &routes, async { Ok(200) })
        .await;
    assert_eq!(res, Ok(200));
    assert!(obs.registry().is_empty());

    // Excluded failures pass through untouched as well.
    let res: Result<u16, HandlerError> = obs
        .observe(&get("/health", "http://localhost/health"), &routes, async {
            Err(HandlerError { status: 503, msg: "down" })
        })
        .await;
    assert_eq!(res, Err(HandlerError { status: 503, msg: "down" }));
    assert!(obs.registry().is_empty());
}

#[tokio::test]
async fn unregistered_path_goes_to_sentinel() {
    let obs = observer();
    let routes = user_routes();

    let _: Result<u16, HandlerError> = obs
        .observe(&get("/foo/bar", "http://localhost/foo/bar"), &routes, async { Ok(200) })
        .await;

    assert_eq!(obs.registry().labels(), vec!["unresolved".to_string()]);
    let s = obs.registry().get("unresolved").unwrap();
    assert_eq!(s.success_count() + s.error_total(), 1);
}

#[tokio::test]
async fn handler_failure_is_recorded_and_returned_unchanged() {
    let obs = observer();
    let routes = user_routes();

    let res: Result<u16, HandlerError> = obs
        .observe(&get("/users/7", "http://localhost/users/7"), &routes, async {
            tokio::task::yield_now().await;
            Err(HandlerError { status: 500, msg: "boom" })
        })
        .await;
    assert_eq!(res, Err(HandlerError { status: 500, msg: "boom" }));

    let s = obs.registry().get("GET /users/{id}").unwrap();
    assert_eq!(s.error_count(500), 1);
    assert_eq!(s.error_total(), 1);
    assert_eq!(s.success_count(), 0);
    assert_eq!(s.in_progress(), 0);
    assert_eq!(s.histogram().count, 1);
}

#[tokio::test]
async fn failure_with_success_status_still_counts_as_error() {
    let obs = observer();
    let routes = user_routes();

    let _: Result<u16, HandlerError> = obs
        .observe(&get("/users/7", "http://localhost/users/7"), &routes, async {
            Err(HandlerError { status: 200, msg: "status never set" })
        })
        .await;

    let s = obs.registry().get("GET /users/{id}").unwrap();
    assert_eq!(s.error_count(200), 1);
    assert_eq!(s.success_count(), 0);
}

#[test]
fn panicking_handler_is_recorded_once_and_keeps_unwinding() {
    let obs = observer();
    let routes = user_routes();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<u16, HandlerError> =
            obs.observe_blocking(&get("/users/1", "http://localhost/users/1"), &routes, || {
                panic!("handler exploded")
            });
    }));
    let payload = caught.expect_err("panic must propagate");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"handler exploded"));

    let s = obs.registry().get("GET /users/{id}").unwrap();
    assert_eq!(s.error_count(500), 1);
    assert_eq!(s.error_total(), 1);
    assert_eq!(s.in_progress(), 0);
    assert_eq!(s.histogram().count, 1);
}

#[tokio::test]
async fn cancelled_request_takes_the_error_path() {
    let obs = observer();
    let routes = user_routes();

    let req = get("/users/1", "http://localhost/users/1");
    let fut = obs.observe(&req, &routes, async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<u16, HandlerError>(200)
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(20), fut).await;
    assert!(timed_out.is_err());

    let s = obs.registry().get("GET /users/{id}").unwrap();
    assert_eq!(s.in_progress(), 0);
    assert_eq!(s.error_count(500), 1);
    assert_eq!(s.success_count(), 0);
}

#[tokio::test]
async fn gauge_tracks_in_flight_requests() {
    let obs = observer();
    let routes = user_routes();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let in_flight = {
        let obs = obs.clone();
        let routes = routes.clone();
        tokio::spawn(async move {
            obs.observe(&get("/users/5", "http://localhost/users/5"), &routes, async {
                rx.await.ok();
                Ok::<u16, HandlerError>(200)
            })
            .await
        })
    };

    // Wait until the spawned request has registered itself.
    let series = loop {
        if let Some(s) = obs.registry().get("GET /users/{id}") {
            if s.in_progress() == 1 {
                break s;
            }
        }
        tokio::task::yield_now().await;
    };

    tx.send(()).unwrap();
    in_flight.await.unwrap().unwrap();
    assert_eq!(series.in_progress(), 0);
    assert_eq!(series.success_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_labels_do_not_leak() {
    let obs = observer();
    let routes: Arc<Vec<RouteTemplate>> = Arc::new(
        (0..8)
            .map(|i| RouteTemplate::parse(&format!("/svc{i}/{{id}}")).unwrap())
            .collect(),
    );

    let tasks = (0..8)
        .flat_map(|i| (0..25).map(move |n| (i, n)))
        .map(|(i, n)| {
            let obs = obs.clone();
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let path = format!("/svc{i}/{n}");
                let url = format!("http://localhost{path}");
                let status: u16 = if i % 2 == 0 { 200 } else { 503 };
                obs.observe(&get(&path, &url), &routes, async move { Ok::<u16, HandlerError>(status) })
                    .await
            })
        });
    for r in join_all(tasks).await {
        r.unwrap().unwrap();
    }

    assert_eq!(obs.registry().len(), 8);
    for i in 0..8 {
        let s = obs.registry().get(&format!("GET /svc{i}/{{id}}")).unwrap();
        assert_eq!(s.in_progress(), 0);
        if i % 2 == 0 {
            assert_eq!(s.success_count(), 25);
            assert_eq!(s.error_total(), 0);
        } else {
            assert_eq!(s.success_count(), 0);
            assert_eq!(s.error_count(503), 25);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_shares_one_series() {
    let registry = Arc::new(MetricRegistry::default());

    let tasks = (0..64).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.series_for("GET /new") })
    });
    let series: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(registry.len(), 1);
    for s in &series {
        assert!(Arc::ptr_eq(s, &series[0]));
    }
}

#[test]
fn extension_methods_do_not_grow_the_registry() {
    let obs = observer();
    let routes = user_routes();

    for i in 0..1000 {
        let method = format!("X{i}");
        let req = RequestMeta { method: &method, path: "/users/1", url: "http://localhost/users/1" };
        obs.begin(&req, &routes).expect("observed").finish_status(200);
    }
    let req = RequestMeta { method: "PATCH", path: "/users/1", url: "http://localhost/users/1" };
    obs.begin(&req, &routes).expect("observed").finish_status(200);

    assert_eq!(obs.registry().labels(), vec!["OTHER /users/{id}".to_string(), "PATCH /users/{id}".to_string()]);
    assert_eq!(obs.registry().get("OTHER /users/{id}").unwrap().success_count(), 1000);
}
